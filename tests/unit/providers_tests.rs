/*!
 * Tests for provider construction and rate-limit retries
 */

use std::sync::Arc;

use anyhow::Result;
use scriptdle_parser::app_config::{LlmConfig, ProviderKind};
use scriptdle_parser::errors::ProviderError;
use scriptdle_parser::llm::backoff::BackoffPolicy;
use scriptdle_parser::providers::mock::{MockProvider, DEFAULT_RESPONSE};
use scriptdle_parser::providers::{self, Attachment, LlmRequest, Provider};

/// Test that a configured key is enough to build a cloud provider
#[test]
fn test_from_config_withGeminiKey_shouldBuildAttachmentCapableProvider() -> Result<()> {
    let mut config = LlmConfig::default();
    config.provider = ProviderKind::Gemini;
    for provider in config.available_providers.iter_mut() {
        if provider.provider_type == "gemini" {
            provider.api_key = "test-key".to_string();
        }
    }

    let provider = providers::from_config(&config)?;
    assert_eq!(provider.name(), "Gemini");
    assert!(provider.supports_attachments());
    Ok(())
}

/// Test that an Anthropic key in the config file is honoured
#[test]
fn test_from_config_withAnthropicKey_shouldBuildTextOnlyProvider() -> Result<()> {
    let mut config = LlmConfig::default();
    config.provider = ProviderKind::Anthropic;
    for provider in config.available_providers.iter_mut() {
        if provider.provider_type == "anthropic" {
            provider.api_key = "test-key".to_string();
        }
    }

    let provider = providers::from_config(&config)?;
    assert_eq!(provider.name(), "Anthropic");
    assert!(!provider.supports_attachments());
    Ok(())
}

/// Test that the backoff policy retries through transient rate limits
#[tokio::test]
async fn test_backoff_withRateLimitedMock_shouldEventuallySucceed() -> Result<()> {
    let mock = MockProvider::rate_limited(2);
    let provider: Arc<dyn Provider> = Arc::new(mock.clone());

    let response = BackoffPolicy::immediate(3)
        .run("test", || provider.complete(LlmRequest::new("parse this")))
        .await?;

    assert_eq!(response, DEFAULT_RESPONSE);
    assert_eq!(mock.request_count(), 3);
    Ok(())
}

/// Test that persistent rate limiting ends in an exhausted-retries error
#[tokio::test]
async fn test_backoff_withPersistentRateLimit_shouldReportExhaustion() {
    let mock = MockProvider::rate_limited(10);
    let result = BackoffPolicy::immediate(4)
        .run("test", || mock.complete(LlmRequest::new("parse this")))
        .await;

    match result {
        Err(ProviderError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("Expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(mock.request_count(), 4);
}

/// Test that server errors are not retried
#[tokio::test]
async fn test_backoff_withServerError_shouldFailOnFirstAttempt() {
    let mock = MockProvider::failing();
    let result = BackoffPolicy::immediate(5)
        .run("test", || mock.complete(LlmRequest::new("parse this")))
        .await;

    assert!(matches!(result, Err(ProviderError::ApiError { status_code: 500, .. })));
    assert_eq!(mock.request_count(), 1);
}

/// Test HTTP status classification
#[test]
fn test_from_status_withCommonCodes_shouldClassify() {
    assert!(ProviderError::from_status(429, "slow down".to_string()).is_rate_limit());
    assert!(matches!(
        ProviderError::from_status(401, "bad key".to_string()),
        ProviderError::AuthenticationError(_)
    ));
    let overloaded = ProviderError::ApiError {
        status_code: 503,
        message: "Resource exhausted".to_string(),
    };
    assert!(overloaded.is_rate_limit());
    assert!(!ProviderError::from_status(500, "boom".to_string()).is_rate_limit());
}

/// Test that the mock records attachments it receives
#[tokio::test]
async fn test_mock_withAttachment_shouldRecordRequest() -> Result<()> {
    let mock = MockProvider::working().with_attachments();
    let request = LlmRequest::new("read this pdf").attachment(Attachment::pdf(b"%PDF-1.4".to_vec()));
    mock.complete(request).await?;

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].attachment.is_some());
    assert!(mock.supports_attachments());
    Ok(())
}

/// Test that an empty response is returned as-is for the caller to judge
#[tokio::test]
async fn test_mock_withEmptyBehavior_shouldReturnEmptyString() -> Result<()> {
    let response = MockProvider::empty().complete(LlmRequest::new("p")).await?;
    assert!(response.is_empty());
    Ok(())
}
