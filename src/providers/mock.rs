/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds with a small dialogue object
 * - `MockProvider::scripted(..)` - Replays canned responses in order
 * - `MockProvider::rate_limited(n)` - Fails with 429 `n` times, then succeeds
 * - `MockProvider::failing()` - Always fails with a server error
 *
 * `throttling_prompts_containing(..)` adds a permanent 429 for matching
 * prompts on top of any behavior.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::providers::{LlmRequest, Provider};

/// Response returned by a working mock when no script is set
pub const DEFAULT_RESPONSE: &str =
    r#"{"title": "Mock Movie", "lines": [{"character": "ALICE", "text": "Hello there."}, {"character": "BOB", "text": "General Kenobi."}]}"#;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails with a rate-limit error for the first `times` requests
    RateLimited { times: usize },
    /// Fails with a server error on every Nth request
    Intermittent { fail_every: usize },
    /// Always fails with a non-retryable error
    Failing,
    /// Returns the response cut off two thirds of the way through
    Truncated,
    /// Returns an empty response
    Empty,
    /// Simulates slow responses
    Slow { delay_ms: u64 },
}

/// Mock provider for exercising the parsing pipeline
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Canned responses, replayed in order and cycled
    responses: Vec<String>,
    attachments: bool,
    /// Prompts containing this always get a rate-limit error
    throttle_marker: Option<String>,
    request_count: Arc<AtomicUsize>,
    throttled_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            responses: self.responses.clone(),
            attachments: self.attachments,
            throttle_marker: self.throttle_marker.clone(),
            request_count: Arc::clone(&self.request_count),
            throttled_count: Arc::clone(&self.throttled_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            responses: Vec::new(),
            attachments: false,
            throttle_marker: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            throttled_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Working mock replaying `responses` in order
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::working().with_responses(responses)
    }

    pub fn rate_limited(times: usize) -> Self {
        Self::new(MockBehavior::RateLimited { times })
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Replace the canned responses
    pub fn with_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Advertise attachment support
    pub fn with_attachments(mut self) -> Self {
        self.attachments = true;
        self
    }

    /// Rate-limit every request whose prompt contains `marker`
    pub fn throttling_prompts_containing(mut self, marker: impl Into<String>) -> Self {
        self.throttle_marker = Some(marker.into());
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn canned(&self, index: usize) -> String {
        if self.responses.is_empty() {
            DEFAULT_RESPONSE.to_string()
        } else {
            self.responses[index % self.responses.len()].clone()
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn supports_attachments(&self) -> bool {
        self.attachments
    }

    async fn complete(&self, request: LlmRequest) -> Result<String, ProviderError> {
        let index = self.request_count.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .throttle_marker
            .as_deref()
            .is_some_and(|marker| request.prompt.contains(marker));
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if throttled {
            self.throttled_count.fetch_add(1, Ordering::SeqCst);
            return Err(ProviderError::RateLimitExceeded("quota".to_string()));
        }
        // throttled requests do not consume canned responses
        let index = index - self.throttled_count.load(Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(self.canned(index)),
            MockBehavior::RateLimited { times } => {
                if index < times {
                    Err(ProviderError::RateLimitExceeded("Resource exhausted".to_string()))
                } else {
                    Ok(self.canned(index - times))
                }
            }
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && (index + 1) % fail_every == 0 {
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: "Simulated intermittent failure".to_string(),
                    })
                } else {
                    Ok(self.canned(index))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated failure".to_string(),
            }),
            MockBehavior::Truncated => {
                let full = self.canned(index);
                let mut cut = full.len() * 2 / 3;
                while !full.is_char_boundary(cut) {
                    cut -= 1;
                }
                Ok(full[..cut].to_string())
            }
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.canned(index))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated failure".to_string())),
            _ => Ok(()),
        }
    }
}
