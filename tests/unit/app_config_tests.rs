/*!
 * Tests for configuration loading and validation
 */

use scriptdle_parser::app_config::{Config, LogLevel, ProviderKind};

/// Test that an empty JSON object loads every default
#[test]
fn test_deserialize_withEmptyObject_shouldUseDefaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.chunking.chunk_size, 12_000);
    assert_eq!(config.chunking.transcript_chunk_size, 15_000);
    assert_eq!(config.chunking.overlap, 500);
    assert_eq!(config.backoff.max_attempts, 5);
    assert_eq!(config.validation.sample_size, 100);
    assert_eq!(config.batch.concurrency, 4);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(config.validate().is_ok());
}

/// Test that a partial section keeps defaults for the missing fields
#[test]
fn test_deserialize_withPartialSection_shouldMergeDefaults() {
    let json = r#"{"validation": {"min_confidence": 0.25}, "llm": {"provider": "ollama"}}"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.validation.min_confidence, 0.25);
    assert_eq!(config.validation.min_match_words, 3);
    assert_eq!(config.llm.provider, ProviderKind::Ollama);
    assert_eq!(config.llm.get_endpoint(), "http://localhost:11434");
}

/// Test that a saved default config loads back unchanged
#[test]
fn test_serialize_withDefaults_shouldLoadBackEquivalent() {
    let json = serde_json::to_string_pretty(&Config::default()).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.extraction.ocr_dpi, 200);
    assert_eq!(loaded.fetch.dynamic_hosts, Config::default().fetch.dynamic_hosts);
    assert_eq!(loaded.llm.get_model(), Config::default().llm.get_model());
}

/// Test that impossible chunking values are rejected
#[test]
fn test_validate_withOverlapLargerThanChunk_shouldFail() {
    let mut config = Config::default();
    config.chunking.overlap = config.chunking.chunk_size;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.chunking.chunk_size = 0;
    assert!(config.validate().is_err());
}

/// Test that ratios outside [0, 1] are rejected
#[test]
fn test_validate_withRatioOutOfRange_shouldFail() {
    let mut config = Config::default();
    config.validation.min_match_ratio = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.extraction.garbage_ratio_threshold = -0.1;
    assert!(config.validate().is_err());
}

/// Test that zero retries and zero concurrency are rejected
#[test]
fn test_validate_withZeroAttemptsOrConcurrency_shouldFail() {
    let mut config = Config::default();
    config.backoff.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.batch.concurrency = 0;
    assert!(config.validate().is_err());
}

/// Test that setting a model updates the active provider only
#[test]
fn test_set_model_withActiveProvider_shouldOverrideModel() {
    let mut config = Config::default();
    config.llm.provider = ProviderKind::Anthropic;
    config.llm.set_model("claude-test");
    assert_eq!(config.llm.get_model(), "claude-test");

    config.llm.provider = ProviderKind::OpenAI;
    assert_ne!(config.llm.get_model(), "claude-test");
}

/// Test provider names parse case-insensitively
#[test]
fn test_provider_kind_from_str_withMixedCase_shouldParse() {
    assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
    assert_eq!("OPENAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
    assert!("lmstudio".parse::<ProviderKind>().is_err());
}
