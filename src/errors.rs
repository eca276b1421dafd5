/*!
 * Error types for the scriptdle parser.
 *
 * Each pipeline stage owns its own error enum so that callers can decide
 * which failures are recoverable:
 * - `ExtractionError`: a single extraction strategy produced nothing usable
 * - `ProviderError`: a language-model endpoint call failed
 * - `ParseError`: a model response could not be turned into dialogue
 * - `AppError`: application boundary wrapper
 */

use thiserror::Error;

/// Errors that can occur while extracting text from a source document
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Not enough text was found on any page
    #[error("Insufficient text: {chars} characters across {pages} page(s)")]
    NoText {
        /// Total characters extracted
        chars: usize,
        /// Number of pages inspected
        pages: usize,
    },

    /// Extracted text failed the garbage heuristic
    #[error("Extracted text looks like garbage ({:.0}% of sampled lines)", ratio * 100.0)]
    Garbage {
        /// Fraction of sampled lines classified as garbage
        ratio: f64,
    },

    /// The strategy does not handle this kind of source
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// A required external tool is not installed
    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    /// An external tool ran but reported failure
    #[error("{tool} failed: {message}")]
    ToolFailed {
        /// Tool name
        tool: String,
        /// Captured stderr or description
        message: String,
    },

    /// An external tool exceeded its wall-clock budget
    #[error("{tool} timed out after {secs} seconds")]
    Timeout {
        /// Tool name
        tool: String,
        /// Timeout that was exceeded
        secs: u64,
    },

    /// The PDF could not be decoded
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Fetching a remote source failed
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every strategy in a chain failed
    #[error("All extraction strategies failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Rate limiting persisted through every retry
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last: String,
    },

    /// The provider cannot handle this request shape
    #[error("Unsupported request: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Whether this failure is a transient rate-limit signal worth retrying
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, message } => {
                *status_code == 429 || message.contains("Resource exhausted")
            }
            _ => false,
        }
    }

    /// Map an HTTP status and body to the matching variant
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            429 => Self::RateLimitExceeded(message),
            401 | 403 => Self::AuthenticationError(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

/// Errors that can occur when interpreting model output
#[derive(Error, Debug)]
pub enum ParseError {
    /// No JSON value could be located in the response
    #[error("No JSON found in response: {0}")]
    InvalidJson(String),

    /// The response was truncated and could not be repaired
    #[error("Truncated response could not be repaired: {0}")]
    Unrepairable(String),

    /// The response parsed but held no dialogue
    #[error("Response contained no dialogue lines")]
    NoDialogue,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from extraction
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from response parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
