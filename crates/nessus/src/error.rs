//! Error types for Nessus operations

/// Result type alias for Nessus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Nessus.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    HttpError {
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The named policy does not exist on the server.
    #[error("policy {name} not found on Nessus ({})", describe_available(.available))]
    PolicyNotFound {
        name: String,
        /// Names of the policies that do exist.
        available: Vec<String>,
    },

    /// No scan template with this title.
    #[error("scan template {0} not found on Nessus")]
    TemplateNotFound(String),

    /// The server refused to launch the scan.
    #[error("scan {scan_id} was not launched: {message}")]
    LaunchRejected { scan_id: u64, message: String },

    /// Polling gave up.
    #[error("{what} not finished after {secs}s")]
    Timeout { what: String, secs: u64 },

    /// Unexpected response body.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::HttpError {
            message: message.into(),
            status,
        }
    }

    /// Whether the request is worth repeating
    ///
    /// Bad gateway answers and connection level failures are transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => matches!(status, None | Some(502)),
            _ => false,
        }
    }
}

fn describe_available(available: &[String]) -> String {
    if available.is_empty() {
        "no policies are defined".to_string()
    } else {
        format!("defined policies: {}", available.join(", "))
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::http(format!("HTTP {code}"), Some(code)),
            other => Self::http(other.to_string(), None),
        }
    }
}
