//! Error types for remote command execution.
//!
//! Errors are categorized so the retry logic can tell a dropped connection
//! (worth reconnecting) from a rejected login (not worth retrying).

use thiserror::Error;

/// Categories of ssh errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection dropped, reset or timed out (transient, retryable)
    Transient,
    /// Credentials rejected
    Auth,
    /// Remote host key could not be verified
    HostKey,
    /// Host unreachable for a non-transient reason
    Connect,
    /// `ssh` or `sshpass` missing on this machine
    ClientNotFound,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transient => "Check the network path to the host and try again",
            Self::Auth => "Check the user name, password or identity file",
            Self::HostKey => "Remove the stale entry from ~/.ssh/known_hosts",
            Self::Connect => "Check the host name, port and any jump host",
            Self::ClientNotFound => "Install the OpenSSH client (and sshpass for password logins)",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to a remote host.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection lost or timed out
    #[error("connection to {host} lost: {message}")]
    Transient { host: String, message: String },

    /// Authentication failed
    #[error("authentication to {host} failed: {message}")]
    Auth { host: String, message: String },

    /// Host key verification failed
    #[error("host key verification for {host} failed: {message}")]
    HostKey { host: String, message: String },

    /// Could not connect for another reason
    #[error("cannot connect to {host}: {message}")]
    Connect { host: String, message: String },

    /// A required client binary is missing
    #[error("{0} not found in PATH")]
    ClientNotFound(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::HostKey { .. } => ErrorCategory::HostKey,
            Error::Connect { .. } => ErrorCategory::Connect,
            Error::ClientNotFound(_) => ErrorCategory::ClientNotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Create an error from the stderr of an `ssh` invocation that exited 255.
    ///
    /// Returns `None` when stderr does not look like an ssh client error, in
    /// which case the 255 came from the remote command itself.
    pub fn from_ssh_output(host: &str, stderr: &str) -> Option<Self> {
        let lower = stderr.to_lowercase();
        let host = host.to_string();
        let message = stderr.trim().to_string();

        if lower.contains("host key verification failed")
            || lower.contains("remote host identification has changed")
        {
            return Some(Error::HostKey { host, message });
        }

        if lower.contains("permission denied")
            || lower.contains("too many authentication failures")
            || lower.contains("authentication failed")
        {
            return Some(Error::Auth { host, message });
        }

        if lower.contains("connection reset")
            || lower.contains("connection closed")
            || lower.contains("broken pipe")
            || lower.contains("timed out")
            || lower.contains("connection refused")
            || lower.contains("network is unreachable")
            || lower.contains("no route to host")
            || lower.contains("kex_exchange_identification")
            || lower.contains("mux_client")
            || lower.contains("control socket")
            || lower.contains("timeout, server")
        {
            return Some(Error::Transient { host, message });
        }

        if lower.contains("could not resolve hostname")
            || lower.contains("ssh: connect to host")
            || lower.contains("proxycommand")
            || lower.contains("stdio forwarding failed")
        {
            return Some(Error::Connect { host, message });
        }

        None
    }
}

/// Result type for ssh operations.
pub type Result<T> = std::result::Result<T, Error>;
