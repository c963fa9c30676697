use thiserror::Error;

/// Failure talking to the social service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),

    /// The service answered but reported `success: false`.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged; prior state retained, no interruption.
    Transient,
    /// Surfaced through an alert.
    UserVisible,
    /// Falls back to an empty/zero value.
    SilentDegradation,
}

impl RemoteError {
    /// True when retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
            || matches!(self, RemoteError::Server { status: 401 | 403, .. })
    }
}

/// Log a swallowed remote failure with its severity class.
pub(crate) fn log_failure(operation: &str, err: &RemoteError, severity: Severity) {
    tracing::warn!(
        operation,
        ?severity,
        transient = err.is_transient(),
        "remote call failed: {}",
        err
    );
}

/// Errors returned by the dashboard's fallible entry points.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("unknown tab: {0}")]
    InvalidTab(String),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
