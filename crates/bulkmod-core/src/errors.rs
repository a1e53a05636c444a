use std::time::Duration;

/// Core error type for the moderation bot.
///
/// Adapter crates should map their specific errors into this type so the
/// engine can tell rate-limit signals apart from terminal failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),

    /// Platform flood control. Carries the platform-suggested wait.
    #[error("rate limited: retry after {}s", .0.as_secs())]
    RateLimited(Duration),

    #[error("access denied: caller is not a privileged operator")]
    AccessDenied,

    #[error("missing permission: {0}")]
    PermissionMissing(String),

    #[error("could not fetch members: {0}")]
    FetchFailure(String),
}

impl Error {
    /// Suggested wait for rate-limit errors, `None` for everything else.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited(d) => Some(*d),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
