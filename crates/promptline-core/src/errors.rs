/// Errors surfaced by registry operations.
///
/// "No active version" is not an error: resolution returns `Ok(None)` for an
/// empty scope. Callers branch on the variant to decide whether to fix the
/// request, configure the scope, or retry.
#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("version store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("scope integrity violated: {0}")]
    Integrity(String),
}

impl RolloutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Stable machine-readable code, mirrored in CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::StoreUnavailable(_) => "E_STORE_UNAVAILABLE",
            Self::Integrity(_) => "E_INTEGRITY",
        }
    }

    /// Only store failures are worth retrying; the core never retries itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, RolloutError>;

/// Settings file could not be read or parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);
