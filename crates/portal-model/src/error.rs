use thiserror::Error;

/// Error taxonomy for the portal ETL pipeline.
///
/// `Config` and `Auth` are always fatal. `Storage` is fatal when it occurs
/// during template load, anchor resolution, or the final write; during
/// descriptor load or intermediate write it fails only that descriptor.
/// Data-quality findings are never errors; they accumulate on the
/// [`RunReport`](crate::RunReport) as warnings.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("config error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("auth error: {0}")]
    Auth(String),
    /// Raised once at the end of a run when the monitor finds findings
    /// severe enough to block publication (all-null output columns).
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortalError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
