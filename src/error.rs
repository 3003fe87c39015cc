use thiserror::Error;

pub type Result<T> = std::result::Result<T, FdwError>;

/// Errors surfaced by the adapter and its collaborators.
///
/// Connection and remote-query failures propagate unchanged from the
/// transport layer; there is no retry at this level. A pending ("still
/// executing") fetch is an outcome, never an error.
#[derive(Debug, Error)]
pub enum FdwError {
    #[error("configuration: {0}")]
    Config(String),
    #[error("connection: {0}")]
    Connection(String),
    #[error("remote query failed: {0}")]
    Remote(String),
    #[error("conversion failed for column '{column}': {reason}")]
    Conversion { column: String, reason: String },
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl FdwError {
    /// Builds a [`FdwError::Conversion`] for a specific column.
    pub fn conversion(column: impl Into<String>, reason: impl Into<String>) -> Self {
        FdwError::Conversion {
            column: column.into(),
            reason: reason.into(),
        }
    }
}
