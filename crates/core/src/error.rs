use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("dependency cycle detected")]
    Cycle,
    /// The underlying cloud call failed; the message is already formatted for the caller.
    #[error("{0}")]
    Cloud(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("timed out waiting for {what} after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
