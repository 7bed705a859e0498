//! Upload error types.

use fivecut_coordinator::CoordinatorError;
use fivecut_transfer::TransferError;

/// Terminal errors of an upload session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("transfer error: {0}")]
    Transfer(TransferError),

    #[error("manifest has {actual} parts, expected {expected}")]
    IncompleteManifest { expected: usize, actual: usize },

    #[error("upload canceled")]
    Canceled,

    #[error("session already started")]
    AlreadyStarted,
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidInput(msg) => Self::InvalidInput(msg),
            TransferError::Cancelled => Self::Canceled,
            other => Self::Transfer(other),
        }
    }
}

impl UploadError {
    /// Part the failure is attributed to, if it came from one.
    pub fn part_number(&self) -> Option<u32> {
        match self {
            Self::Transfer(e) => e.part_number(),
            _ => None,
        }
    }
}
