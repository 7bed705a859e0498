//! Chunked part transfers for multipart uploads.
//!
//! - [`plan`] splits a byte length into contiguous, 1-based parts.
//! - [`ByteSource`] reads a part's byte range from a file or memory.
//! - [`TransferExecutor`] pushes parts through a fixed pool of workers,
//!   collecting one integrity token per part.
//! - [`SpeedCalculator`] turns per-part byte counts into throughput/ETA.

mod executor;
mod plan;
mod progress;
mod source;

pub use executor::{CompletedPart, PartTransport, PutResponse, TransferExecutor};
pub use plan::{PartDescriptor, plan};
pub use progress::SpeedCalculator;
pub use source::{ByteSource, FileSource, MemorySource};

/// Default part size: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default number of parts in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Boxed error from a collaborator (coordinator, HTTP stack).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing part {part_number} failed: {source}")]
    Sign {
        part_number: u32,
        #[source]
        source: BoxError,
    },

    #[error("PUT part {part_number} failed: HTTP {status}")]
    Http { part_number: u32, status: u16 },

    #[error("PUT part {part_number} failed: {source}")]
    Request {
        part_number: u32,
        #[source]
        source: BoxError,
    },

    #[error("missing ETag for part {part_number}")]
    MissingIntegrityToken { part_number: u32 },

    #[error("cancelled")]
    Cancelled,

    #[error("worker failed: {0}")]
    Worker(String),
}

impl TransferError {
    /// Part number the error is attributed to, if any.
    pub fn part_number(&self) -> Option<u32> {
        match self {
            Self::Sign { part_number, .. }
            | Self::Http { part_number, .. }
            | Self::Request { part_number, .. }
            | Self::MissingIntegrityToken { part_number } => Some(*part_number),
            _ => None,
        }
    }
}
