//! Multipart upload orchestration: initiate, transfer, complete.
//!
//! This crate implements the **session logic** for uploading one large
//! file through the coordination service. It has no UI dependencies;
//! callers drive an [`UploadSession`] and observe its progress.
//!
//! # Pipeline
//!
//! 1. **Plan**: split the file into fixed-size parts
//! 2. **Initiate**: open a multipart session with the coordinator
//! 3. **Transfer**: sign and PUT parts through a bounded worker pool
//! 4. **Complete**: submit the sorted manifest of part tokens
//!
//! Cancellation is cooperative and never leads to a completion call.

pub mod content_type;
pub mod coordinator;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export primary types for convenience.
pub use content_type::{content_type_for, detect_content_type};
pub use coordinator::{Coordinator, PartStore};
pub use error::UploadError;
pub use session::UploadSession;
pub use transport::SessionTransport;
pub use types::{UploadEvent, UploadFile, UploadOptions, UploadOutcome};
