//! Wire types shared by the fivecut upload client crates.
//!
//! Everything here is plain data: request/response bodies for the
//! upload-coordination service and the session state enum surfaced
//! to callers. No I/O lives in this crate.

pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    CompleteRequest, CompleteResponse, CompletedPartWire, HealthResponse, InitiateRequest,
    InitiateResponse, RecentItem, RecentUploadsResponse, SignPartRequest, SignPartResponse,
};
pub use types::{UploadProgress, UploadState};
