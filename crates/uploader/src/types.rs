//! Session options, events and outcomes.

use std::path::Path;
use std::sync::Arc;

use fivecut_protocol::UploadState;
use fivecut_transfer::{ByteSource, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, FileSource, MemorySource};

use crate::UploadError;
use crate::content_type::content_type_for;

/// Tuning knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Part size in bytes.
    pub chunk_size: u64,
    /// Parts in flight at once (minimum 1).
    pub concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl UploadOptions {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// The file to upload: its bytes plus the metadata sent on initiate.
#[derive(Clone)]
pub struct UploadFile {
    pub source: Arc<dyn ByteSource>,
    pub filename: String,
    pub content_type: String,
}

impl UploadFile {
    /// Opens a file on disk, inferring the content type from its extension.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let source = FileSource::open(path).await?;
        let filename = source.file_name();
        let content_type = content_type_for(&filename).to_string();
        Ok(Self {
            source: Arc::new(source),
            filename,
            content_type,
        })
    }

    /// Wraps in-memory bytes.
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let filename = filename.into();
        let content_type = content_type_for(&filename).to_string();
        Self {
            source: Arc::new(MemorySource::new(data)),
            filename,
            content_type,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.source.len())
            .finish()
    }
}

/// Result of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub session_id: String,
    pub object_key: String,
    /// Playback URL for the stored object.
    pub url: String,
    pub total_bytes: u64,
    pub part_count: usize,
}

/// Events emitted while a session runs.
///
/// Terminal transitions are reported by [`UploadEvent::Succeeded`],
/// [`UploadEvent::Failed`] or [`UploadEvent::Canceled`] rather than
/// `StateChanged`.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StateChanged {
        state: UploadState,
    },
    PartCompleted {
        part_number: u32,
        bytes: u64,
    },
    Progress {
        uploaded_bytes: u64,
        total_bytes: u64,
        fraction: f64,
    },
    Succeeded {
        object_key: String,
        url: String,
    },
    Failed {
        error: String,
    },
    Canceled,
}

impl UploadEvent {
    /// Returns `true` for the last event a session emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Canceled
        )
    }
}
