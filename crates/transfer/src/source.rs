use std::future::Future;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::TransferError;

/// Random-access bytes to upload.
///
/// Parts are read lazily, one range per transfer, so at most
/// `concurrency` part bodies are held in memory at a time.
pub trait ByteSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly the bytes in `range`.
    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>>;
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file on disk. Each read opens its own handle, so workers never
/// contend on a shared cursor.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Opens `path` and records its current size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        Ok(Self {
            path,
            len: metadata.len(),
        })
    }

    /// Final path component, used as the upload's filename.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_range(&range, self.len)?;
            let mut file = tokio::fs::File::open(&self.path).await?;
            file.seek(SeekFrom::Start(range.start)).await?;
            let mut buf = vec![0u8; (range.end - range.start) as usize];
            // A file truncated mid-upload surfaces as UnexpectedEof.
            file.read_exact(&mut buf).await?;
            Ok(buf)
        })
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(
        &self,
        range: Range<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TransferError>> + Send + '_>> {
        Box::pin(async move {
            check_range(&range, self.len())?;
            Ok(self.data[range.start as usize..range.end as usize].to_vec())
        })
    }
}

fn check_range(range: &Range<u64>, len: u64) -> Result<(), TransferError> {
    if range.start > range.end || range.end > len {
        return Err(TransferError::InvalidInput(format!(
            "range {}..{} outside source of {len} bytes",
            range.start, range.end
        )));
    }
    Ok(())
}
