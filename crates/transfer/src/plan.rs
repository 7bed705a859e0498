use std::ops::Range;

use crate::TransferError;

/// One part of a multipart upload: a 1-based number and its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    pub part_number: u32,
    /// Half-open range `[start, end)` within the source.
    pub range: Range<u64>,
}

impl PartDescriptor {
    /// Size of the part in bytes.
    pub fn len(&self) -> u64 {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Splits `total_bytes` into parts of `chunk_size` bytes.
///
/// Part numbers start at 1 and follow emission order. Every part but the
/// last is exactly `chunk_size` long; the last one ends at `total_bytes`.
/// Both arguments must be positive.
pub fn plan(total_bytes: u64, chunk_size: u64) -> Result<Vec<PartDescriptor>, TransferError> {
    if total_bytes == 0 {
        return Err(TransferError::InvalidInput(
            "total size must be positive".into(),
        ));
    }
    if chunk_size == 0 {
        return Err(TransferError::InvalidInput(
            "chunk size must be positive".into(),
        ));
    }

    let count = total_bytes.div_ceil(chunk_size);
    if count > u64::from(u32::MAX) {
        return Err(TransferError::InvalidInput(format!(
            "{count} parts exceed the part number range"
        )));
    }

    let parts = (0..count)
        .map(|index| {
            let start = index * chunk_size;
            let end = start.saturating_add(chunk_size).min(total_bytes);
            PartDescriptor {
                part_number: index as u32 + 1,
                range: start..end,
            }
        })
        .collect();

    Ok(parts)
}
