#![forbid(unsafe_code)]

use crate::image::error::{ImageError, ImageResult, LoadError};
use crate::image::format::FileId;

/// A concatenated blob plus the N+1 offsets that cut it into per-file ranges.
///
/// Constructing one checks every offset, so `slice` never goes out of bounds.
#[derive(Debug, Clone)]
pub(crate) struct BlobTable<'a> {
    blob: &'a [u8],
    offsets: Vec<u64>,
}

impl<'a> BlobTable<'a> {
    pub fn new(blob: &'a [u8], offsets: Vec<u64>, files: usize, what: &str) -> Result<Self, LoadError> {
        if offsets.len() != files + 1 {
            return Err(LoadError::CorruptOffsetTable(format!(
                "{what}: expected {} offsets for {files} files, found {}",
                files + 1,
                offsets.len()
            )));
        }
        if offsets[0] != 0 {
            return Err(LoadError::CorruptOffsetTable(format!(
                "{what}: first offset is {}, expected 0",
                offsets[0]
            )));
        }
        if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(LoadError::CorruptOffsetTable(format!(
                "{what}: offset {} ({}) is below offset {i} ({})",
                i + 1,
                offsets[i + 1],
                offsets[i]
            )));
        }
        let last = offsets[files];
        if last != blob.len() as u64 {
            return Err(LoadError::CorruptOffsetTable(format!(
                "{what}: last offset {last} does not match blob length {}",
                blob.len()
            )));
        }

        Ok(Self { blob, offsets })
    }

    pub fn files(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn len_of(&self, id: FileId) -> ImageResult<u64> {
        self.check(id)?;
        Ok(self.offsets[id + 1] - self.offsets[id])
    }

    /// Borrowed view of file `id`'s bytes.
    pub fn slice(&self, id: FileId) -> ImageResult<&'a [u8]> {
        self.check(id)?;
        // Offsets were bounded by blob.len() at construction.
        let start = self.offsets[id] as usize;
        let end = self.offsets[id + 1] as usize;
        Ok(&self.blob[start..end])
    }

    fn check(&self, id: FileId) -> ImageResult<()> {
        if id >= self.files() {
            return Err(ImageError::InvalidFileId {
                id,
                count: self.files(),
            });
        }
        Ok(())
    }
}
