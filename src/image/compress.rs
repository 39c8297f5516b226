#![forbid(unsafe_code)]

use std::borrow::Cow;

use crate::image::blob::BlobTable;
use crate::image::error::{ImageError, ImageResult, LoadError};
use crate::image::format::{FileId, PayloadKind};

/// Where file bytes come from: the plain content blob, or the compressed blob
/// with its original-size table.
#[derive(Debug)]
pub(crate) enum Payloads<'a> {
    Plain(BlobTable<'a>),
    Compressed {
        table: BlobTable<'a>,
        original_sizes: Vec<u64>,
    },
}

impl<'a> Payloads<'a> {
    /// Validates that every payload is at most its original size, and that
    /// this build can decompress what it has to.
    pub fn compressed(table: BlobTable<'a>, original_sizes: Vec<u64>) -> Result<Self, LoadError> {
        if original_sizes.len() != table.files() {
            return Err(LoadError::CorruptOffsetTable(format!(
                "original sizes: expected {} entries, found {}",
                table.files(),
                original_sizes.len()
            )));
        }

        let mut any_compressed = false;
        for (file_id, &original_len) in original_sizes.iter().enumerate() {
            let payload_len = table.len_of(file_id).map_err(|_| {
                LoadError::CorruptOffsetTable(format!("compressed offsets: no range for file {file_id}"))
            })?;
            if payload_len > original_len {
                return Err(LoadError::SizeMismatch {
                    file_id,
                    payload_len,
                    original_len,
                });
            }
            any_compressed |= payload_len < original_len;
        }

        if any_compressed && !cfg!(feature = "zstd") {
            return Err(LoadError::CompressionUnsupported);
        }

        Ok(Payloads::Compressed {
            table,
            original_sizes,
        })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Payloads::Compressed { .. })
    }

    pub fn kind(&self, id: FileId) -> ImageResult<PayloadKind> {
        match self {
            Payloads::Plain(table) => table.len_of(id).map(|_| PayloadKind::Stored),
            Payloads::Compressed {
                table,
                original_sizes,
            } => {
                let payload_len = table.len_of(id)?;
                Ok(if payload_len < original_sizes[id] {
                    PayloadKind::Compressed
                } else {
                    PayloadKind::Stored
                })
            }
        }
    }

    pub fn payload_len(&self, id: FileId) -> ImageResult<u64> {
        match self {
            Payloads::Plain(table) | Payloads::Compressed { table, .. } => table.len_of(id),
        }
    }

    pub fn original_len(&self, id: FileId) -> ImageResult<u64> {
        match self {
            Payloads::Plain(table) => table.len_of(id),
            Payloads::Compressed {
                table,
                original_sizes,
            } => {
                table.len_of(id)?;
                Ok(original_sizes[id])
            }
        }
    }

    /// Stored files come back borrowed from the image; compressed ones are
    /// decoded into a fresh buffer of exactly the original size.
    pub fn materialize(&self, id: FileId) -> ImageResult<Cow<'a, [u8]>> {
        match self {
            Payloads::Plain(table) => Ok(Cow::Borrowed(table.slice(id)?)),
            Payloads::Compressed {
                table,
                original_sizes,
            } => {
                let payload = table.slice(id)?;
                let expected = original_sizes[id];
                if payload.len() as u64 == expected {
                    return Ok(Cow::Borrowed(payload));
                }

                log::trace!(
                    "decompressing file {id}: {} -> {expected} bytes",
                    payload.len()
                );
                let raw = decompress(id, payload, expected)?;
                if raw.len() as u64 != expected {
                    return Err(ImageError::SizeMismatch {
                        file_id: id,
                        expected,
                        actual: raw.len() as u64,
                    });
                }
                Ok(Cow::Owned(raw))
            }
        }
    }
}

/// Decodes at most one byte past `expected`, so an oversized frame is caught
/// without inflating all of it.
#[cfg(feature = "zstd")]
fn decompress(file_id: FileId, payload: &[u8], expected: u64) -> ImageResult<Vec<u8>> {
    use std::io::Read;

    let to_err = |e: std::io::Error| ImageError::Decompression {
        file_id,
        reason: e.to_string(),
    };
    let decoder = zstd::stream::read::Decoder::with_buffer(payload).map_err(to_err)?;
    let mut out = Vec::new();
    decoder
        .take(expected.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(to_err)?;
    Ok(out)
}

#[cfg(not(feature = "zstd"))]
fn decompress(_file_id: FileId, _payload: &[u8], _expected: u64) -> ImageResult<Vec<u8>> {
    Err(ImageError::NoZstd)
}

/// Encodes `raw` with zstd. `None` means the frame would not be smaller, and
/// the file should be stored as is.
#[cfg(feature = "zstd")]
pub(crate) fn compress(raw: &[u8], level: i32) -> ImageResult<Option<Vec<u8>>> {
    let frame = zstd::bulk::compress(raw, level)?;
    Ok((frame.len() < raw.len()).then_some(frame))
}

#[cfg(not(feature = "zstd"))]
pub(crate) fn compress(_raw: &[u8], _level: i32) -> ImageResult<Option<Vec<u8>>> {
    Err(ImageError::NoZstd)
}
