#![forbid(unsafe_code)]

use thiserror::Error;

/// Structural problems found while loading an image. All of them are
/// detected by `Image::open`/`Image::from_parts`, never on a later query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("malformed path table: {0}")]
    MalformedPathTable(String),

    #[error("duplicate path in path table: {0}")]
    DuplicatePath(String),

    #[error("corrupt offset table: {0}")]
    CorruptOffsetTable(String),

    #[error("size mismatch for file {file_id}: payload {payload_len} bytes, original {original_len} bytes")]
    SizeMismatch {
        file_id: usize,
        payload_len: u64,
        original_len: u64,
    },

    #[error("image holds compressed files but fsimage was built without zstd feature")]
    CompressionUnsupported,

    #[error("invalid image: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load image: {0}")]
    Load(#[from] LoadError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid file id {id} (image holds {count} files)")]
    InvalidFileId { id: usize, count: usize },

    #[error("decompression failed for file {file_id}: {reason}")]
    Decompression { file_id: usize, reason: String },

    #[error("size mismatch for file {file_id}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        file_id: usize,
        expected: u64,
        actual: u64,
    },

    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    #[error("path is outside input dir: {0}")]
    Outside(String),

    #[error("compression requested but fsimage was built without zstd feature")]
    NoZstd,
}

impl ImageError {
    /// The load-time kind, if this error came out of `open`.
    pub fn load_kind(&self) -> Option<&LoadError> {
        match self {
            ImageError::Load(e) => Some(e),
            _ => None,
        }
    }
}

pub type ImageResult<T> = Result<T, ImageError>;
