#![forbid(unsafe_code)]

mod blob;
mod build;
mod compress;
mod error;
mod format;
#[allow(clippy::module_inception)]
mod image;
mod io;
mod ops;
mod path;
pub mod path_table;
mod reader;

pub use build::{pack_dir, ImageBuilder, PackOptions};
pub use error::{ImageError, ImageResult, LoadError};
pub use format::{
    encode_image, encode_legacy_image, CompressionParts, EntryInfo, EntryKind, FileId, ImageParts,
    Metadata, PayloadKind, FOOTER_MAGIC, MAGIC,
};
pub use image::Image;
pub use path::resolve_against;
pub use reader::ImageFile;

pub use ops::{cat, entries, extract, info, list, pack, verify};
