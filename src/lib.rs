#![forbid(unsafe_code)]

//! Read-only filesystem images.
//!
//! An image bundles a NUL-separated path table, a concatenated content blob
//! with its offset table, a working directory and optional zstd payloads into
//! one buffer. [`Image::open`] validates all of it up front; lookups after that
//! are plain slicing (or one decompression) on immutable data.

pub mod image;

pub use image::{
    Image, ImageBuilder, ImageError, ImageFile, ImageParts, ImageResult, LoadError, PayloadKind,
};
