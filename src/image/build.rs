#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

use crate::image::compress::compress;
use crate::image::error::{ImageError, ImageResult, LoadError};
use crate::image::format::{encode_image, CompressionParts, ImageParts};
use crate::image::path::{mounted, normalize_rel_path, should_exclude};
use crate::image::path_table;

/// Knobs for packing a directory tree into an image.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Mount prefix inside the image (e.g. "assets").
    pub prefix: String,
    /// Working directory recorded in the image; defaults to the mount root.
    pub working_dir: Option<String>,
    pub excludes: Vec<String>,
    pub compress: bool,
    pub zstd_level: i32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            working_dir: None,
            excludes: Vec::new(),
            compress: false,
            zstd_level: 6,
        }
    }
}

/// Assembles an image in memory.
///
/// Determinism rules:
/// - entries are sorted lexicographically by path bytes
/// - a file is kept compressed only when its frame is strictly smaller
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    working_dir: String,
    zstd_level: Option<i32>,
    files: BTreeMap<String, Vec<u8>>,
}

impl ImageBuilder {
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            zstd_level: None,
            files: BTreeMap::new(),
        }
    }

    /// Enables zstd for payloads at `level` (1..=22).
    pub fn compress(mut self, level: i32) -> Self {
        self.zstd_level = Some(level);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> ImageResult<&mut Self> {
        let path = path.into();
        if path.as_bytes().contains(&0) {
            return Err(ImageError::InvalidPath(path));
        }
        if self.files.contains_key(&path) {
            return Err(LoadError::DuplicatePath(path).into());
        }
        self.files.insert(path, content.into());
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn write_to(&self, out: &mut dyn Write) -> ImageResult<()> {
        if self.files.is_empty() {
            return Err(LoadError::MalformedPathTable("image has no files".into()).into());
        }

        let paths: Vec<&str> = self.files.keys().map(String::as_str).collect();
        let path_table = path_table::encode(&paths)?;

        match self.zstd_level {
            None => {
                let mut blob = Vec::new();
                let mut offsets = vec![0u64];
                for content in self.files.values() {
                    blob.extend_from_slice(content);
                    offsets.push(blob.len() as u64);
                }

                log::debug!("packing {} files, {} bytes, uncompressed", paths.len(), blob.len());
                encode_image(
                    &ImageParts {
                        paths: &path_table,
                        files: &blob,
                        offsets: &offsets,
                        working_dir: &self.working_dir,
                        compression: None,
                    },
                    out,
                )
            }
            Some(level) => {
                let mut blob = Vec::new();
                let mut offsets = vec![0u64];
                let mut original_sizes = Vec::with_capacity(self.files.len());
                let mut compressed = 0usize;

                for content in self.files.values() {
                    match compress(content, level)? {
                        Some(frame) => {
                            blob.extend_from_slice(&frame);
                            compressed += 1;
                        }
                        None => blob.extend_from_slice(content),
                    }
                    offsets.push(blob.len() as u64);
                    original_sizes.push(content.len() as u64);
                }

                log::debug!(
                    "packing {} files ({compressed} compressed at level {level}), {} payload bytes",
                    paths.len(),
                    blob.len()
                );
                let empty_offsets = vec![0u64; paths.len() + 1];
                encode_image(
                    &ImageParts {
                        paths: &path_table,
                        files: &[],
                        offsets: &empty_offsets,
                        working_dir: &self.working_dir,
                        compression: Some(CompressionParts {
                            blob: &blob,
                            offsets: &offsets,
                            original_sizes: &original_sizes,
                        }),
                    },
                    out,
                )
            }
        }
    }

    pub fn finish(&self) -> ImageResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }
}

/// Walks `input` and packs every regular file into the image at `output`.
pub fn pack_dir(input: &Path, output: &Path, opts: &PackOptions) -> ImageResult<usize> {
    if opts.compress && !cfg!(feature = "zstd") {
        return Err(ImageError::NoZstd);
    }

    let working_dir = opts
        .working_dir
        .clone()
        .unwrap_or_else(|| mounted(&opts.prefix, ""));
    let working_dir = working_dir.trim_end_matches('/');
    let working_dir = if working_dir.is_empty() { "/" } else { working_dir };

    let mut builder = ImageBuilder::new(working_dir);
    if opts.compress {
        builder = builder.compress(opts.zstd_level);
    }

    for ent in WalkDir::new(input).follow_links(false).into_iter() {
        let ent = ent.map_err(|e| {
            let msg = e.to_string();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
            ImageError::Io(io)
        })?;

        if !ent.file_type().is_file() {
            continue;
        }

        let rel = normalize_rel_path(input, ent.path())?;
        let logical = mounted(&opts.prefix, &rel);
        if should_exclude(&logical, &opts.excludes) {
            log::debug!("excluded {logical}");
            continue;
        }

        let content = std::fs::read(ent.path())?;
        builder.add_file(logical, content)?;
    }

    // Nothing reaches `output` unless the whole image encodes.
    let bytes = builder.finish()?;
    std::fs::write(output, bytes)?;
    Ok(builder.len())
}
