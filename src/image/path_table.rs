#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::image::error::{ImageError, ImageResult, LoadError};
use crate::image::format::FileId;

/// Splits a NUL-separated, NUL-terminated path table into `(path, file_id)`
/// pairs in table order. Empty segments are kept as empty paths.
pub fn decode(table: &[u8]) -> Result<Vec<(&str, FileId)>, LoadError> {
    match table.last() {
        None => return Err(LoadError::MalformedPathTable("path table is empty".into())),
        Some(0) => {}
        Some(_) => {
            return Err(LoadError::MalformedPathTable(
                "path table is missing its trailing NUL".into(),
            ))
        }
    }

    table[..table.len() - 1]
        .split(|b| *b == 0)
        .enumerate()
        .map(|(id, seg)| {
            std::str::from_utf8(seg)
                .map(|path| (path, id))
                .map_err(|_| LoadError::MalformedPathTable(format!("path {id} is not utf8")))
        })
        .collect()
}

/// Inverse of [`decode`]: every path is written followed by a NUL.
pub fn encode<S: AsRef<str>>(paths: &[S]) -> ImageResult<Vec<u8>> {
    let mut out = Vec::with_capacity(paths.iter().map(|p| p.as_ref().len() + 1).sum());
    for p in paths {
        let p = p.as_ref();
        if p.as_bytes().contains(&0) {
            return Err(ImageError::InvalidPath(p.to_string()));
        }
        out.extend_from_slice(p.as_bytes());
        out.push(0);
    }
    Ok(out)
}

/// Path to file-id lookup built once at load time.
///
/// Kept ordered so directory listings can range-scan by prefix.
#[derive(Debug)]
pub(crate) struct PathIndex<'a> {
    by_id: Vec<&'a str>,
    by_path: BTreeMap<&'a str, FileId>,
}

impl<'a> PathIndex<'a> {
    pub fn build(entries: Vec<(&'a str, FileId)>) -> Result<Self, LoadError> {
        let mut by_path = BTreeMap::new();
        let mut by_id = Vec::with_capacity(entries.len());

        for (path, id) in entries {
            if by_path.insert(path, id).is_some() {
                return Err(LoadError::DuplicatePath(path.to_string()));
            }
            by_id.push(path);
        }

        Ok(Self { by_id, by_path })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn get(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    pub fn path(&self, id: FileId) -> Option<&'a str> {
        self.by_id.get(id).copied()
    }

    pub fn paths(&self) -> &[&'a str] {
        &self.by_id
    }

    /// Stored paths that start with `prefix`, in byte order.
    pub fn with_prefix<'s>(&'s self, prefix: &'s str) -> impl Iterator<Item = &'a str> + 's {
        self.by_path
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(p, _)| *p)
            .take_while(move |p| p.starts_with(prefix))
    }
}
