#![forbid(unsafe_code)]

use std::path::Path;

use crate::image::error::{ImageError, ImageResult};

/// Path of `file_path` below `input_root`, with forward slashes and no leading slash.
pub fn normalize_rel_path(input_root: &Path, file_path: &Path) -> ImageResult<String> {
    let rel = file_path
        .strip_prefix(input_root)
        .map_err(|_| ImageError::Outside(file_path.to_string_lossy().into_owned()))?;

    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().replace('\\', "/"))
        .collect();
    let out = parts.join("/").trim_start_matches('/').to_string();

    if out.is_empty() {
        return Err(ImageError::InvalidPath(file_path.to_string_lossy().into_owned()));
    }
    Ok(out)
}

/// Absolute image path for `rel` mounted under `prefix`.
pub fn mounted(prefix: &str, rel: &str) -> String {
    let p = prefix.replace('\\', "/");
    let p = p.trim_matches('/');
    let r = rel.trim_start_matches('/');
    if p.is_empty() {
        format!("/{r}")
    } else {
        format!("/{p}/{r}")
    }
}

pub fn should_exclude(norm_path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|e| !e.is_empty() && norm_path.contains(e))
}

/// Joins `path` onto `base` unless it is already absolute. `.` and empty
/// components are dropped, `..` pops one component and stops at the root.
pub fn resolve_against(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }

    let mut stack: Vec<&str> = base.split('/').filter(|c| !c.is_empty()).collect();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }

    format!("/{}", stack.join("/"))
}
