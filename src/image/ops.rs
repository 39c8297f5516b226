#![forbid(unsafe_code)]

use std::io::Write;
use std::path::Path;

use crate::image::build::{pack_dir, PackOptions};
use crate::image::error::{ImageError, ImageResult};
use crate::image::format::EntryInfo;
use crate::image::image::Image;

pub fn pack(input: &Path, output: &Path, opts: &PackOptions) -> ImageResult<()> {
    let count = pack_dir(input, output, opts)?;
    log::info!("packed {count} files into {}", output.display());
    Ok(())
}

/// Read image entries, hashing the materialized content of each.
pub fn entries(image: &Path) -> ImageResult<Vec<EntryInfo>> {
    let bytes = std::fs::read(image)?;
    let img = Image::open(&bytes)?;
    img.entries()
}

pub fn list(image: &Path, verbose: bool) -> ImageResult<()> {
    for e in entries(image)? {
        if verbose {
            println!(
                "{}  id={} payload={} raw={} kind={} hash={}",
                e.path, e.file_id, e.payload_len, e.raw_len, e.payload_kind, e.raw_hash_hex
            );
        } else {
            println!("{}", e.path);
        }
    }
    Ok(())
}

/// Writes one file to `out`. Relative paths resolve against the working directory.
pub fn cat(image: &Path, path: &str, out: &mut dyn Write) -> ImageResult<()> {
    let bytes = std::fs::read(image)?;
    let img = Image::open(&bytes)?;
    let content = img.read_relative(path)?;
    out.write_all(&content)?;
    Ok(())
}

pub fn extract(image: &Path, output: &Path, filter: &[String]) -> ImageResult<usize> {
    let bytes = std::fs::read(image)?;
    let img = Image::open(&bytes)?;
    std::fs::create_dir_all(output)?;

    let mut written = 0;
    for (id, path) in img.paths().iter().enumerate() {
        if !filter.is_empty() && !filter.iter().any(|s| path.contains(s.as_str())) {
            continue;
        }

        let rel = path.trim_start_matches('/');
        if rel.is_empty() || rel.split('/').any(|c| c == "..") {
            return Err(ImageError::InvalidPath(path.to_string()));
        }

        let raw = img.read_by_id(id)?;
        let out_path = output.join(rel.replace('/', std::path::MAIN_SEPARATOR_STR));
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, &raw)?;
        log::debug!("extracted {path} ({} bytes)", raw.len());
        written += 1;
    }

    Ok(written)
}

pub fn verify(image: &Path) -> ImageResult<()> {
    let bytes = std::fs::read(image)?;
    let img = Image::open(&bytes)?;
    let count = img.verify()?;

    println!("ok: {count} entries");
    Ok(())
}

pub fn info(image: &Path) -> ImageResult<()> {
    let bytes = std::fs::read(image)?;
    let img = Image::open(&bytes)?;

    println!("working dir : {}", img.working_directory());
    println!("files       : {}", img.file_count());
    println!(
        "compression : {}",
        if img.is_compressed() { "zstd" } else { "off" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("sub").join("b.txt"), "beta".repeat(500)).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();
        dir
    }

    #[test]
    fn pack_then_extract() {
        let src = tree();
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("out.img");

        let opts = PackOptions {
            prefix: "app".into(),
            excludes: vec![".git".into()],
            ..PackOptions::default()
        };
        pack(src.path(), &image, &opts).unwrap();

        let names: Vec<String> = entries(&image).unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(names, vec!["/app/a.txt", "/app/sub/b.txt"]);

        let out = work.path().join("x");
        assert_eq!(extract(&image, &out, &[]).unwrap(), 2);
        assert_eq!(fs::read_to_string(out.join("app").join("a.txt")).unwrap(), "alpha");

        let mut buf = Vec::new();
        cat(&image, "sub/b.txt", &mut buf).unwrap();
        assert_eq!(buf.len(), 2000);

        verify(&image).unwrap();
    }

    #[test]
    fn extract_honours_filter() {
        let src = tree();
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("out.img");
        pack(src.path(), &image, &PackOptions::default()).unwrap();

        let out = work.path().join("x");
        assert_eq!(extract(&image, &out, &["sub/".to_string()]).unwrap(), 1);
        assert!(out.join("sub").join("b.txt").exists());
        assert!(!out.join("a.txt").exists());
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn compressed_pack_verifies() {
        let src = tree();
        let work = tempfile::tempdir().unwrap();
        let image = work.path().join("out.img");

        let opts = PackOptions {
            compress: true,
            zstd_level: 3,
            ..PackOptions::default()
        };
        pack(src.path(), &image, &opts).unwrap();
        verify(&image).unwrap();

        let e = entries(&image).unwrap();
        let b = e.iter().find(|e| e.path == "/sub/b.txt").unwrap();
        assert_eq!(b.payload_kind, "zstd");
        assert_eq!(b.raw_len, 2000);
        assert!(b.payload_len < 2000);
    }
}
