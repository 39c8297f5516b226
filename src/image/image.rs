#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::image::blob::BlobTable;
use crate::image::compress::Payloads;
use crate::image::error::{ImageError, ImageResult, LoadError};
use crate::image::format::{
    EntryInfo, EntryKind, FileId, ImageParts, Metadata, PayloadKind, FLAG_COMPRESSION,
    FOOTER_LEN, FOOTER_MAGIC, LEGACY_SECTIONS, MAGIC, SECTIONS,
};
use crate::image::io::{checksum32, decode_u64_table, hex32, ByteReader};
use crate::image::path::resolve_against;
use crate::image::path_table::{self, PathIndex};
use crate::image::reader::ImageFile;

/// A loaded, immutable filesystem image.
///
/// Every table is validated when the image is built; queries afterwards only
/// fail for per-file reasons (missing path, bad compressed frame). The image
/// is `Sync`, so one value can serve any number of readers.
#[derive(Debug)]
pub struct Image<'a> {
    index: PathIndex<'a>,
    content: BlobTable<'a>,
    payloads: Payloads<'a>,
    working_dir: &'a str,
}

impl<'a> Image<'a> {
    /// Parses a packed image. Nothing is copied except the offset tables.
    pub fn open(bytes: &'a [u8]) -> ImageResult<Self> {
        Ok(Self::parse(bytes)?)
    }

    /// Loads an image from separately supplied tables.
    pub fn from_parts(parts: ImageParts<'a>) -> ImageResult<Self> {
        let compression = parts.compression.map(|c| {
            (
                c.blob,
                c.offsets.to_vec(),
                c.original_sizes.to_vec(),
            )
        });
        Ok(Self::assemble(
            parts.paths,
            parts.files,
            parts.offsets.to_vec(),
            parts.working_dir,
            compression,
        )?)
    }

    fn parse(bytes: &'a [u8]) -> Result<Self, LoadError> {
        if bytes.len() < MAGIC.len() + 8 + FOOTER_LEN {
            return Err(LoadError::Invalid("image too small".into()));
        }

        let (body, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
        let mut foot = ByteReader::new(footer);
        if foot.read_exact::<8>("footer magic")? != FOOTER_MAGIC {
            return Err(LoadError::Invalid("bad footer magic".into()));
        }
        let checksum = foot.read_u32("checksum")?;
        let _reserved = foot.read_u32("reserved")?;
        if checksum32(body) != checksum {
            return Err(LoadError::Invalid("checksum mismatch".into()));
        }

        let mut cur = ByteReader::new(body);
        if cur.read_exact::<8>("header magic")? != MAGIC {
            return Err(LoadError::Invalid("bad header magic".into()));
        }
        let flags = cur.read_u32("flags")?;
        if flags & !FLAG_COMPRESSION != 0 {
            return Err(LoadError::Invalid(format!("unknown flags {flags:#x}")));
        }
        let sections = cur.read_u32("section count")?;
        if sections != SECTIONS && sections != LEGACY_SECTIONS {
            return Err(LoadError::Invalid(format!("unsupported section count {sections}")));
        }

        let paths = cur.section("path table")?;
        let files = cur.section("content blob")?;
        let offsets = decode_u64_table(cur.section("offset table")?, "offset table")?;
        let working_dir = std::str::from_utf8(cur.section("working directory")?)
            .map_err(|_| LoadError::Invalid("working directory is not utf8".into()))?;

        let enabled = flags & FLAG_COMPRESSION != 0;
        let compression = if sections == LEGACY_SECTIONS {
            if enabled {
                return Err(LoadError::Invalid(
                    "legacy image cannot enable compression".into(),
                ));
            }
            None
        } else {
            let blob = cur.section("compressed blob")?;
            let c_offsets =
                decode_u64_table(cur.section("compressed offsets")?, "compressed offsets")?;
            let sizes = decode_u64_table(cur.section("original sizes")?, "original sizes")?;

            if enabled {
                Some((blob, c_offsets, sizes))
            } else {
                let zeroed = blob.is_empty()
                    && c_offsets.iter().all(|v| *v == 0)
                    && sizes.iter().all(|v| *v == 0);
                if !zeroed {
                    return Err(LoadError::Invalid(
                        "compression fields set while compression is disabled".into(),
                    ));
                }
                None
            }
        };

        if cur.remaining() != 0 {
            return Err(LoadError::Invalid(format!(
                "{} trailing bytes after sections",
                cur.remaining()
            )));
        }

        Self::assemble(paths, files, offsets, working_dir, compression)
    }

    fn assemble(
        paths: &'a [u8],
        files: &'a [u8],
        offsets: Vec<u64>,
        working_dir: &'a str,
        compression: Option<(&'a [u8], Vec<u64>, Vec<u64>)>,
    ) -> Result<Self, LoadError> {
        let index = PathIndex::build(path_table::decode(paths)?)?;
        let n = index.len();

        let content = BlobTable::new(files, offsets, n, "offset table")?;
        let payloads = match compression {
            None => Payloads::Plain(content.clone()),
            Some((blob, c_offsets, sizes)) => {
                let table = BlobTable::new(blob, c_offsets, n, "compressed offsets")?;
                Payloads::compressed(table, sizes)?
            }
        };

        log::debug!(
            "loaded image: {n} files, working dir {working_dir:?}, compression {}",
            if payloads.is_compressed() { "on" } else { "off" }
        );

        Ok(Self {
            index,
            content,
            payloads,
            working_dir,
        })
    }

    pub fn working_directory(&self) -> &'a str {
        self.working_dir
    }

    pub fn file_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_compressed(&self) -> bool {
        self.payloads.is_compressed()
    }

    /// Stored paths, ordered by file id.
    pub fn paths(&self) -> &[&'a str] {
        self.index.paths()
    }

    pub fn path_of(&self, id: FileId) -> Option<&'a str> {
        self.index.path(id)
    }

    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.index.get(path)
    }

    /// Raw bytes of the plain content blob for `id`, ignoring compression.
    pub fn content_slice(&self, id: FileId) -> ImageResult<&'a [u8]> {
        self.content.slice(id)
    }

    /// Contents of the file stored under exactly `path`.
    pub fn read_file(&self, path: &str) -> ImageResult<Cow<'a, [u8]>> {
        let id = self
            .index
            .get(path)
            .ok_or_else(|| ImageError::NotFound(path.to_string()))?;
        self.payloads.materialize(id)
    }

    pub fn read_by_id(&self, id: FileId) -> ImageResult<Cow<'a, [u8]>> {
        self.payloads.materialize(id)
    }

    /// Like [`Image::read_file`], with relative paths taken from the working directory.
    pub fn read_relative(&self, path: &str) -> ImageResult<Cow<'a, [u8]>> {
        self.read_file(&self.resolve(path))
    }

    pub fn resolve(&self, path: &str) -> String {
        resolve_against(self.working_dir, path)
    }

    pub fn is_under_working_dir(&self, path: &str) -> bool {
        path.as_bytes().starts_with(self.working_dir.as_bytes())
    }

    pub fn open_file(&self, path: &str) -> ImageResult<ImageFile<'a>> {
        let id = self
            .index
            .get(path)
            .ok_or_else(|| ImageError::NotFound(path.to_string()))?;
        Ok(ImageFile::new(
            self.payloads.materialize(id)?,
            self.payloads.kind(id)?,
        ))
    }

    pub fn payload_kind(&self, id: FileId) -> ImageResult<PayloadKind> {
        self.payloads.kind(id)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let prefix = dir_prefix(path);
        let found = self.index.with_prefix(&prefix).next().is_some();
        found
    }

    pub fn metadata(&self, path: &str) -> ImageResult<Metadata> {
        if let Some(id) = self.index.get(path) {
            return Ok(Metadata {
                kind: EntryKind::File,
                len: self.payloads.original_len(id)?,
                inode: inode_of(path),
                payload_kind: Some(self.payloads.kind(id)?),
            });
        }
        if self.is_dir(path) {
            return Ok(Metadata {
                kind: EntryKind::Directory,
                len: 0,
                inode: inode_of(path),
                payload_kind: None,
            });
        }
        Err(ImageError::NotFound(path.to_string()))
    }

    /// Names of the immediate children of directory `path`, sorted and unique.
    pub fn read_dir(&self, path: &str) -> ImageResult<Vec<String>> {
        let prefix = dir_prefix(path);
        let children: BTreeSet<&str> = self
            .index
            .with_prefix(&prefix)
            .filter_map(|p| p[prefix.len()..].split('/').next())
            .filter(|name| !name.is_empty())
            .collect();

        if children.is_empty() {
            return Err(ImageError::NotFound(path.to_string()));
        }
        Ok(children.into_iter().map(str::to_string).collect())
    }

    pub fn entries(&self) -> ImageResult<Vec<EntryInfo>> {
        let mut out = Vec::with_capacity(self.file_count());
        for (id, path) in self.index.paths().iter().enumerate() {
            let raw = self.payloads.materialize(id)?;
            let hash: [u8; 32] = blake3::hash(&raw).into();
            out.push(EntryInfo {
                path: path.to_string(),
                file_id: id,
                payload_len: self.payloads.payload_len(id)?,
                raw_len: raw.len() as u64,
                payload_kind: self.payloads.kind(id)?.as_str(),
                raw_hash_hex: hex32(&hash),
            });
        }
        Ok(out)
    }

    /// Materializes every file, failing on the first one that does not decode.
    pub fn verify(&self) -> ImageResult<usize> {
        for id in 0..self.file_count() {
            self.payloads.materialize(id)?;
        }
        Ok(self.file_count())
    }
}

fn dir_prefix(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    format!("{trimmed}/")
}

/// Stable per-path inode number.
fn inode_of(path: &str) -> u64 {
    let full: [u8; 32] = blake3::hash(path.as_bytes()).into();
    u64::from_le_bytes([
        full[0], full[1], full[2], full[3], full[4], full[5], full[6], full[7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::format::encode_image;

    const PATHS: &[u8] = b"/test/hello.txt\0/test/world.txt\0";
    const FILES: &[u8] = b"Hello, World!Test Content";
    const OFFSETS: &[u64] = &[0, 13, 25];

    fn fixture() -> Image<'static> {
        Image::from_parts(ImageParts {
            paths: PATHS,
            files: FILES,
            offsets: OFFSETS,
            working_dir: "/test",
            compression: None,
        })
        .unwrap()
    }

    #[test]
    fn fixture_lookups() {
        let img = fixture();
        assert_eq!(&*img.read_file("/test/hello.txt").unwrap(), b"Hello, World!");
        assert_eq!(&*img.read_file("/test/world.txt").unwrap(), b"Test Content");
        assert_eq!(img.working_directory(), "/test");
        assert!(matches!(
            img.read_file("/test/missing.txt"),
            Err(ImageError::NotFound(_))
        ));
    }

    #[test]
    fn lookups_are_exact() {
        let img = fixture();
        assert!(img.read_file("test/hello.txt").is_err());
        assert!(img.read_file("/test//hello.txt").is_err());
        assert_eq!(&*img.read_relative("hello.txt").unwrap(), b"Hello, World!");
        assert_eq!(&*img.read_relative("./sub/../world.txt").unwrap(), b"Test Content");
    }

    #[test]
    fn stored_reads_are_zero_copy() {
        let img = fixture();
        assert!(matches!(img.read_by_id(0).unwrap(), Cow::Borrowed(_)));
        assert!(matches!(
            img.read_by_id(2),
            Err(ImageError::InvalidFileId { id: 2, count: 2 })
        ));
    }

    #[test]
    fn directories_are_implied_by_prefixes() {
        let img = fixture();
        assert!(img.is_dir("/test"));
        assert!(img.is_dir("/test/"));
        assert!(img.is_dir("/"));
        assert!(!img.is_dir("/test/hello.txt"));
        assert!(!img.is_dir("/tes"));

        assert_eq!(img.read_dir("/test").unwrap(), vec!["hello.txt", "world.txt"]);
        assert_eq!(img.read_dir("/").unwrap(), vec!["test"]);
        assert!(matches!(img.read_dir("/nope"), Err(ImageError::NotFound(_))));
    }

    #[test]
    fn metadata_for_files_and_dirs() {
        let img = fixture();
        let f = img.metadata("/test/world.txt").unwrap();
        assert!(f.is_file());
        assert_eq!(f.len, 12);
        assert_eq!(f.payload_kind, Some(PayloadKind::Stored));

        let d = img.metadata("/test").unwrap();
        assert!(d.is_dir());
        assert_ne!(d.inode, f.inode);
        assert_eq!(d.inode, img.metadata("/test").unwrap().inode);

        assert!(img.metadata("/zzz").is_err());
    }

    #[test]
    fn working_dir_prefix() {
        let img = fixture();
        assert!(img.is_under_working_dir("/test/hello.txt"));
        assert!(!img.is_under_working_dir("/etc/passwd"));
    }

    #[test]
    fn packed_round_trip_matches_parts() {
        let mut bytes = Vec::new();
        encode_image(
            &ImageParts {
                paths: PATHS,
                files: FILES,
                offsets: OFFSETS,
                working_dir: "/test",
                compression: None,
            },
            &mut bytes,
        )
        .unwrap();

        let img = Image::open(&bytes).unwrap();
        assert_eq!(img.paths(), &["/test/hello.txt", "/test/world.txt"]);
        assert!(!img.is_compressed());
        assert_eq!(img.verify().unwrap(), 2);

        let entries = img.entries().unwrap();
        assert_eq!(entries[1].raw_len, 12);
        assert_eq!(entries[1].payload_kind, "stored");
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = Vec::new();
        encode_image(
            &ImageParts {
                paths: PATHS,
                files: FILES,
                offsets: OFFSETS,
                working_dir: "/test",
                compression: None,
            },
            &mut bytes,
        )
        .unwrap();
        bytes[30] ^= 0xFF;

        let err = Image::open(&bytes).unwrap_err();
        assert!(matches!(err.load_kind(), Some(LoadError::Invalid(_))));
    }
}
