#![forbid(unsafe_code)]

use std::io::Write;

use crate::image::error::ImageResult;
use crate::image::io::{checksum32, write_u32};

/// Image header magic (format v1).
pub const MAGIC: [u8; 8] = *b"FSIMG\x01\x00\x00";

/// Image footer magic.
pub const FOOTER_MAGIC: [u8; 8] = *b"FSIMGEND";

pub const FLAG_COMPRESSION: u32 = 1;

/// Section count of the legacy layout that predates the compression fields.
pub const LEGACY_SECTIONS: u32 = 4;
pub const SECTIONS: u32 = 7;

pub const FOOTER_LEN: usize = 8 + 4 + 4;

/// Zero-based position of a path in the path table, shared by every parallel table.
pub type FileId = usize;

/// How a file's bytes sit in the payload blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Stored,
    Compressed,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Stored => "stored",
            PayloadKind::Compressed => "zstd",
        }
    }
}

/// Tables of an image supplied one by one rather than as a packed blob.
///
/// `paths` must carry its trailing NUL; `offsets` holds N+1 entries into `files`.
#[derive(Debug, Clone, Copy)]
pub struct ImageParts<'a> {
    pub paths: &'a [u8],
    pub files: &'a [u8],
    pub offsets: &'a [u64],
    pub working_dir: &'a str,
    pub compression: Option<CompressionParts<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct CompressionParts<'a> {
    pub blob: &'a [u8],
    pub offsets: &'a [u64],
    pub original_sizes: &'a [u64],
}

/// Public view of an image entry (for listings and inspectors).
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub path: String,
    pub file_id: FileId,
    pub payload_len: u64,
    pub raw_len: u64,
    /// "stored" or "zstd"
    pub payload_kind: &'static str,
    /// Blake3 hash (hex) of the raw, uncompressed bytes.
    pub raw_hash_hex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    /// Original (decompressed) length for files, 0 for directories.
    pub len: u64,
    pub inode: u64,
    pub payload_kind: Option<PayloadKind>,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

fn push_section(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn push_u64_section(buf: &mut Vec<u8>, values: &[u64]) {
    buf.extend_from_slice(&((values.len() * 8) as u64).to_le_bytes());
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn write_with_footer(buf: &[u8], out: &mut dyn Write) -> ImageResult<()> {
    let checksum = checksum32(buf);

    out.write_all(buf)?;
    out.write_all(&FOOTER_MAGIC)?;
    write_u32(out, checksum)?;
    write_u32(out, 0)?;
    Ok(())
}

/// Image v1 layout:
/// - [MAGIC 8]
/// - [u32 flags] (bit 0: compression enabled)
/// - [u32 section_count] (4 legacy, 7 current)
/// - sections, each [u64 len][bytes]:
///   path table, content blob, offsets, working dir,
///   compressed blob, compressed offsets, original sizes
/// - footer:
///   - [FOOTER_MAGIC 8]
///   - [u32 checksum (blake3 of everything above, truncated to u32)]
///   - [u32 reserved]
///
/// No validation happens here: whatever `parts` says is written out.
pub fn encode_image(parts: &ImageParts<'_>, out: &mut dyn Write) -> ImageResult<()> {
    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&MAGIC);

    let flags = if parts.compression.is_some() {
        FLAG_COMPRESSION
    } else {
        0
    };
    buf.extend_from_slice(&flags.to_le_bytes());
    buf.extend_from_slice(&SECTIONS.to_le_bytes());

    push_section(&mut buf, parts.paths);
    push_section(&mut buf, parts.files);
    push_u64_section(&mut buf, parts.offsets);
    push_section(&mut buf, parts.working_dir.as_bytes());

    match &parts.compression {
        Some(c) => {
            push_section(&mut buf, c.blob);
            push_u64_section(&mut buf, c.offsets);
            push_u64_section(&mut buf, c.original_sizes);
        }
        None => {
            push_section(&mut buf, &[]);
            push_section(&mut buf, &[]);
            push_section(&mut buf, &[]);
        }
    }

    write_with_footer(&buf, out)
}

/// Writes the four-section layout without any compression fields.
pub fn encode_legacy_image(parts: &ImageParts<'_>, out: &mut dyn Write) -> ImageResult<()> {
    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&LEGACY_SECTIONS.to_le_bytes());

    push_section(&mut buf, parts.paths);
    push_section(&mut buf, parts.files);
    push_u64_section(&mut buf, parts.offsets);
    push_section(&mut buf, parts.working_dir.as_bytes());

    write_with_footer(&buf, out)
}
