//! Hand-assembled images: arbitrary headers and sections sealed with a
//! correct footer, so the section parser sees them.

#![allow(dead_code)]

use fsimage::image::{FOOTER_MAGIC, MAGIC};

pub const PATHS: &[u8] = b"/test/hello.txt\0/test/world.txt\0";
pub const FILES: &[u8] = b"Hello, World!Test Content";

pub fn u64s(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Appends the footer (magic, truncated blake3 of `body`, reserved word).
pub fn seal(mut body: Vec<u8>) -> Vec<u8> {
    let hash: [u8; 32] = blake3::hash(&body).into();
    body.extend_from_slice(&FOOTER_MAGIC);
    body.extend_from_slice(&hash[..4]);
    body.extend_from_slice(&0u32.to_le_bytes());
    body
}

/// Header with `flags` and `count`, then each section length-prefixed, then
/// `trailer` verbatim.
pub fn craft(flags: u32, count: u32, sections: &[&[u8]], trailer: &[u8]) -> Vec<u8> {
    let mut body = MAGIC.to_vec();
    body.extend_from_slice(&flags.to_le_bytes());
    body.extend_from_slice(&count.to_le_bytes());
    for s in sections {
        body.extend_from_slice(&(s.len() as u64).to_le_bytes());
        body.extend_from_slice(s);
    }
    body.extend_from_slice(trailer);
    seal(body)
}
