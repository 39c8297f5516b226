#![forbid(unsafe_code)]

use std::io::Write;

use crate::image::error::{ImageResult, LoadError};

pub fn write_u32(w: &mut dyn Write, v: u32) -> ImageResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Blake3 of `bytes`, truncated to its first four bytes.
pub fn checksum32(bytes: &[u8]) -> u32 {
    let full: [u8; 32] = blake3::hash(bytes).into();
    u32::from_le_bytes([full[0], full[1], full[2], full[3]])
}

pub fn hex32(v: &[u8; 32]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = [0u8; 64];
    for (i, b) in v.iter().copied().enumerate() {
        out[i * 2] = HEX[(b >> 4) as usize];
        out[i * 2 + 1] = HEX[(b & 0xF) as usize];
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Forward-only cursor over a borrowed image. Slices it hands out borrow the
/// image itself, so section payloads are never copied.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], LoadError> {
        if n > self.remaining() {
            return Err(LoadError::Invalid(format!(
                "truncated {what}: need {n} bytes, {} left",
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_exact<const N: usize>(&mut self, what: &str) -> Result<[u8; N], LoadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.read_exact::<4>(what)?))
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64, LoadError> {
        Ok(u64::from_le_bytes(self.read_exact::<8>(what)?))
    }

    /// Reads a `[u64 len][bytes]` section.
    pub fn section(&mut self, what: &str) -> Result<&'a [u8], LoadError> {
        let len = self.read_u64(what)?;
        let len = usize::try_from(len)
            .map_err(|_| LoadError::Invalid(format!("{what} length {len} overflows usize")))?;
        self.take(len, what)
    }
}

pub(crate) fn decode_u64_table(bytes: &[u8], what: &str) -> Result<Vec<u64>, LoadError> {
    if bytes.len() % 8 != 0 {
        return Err(LoadError::Invalid(format!(
            "{what} length {} is not a multiple of 8",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}
