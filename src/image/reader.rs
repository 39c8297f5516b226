#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};

use crate::image::format::PayloadKind;

/// An open file inside an image: a cursor over its materialized bytes.
///
/// Stored files keep borrowing the image; compressed ones own their
/// decoded buffer, which is dropped with the handle.
#[derive(Debug)]
pub struct ImageFile<'a> {
    cursor: Cursor<Cow<'a, [u8]>>,
    kind: PayloadKind,
}

impl<'a> ImageFile<'a> {
    pub(crate) fn new(content: Cow<'a, [u8]>, kind: PayloadKind) -> Self {
        Self {
            cursor: Cursor::new(content),
            kind,
        }
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn into_inner(self) -> Cow<'a, [u8]> {
        self.cursor.into_inner()
    }
}

impl Read for ImageFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for ImageFile<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

impl Seek for ImageFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}
