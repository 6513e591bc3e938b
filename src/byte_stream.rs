//! Seekable buffered byte reader over an in-memory codestream (SPEC_FULL §4.1).
//!
//! The teacher's `cio.rs` wraps an `opj_stream_t` with C callback pointers for
//! read/skip/seek; this decoder only ever operates over a fully-buffered
//! `&[u8]` codestream, so `ByteStream` is a plain slice cursor. The
//! `Unseekable` error variant is kept for API completeness (a future
//! streaming transport would return it from `seek`), but the in-memory
//! implementation is always seekable.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DecodeError, Result};

/// A big-endian cursor over an in-memory codestream.
///
/// Endianness is fixed to big-endian per the codestream convention
/// regardless of host architecture (SPEC_FULL §4.1).
pub(crate) struct ByteStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteStream<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        ByteStream { data, pos: 0 }
    }

    pub(crate) fn tell(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes_left(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Seeks to an absolute byte offset. Always succeeds for the in-memory
    /// transport; `DecodeError::Unseekable` is reserved for transports this
    /// crate does not implement.
    pub(crate) fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(DecodeError::truncated(pos, "seek past end of codestream"));
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.bytes_left() {
            return Err(DecodeError::truncated(self.pos, "skip past end of codestream"));
        }
        self.pos += n;
        Ok(())
    }

    /// Reads `n` bytes and returns a borrowed slice. Fails with `Truncated`
    /// rather than performing a short read: "no partial reads surface above
    /// the primitive boundary" (SPEC_FULL §4.1).
    pub(crate) fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.bytes_left() {
            return Err(DecodeError::truncated(self.pos, "short read"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read(2)?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read(4)?))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Peeks the next two bytes as a marker code without consuming them, or
    /// `None` at end of stream.
    pub(crate) fn peek_u16(&self) -> Option<u16> {
        if self.bytes_left() < 2 {
            None
        } else {
            Some(BigEndian::read_u16(&self.data[self.pos..self.pos + 2]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_primitives() {
        let buf = [0xFF, 0x4F, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
        let mut s = ByteStream::new(&buf);
        assert_eq!(s.read_u16().unwrap(), 0xFF4F);
        assert_eq!(s.read_u16().unwrap(), 0x0001);
        assert_eq!(s.read_u32().unwrap(), 0x0000_0002);
        assert!(s.at_end());
    }

    #[test]
    fn short_read_is_truncated() {
        let buf = [0x00u8];
        let mut s = ByteStream::new(&buf);
        assert!(matches!(
            s.read_u16(),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn skip_past_end_is_truncated() {
        let buf = [0x00u8, 0x01];
        let mut s = ByteStream::new(&buf);
        assert!(matches!(s.skip(10), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn seek_and_tell_roundtrip() {
        let buf = [0u8; 16];
        let mut s = ByteStream::new(&buf);
        s.seek(10).unwrap();
        assert_eq!(s.tell(), 10);
        assert_eq!(s.bytes_left(), 6);
    }

    #[test]
    fn peek_does_not_advance() {
        let buf = [0xFFu8, 0x90, 0x01];
        let s_pos_before = ByteStream::new(&buf);
        assert_eq!(s_pos_before.peek_u16(), Some(0xFF90));
        assert_eq!(s_pos_before.tell(), 0);
    }
}
