//! Little-endian wire primitives.
//!
//! All multi-byte integers are little-endian and fixed-width. Strings are
//! UTF-8 with a `u16` byte-length prefix; lists are a `u16` element count
//! followed by that many fixed-format elements. Decoding never panics:
//! truncated or malformed input surfaces as a [`WireError`].

/// Errors produced while encoding or decoding wire data.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// The input ended before a field could be fully read.
    #[error("unexpected end of input: needed {needed} byte(s) at offset {offset}")]
    UnexpectedEnd {
        /// How many more bytes the field required.
        needed: usize,
        /// Offset at which the read was attempted.
        offset: usize,
    },

    /// A packet kind tag that no known packet uses.
    #[error("unknown packet kind tag: {0}")]
    UnknownKind(u8),

    /// A boolean field held something other than 0 or 1.
    #[error("invalid boolean byte: {0}")]
    InvalidBool(u8),

    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A string or list was too long for its `u16` length prefix.
    #[error("length {len} exceeds the u16 wire limit")]
    LengthOverflow {
        /// The oversized length.
        len: usize,
    },

    /// Bytes remained after the payload was fully decoded.
    #[error("{0} trailing byte(s) after packet payload")]
    TrailingBytes(usize),
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only buffer for encoding a packet.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer.
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append a single byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a `u16`, little-endian.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append an `i32`, little-endian.
    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a boolean as one byte (0 or 1).
    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Append a `u16`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::LengthOverflow`] if the string is longer than
    /// `u16::MAX` bytes.
    pub fn put_str(&mut self, value: &str) -> Result<(), WireError> {
        let len = u16::try_from(value.len()).map_err(|_| WireError::LengthOverflow {
            len: value.len(),
        })?;
        self.put_u16(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Append a `u16` element-count prefix for a list.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::LengthOverflow`] if the list has more than
    /// `u16::MAX` elements.
    pub fn put_count(&mut self, count: usize) -> Result<(), WireError> {
        let count = u16::try_from(count).map_err(|_| WireError::LengthOverflow { len: count })?;
        self.put_u16(count);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over a received byte buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over the given bytes, positioned at the start.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub const fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Assert that the buffer was fully consumed.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::TrailingBytes`] if any bytes remain.
    pub const fn finish(&self) -> Result<(), WireError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::UnexpectedEnd {
            needed: n,
            offset: self.pos,
        })?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::UnexpectedEnd {
            needed: n,
            offset: self.pos,
        })?;
        self.pos = end;
        Ok(bytes)
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?.first().copied().unwrap_or_default())
    }

    /// Read a little-endian `u16`.
    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.take(2)?;
        let arr: [u8; 2] = bytes.try_into().map_err(|_| WireError::UnexpectedEnd {
            needed: 2,
            offset: self.pos,
        })?;
        Ok(u16::from_le_bytes(arr))
    }

    /// Read a little-endian `i32`.
    pub fn get_i32(&mut self) -> Result<i32, WireError> {
        let bytes = self.take(4)?;
        let arr: [u8; 4] = bytes.try_into().map_err(|_| WireError::UnexpectedEnd {
            needed: 4,
            offset: self.pos,
        })?;
        Ok(i32::from_le_bytes(arr))
    }

    /// Read a one-byte boolean, rejecting anything but 0 or 1.
    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    /// Read a `u16`-length-prefixed UTF-8 string.
    pub fn get_str(&mut self) -> Result<String, WireError> {
        let len = usize::from(self.get_u16()?);
        let bytes = self.take(len)?;
        core::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Read a `u16` element-count prefix for a list.
    pub fn get_count(&mut self) -> Result<usize, WireError> {
        Ok(usize::from(self.get_u16()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        let mut w = WireWriter::new();
        w.put_u8(0xab);
        w.put_u16(0x1234);
        w.put_i32(-7);
        w.put_bool(true);
        assert!(w.put_str("barley").is_ok());
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_u8(), Ok(0xab));
        assert_eq!(r.get_u16(), Ok(0x1234));
        assert_eq!(r.get_i32(), Ok(-7));
        assert_eq!(r.get_bool(), Ok(true));
        assert_eq!(r.get_str().as_deref(), Ok("barley"));
        assert_eq!(r.finish(), Ok(()));
    }

    #[test]
    fn integers_are_little_endian() {
        let mut w = WireWriter::new();
        w.put_u16(0x0102);
        assert_eq!(w.into_bytes(), vec![0x02, 0x01]);
    }

    #[test]
    fn truncated_input_is_an_error_not_a_panic() {
        let mut r = WireReader::new(&[0x01]);
        assert_eq!(
            r.get_u16(),
            Err(WireError::UnexpectedEnd {
                needed: 2,
                offset: 0
            })
        );
    }

    #[test]
    fn bad_bool_is_rejected() {
        let mut r = WireReader::new(&[7]);
        assert_eq!(r.get_bool(), Err(WireError::InvalidBool(7)));
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let r = WireReader::new(&[0, 0]);
        assert_eq!(r.finish(), Err(WireError::TrailingBytes(2)));
    }

    #[test]
    fn string_with_invalid_utf8_is_rejected() {
        // length prefix 2, then an invalid UTF-8 sequence
        let mut r = WireReader::new(&[2, 0, 0xff, 0xfe]);
        assert_eq!(r.get_str(), Err(WireError::InvalidUtf8));
    }
}
