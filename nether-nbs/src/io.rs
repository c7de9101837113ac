//! Little-endian binary cursor used by the codec
//!
//! `Reader` never advances past a failed read: a short buffer yields
//! [`NbsError::Truncated`] and leaves the position where it was.

use crate::error::NbsError;

/// Sequential reader over a fixed byte buffer
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been consumed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], NbsError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or(NbsError::Truncated {
                offset: self.pos,
                needed: N,
                remaining: self.remaining(),
            })?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        self.pos += N;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, NbsError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, NbsError> {
        Ok(i8::from_le_bytes(self.take()?))
    }

    /// Read a byte flag (any nonzero value is true)
    pub fn read_bool(&mut self) -> Result<bool, NbsError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, NbsError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, NbsError> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, NbsError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, NbsError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Read a length-prefixed string (i32 length, then that many bytes)
    ///
    /// A zero or negative length yields an empty string. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn read_string(&mut self) -> Result<String, NbsError> {
        let start = self.pos;
        let len = self.read_i32()?;
        if len <= 0 {
            return Ok(String::new());
        }

        let len = len as usize;
        match self.data.get(self.pos..self.pos + len) {
            Some(bytes) => {
                self.pos += len;
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            None => {
                let err = NbsError::Truncated {
                    offset: self.pos,
                    needed: len,
                    remaining: self.remaining(),
                };
                self.pos = start;
                Err(err)
            }
        }
    }
}

/// Growable little-endian writer, the structural mirror of [`Reader`]
#[derive(Debug, Clone, Default)]
pub struct Writer {
    output: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.output
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.output
    }

    pub fn write_u8(&mut self, val: u8) {
        self.output.push(val);
    }

    pub fn write_i8(&mut self, val: i8) {
        self.output.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_bool(&mut self, val: bool) {
        self.output.push(val as u8);
    }

    pub fn write_u16(&mut self, val: u16) {
        self.output.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_i16(&mut self, val: i16) {
        self.output.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32(&mut self, val: u32) {
        self.output.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_i32(&mut self, val: i32) {
        self.output.extend_from_slice(&val.to_le_bytes());
    }

    /// Write a length-prefixed string
    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(i32::MAX as usize);
        self.write_i32(len as i32);
        self.output.extend_from_slice(&bytes[..len]);
    }
}
