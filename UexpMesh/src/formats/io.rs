//! Primitive binary codec shared by every reader and writer
//!
//! All multi-byte fields in the package format are little-endian and most
//! regions carry no length tag, so the stream position is the only
//! delimiter. Every "must equal" check therefore reports the position it
//! failed at.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt::Debug;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Reading helpers on top of [`ReadBytesExt`].
pub trait ReadBinaryExt: Read + Seek {
    /// Current stream position.
    fn pos(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    /// Move the stream back by `len` bytes (used after peeking a flag).
    fn rewind_by(&mut self, len: i64) -> Result<()> {
        self.seek(SeekFrom::Current(-len))?;
        Ok(())
    }

    /// Bytes left between the current position and the end of the stream.
    fn remaining(&mut self) -> Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end.saturating_sub(pos))
    }

    /// Read exactly `len` raw bytes.
    ///
    /// Lengths come from the file itself, so they are checked against the
    /// rest of the stream before anything is allocated.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let available = self.remaining()?;
        if len as u64 > available {
            let offset = self.pos()?;
            return Err(Error::mismatch(offset, "length within stream", format!("<= {available}"), len));
        }
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-length byte array.
    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read everything up to the end of the stream.
    fn read_rest(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read a length-prefixed, NUL-terminated string.
    ///
    /// The `u32` length counts the terminator; a length of zero is the empty
    /// string with no terminator.
    fn read_str(&mut self) -> Result<String> {
        let offset = self.pos()?;
        let len = self.read_u32::<LittleEndian>()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let mut bytes = self.read_bytes(len)?;
        let terminator = bytes.pop();
        if terminator != Some(0) {
            return Err(Error::mismatch(offset, "string terminator", Some(0u8), terminator));
        }
        Ok(String::from_utf8(bytes)?)
    }

    /// Read `N` little-endian `f32` values.
    fn read_f32_array<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0f32; N];
        for v in &mut out {
            *v = self.read_f32::<LittleEndian>()?;
        }
        Ok(out)
    }

    /// Read `count` little-endian `u16` values.
    fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>> {
        (0..count).map(|_| Ok(self.read_u16::<LittleEndian>()?)).collect()
    }

    /// Read `count` little-endian `u32` values.
    fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        (0..count).map(|_| Ok(self.read_u32::<LittleEndian>()?)).collect()
    }

    /// Read a `u8` and fail unless it equals `expected`.
    fn expect_u8(&mut self, expected: u8, what: &'static str) -> Result<()> {
        let offset = self.pos()?;
        let actual = self.read_u8()?;
        check(offset, what, expected, actual)
    }

    /// Read a `u16` and fail unless it equals `expected`.
    fn expect_u16(&mut self, expected: u16, what: &'static str) -> Result<()> {
        let offset = self.pos()?;
        let actual = self.read_u16::<LittleEndian>()?;
        check(offset, what, expected, actual)
    }

    /// Read a `u32` and fail unless it equals `expected`.
    fn expect_u32(&mut self, expected: u32, what: &'static str) -> Result<()> {
        let offset = self.pos()?;
        let actual = self.read_u32::<LittleEndian>()?;
        check(offset, what, expected, actual)
    }

    /// Read one zero `u32`.
    fn read_null(&mut self, what: &'static str) -> Result<()> {
        self.expect_u32(0, what)
    }

    /// Read `count` zero `u32`s.
    fn read_null_array(&mut self, count: usize, what: &'static str) -> Result<()> {
        let offset = self.pos()?;
        let region = self.read_bytes(count * 4)?;
        if region.iter().any(|&b| b != 0) {
            return Err(Error::mismatch(offset, what, vec![0u8; count * 4], region));
        }
        Ok(())
    }
}

impl<R: Read + Seek + ?Sized> ReadBinaryExt for R {}

/// Writing helpers on top of [`WriteBytesExt`].
pub trait WriteBinaryExt: Write {
    /// Write a length-prefixed, NUL-terminated string.
    fn write_str(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            self.write_u32::<LittleEndian>(0)?;
            return Ok(());
        }
        self.write_u32::<LittleEndian>(s.len() as u32 + 1)?;
        self.write_all(s.as_bytes())?;
        self.write_u8(0)?;
        Ok(())
    }

    /// Write little-endian `f32` values.
    fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        for &v in values {
            self.write_f32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Write little-endian `u16` values.
    fn write_u16_slice(&mut self, values: &[u16]) -> Result<()> {
        for &v in values {
            self.write_u16::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Write little-endian `u32` values.
    fn write_u32_slice(&mut self, values: &[u32]) -> Result<()> {
        for &v in values {
            self.write_u32::<LittleEndian>(v)?;
        }
        Ok(())
    }

    /// Write one zero `u32`.
    fn write_null(&mut self) -> Result<()> {
        self.write_u32::<LittleEndian>(0)?;
        Ok(())
    }

    /// Write `count` zero `u32`s.
    fn write_null_array(&mut self, count: usize) -> Result<()> {
        self.write_all(&vec![0u8; count * 4])?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteBinaryExt for W {}

/// Fail with [`Error::FormatMismatch`] unless `actual == expected`.
pub fn check<T: PartialEq + Debug>(offset: u64, what: &'static str, expected: T, actual: T) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::mismatch(offset, what, expected, actual))
    }
}
