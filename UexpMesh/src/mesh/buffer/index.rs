//! Index buffers

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use super::{Buffer, BufferKind};
use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, check};

fn decode_indices(data: &[u8], width: usize) -> Vec<u32> {
    match width {
        2 => data
            .chunks_exact(2)
            .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]])))
            .collect(),
        _ => data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn encode_indices(indices: &[u32], width: usize) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(indices.len() * width);
    for &id in indices {
        if width == 2 {
            let narrow = u16::try_from(id).map_err(|_| Error::InvalidInterchange {
                message: format!("index {id} does not fit a 16-bit index buffer"),
            })?;
            data.extend_from_slice(&narrow.to_le_bytes());
        } else {
            data.extend_from_slice(&id.to_le_bytes());
        }
    }
    Ok(data)
}

/// Static mesh index buffer. A `u32` selector picks 16- or 32-bit indices.
///
/// Some assets store the payload as a plain byte array (generic stride 1),
/// so the element width comes from the selector, never from the stride.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticIndexBuffer {
    pub wide: bool,
    pub buffer: Buffer,
}

impl StaticIndexBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let selector_offset = reader.pos()?;
        let wide = match reader.read_u32::<LittleEndian>()? {
            0 => false,
            1 => true,
            other => return Err(Error::mismatch(selector_offset, "index width selector", "0 or 1", other)),
        };
        let buffer = Buffer::read(reader)?;
        let width = if wide { 4 } else { 2 };
        check(buffer.offset(), "index bytes modulo element width", 0, buffer.data().len() % width)?;
        Ok(Self { wide, buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(u32::from(self.wide))?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::StaticIndex
    }

    /// Element width in bytes.
    #[must_use]
    pub fn width(&self) -> usize {
        if self.wide { 4 } else { 2 }
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.buffer.data().len() / self.width()
    }

    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        decode_indices(self.buffer.data(), self.width())
    }

    /// Replace the indices. Switches to 32-bit indices when a value does not
    /// fit 16 bits and keeps the byte-array convention if the buffer used it.
    pub fn set_indices(&mut self, indices: &[u32]) -> Result<()> {
        if indices.iter().any(|&id| id > u32::from(u16::MAX)) {
            self.wide = true;
        }
        let data = encode_indices(indices, self.width())?;
        let stride = if self.buffer.stride() == 1 { 1 } else { self.width() as u32 };
        self.buffer = Buffer::new(stride, data)?;
        Ok(())
    }
}

/// Skeletal mesh index buffer. A `u8` width (2 or 4) precedes the buffer and
/// must equal its stride.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalIndexBuffer {
    pub buffer: Buffer,
}

impl SkeletalIndexBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let width_offset = reader.pos()?;
        let width = reader.read_u8()?;
        if width != 2 && width != 4 {
            return Err(Error::mismatch(width_offset, "index width", "2 or 4", width));
        }
        let buffer = Buffer::read(reader)?;
        check(buffer.offset(), "index width equals stride", u32::from(width), buffer.stride())?;
        Ok(Self { buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.buffer.stride() as u8)?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::SkeletalIndex
    }

    /// Element width in bytes (2 or 4).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.buffer.stride()
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.buffer.count()
    }

    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        decode_indices(self.buffer.data(), self.buffer.stride() as usize)
    }

    pub fn set_indices(&mut self, indices: &[u32], width: u32) -> Result<()> {
        if width != 2 && width != 4 {
            return Err(Error::InvalidInterchange { message: format!("index width must be 2 or 4, got {width}") });
        }
        self.buffer = Buffer::new(width, encode_indices(indices, width as usize)?)?;
        Ok(())
    }
}
