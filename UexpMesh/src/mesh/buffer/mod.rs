//! Vertex and index buffer codecs
//!
//! Every typed buffer wraps a generic [`Buffer`] (`stride`, `count`, raw
//! bytes) behind its own small on-disk header, and validates that the header
//! agrees with the generic buffer. The attribute transforms (axis swap, unit
//! scale, normal quantization, half-float UVs) live here so the LOD layer
//! only ever deals with typed arrays.

mod index;
mod vertex;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::formats::io::ReadBinaryExt;

pub use index::{SkeletalIndexBuffer, StaticIndexBuffer};
pub use vertex::{
    ColorVertexBuffer, KdiBuffer, PositionVertexBuffer, SkeletalMeshVertexBuffer,
    SkeletalVertexAttributes, SkinWeightVertexBuffer, SkinWeights, StaticMeshVertexBuffer,
    StaticVertexAttributes,
};

/// Engine units per interchange unit (centimetres per metre).
pub const UNIT_SCALE: f32 = 100.0;

/// Size of the quantized tangent/normal block per vertex.
pub const TANGENT_BASIS_SIZE: usize = 8;

/// Generic buffer: `stride * count` raw bytes.
///
/// The invariant `data.len() == stride * count` holds for every value of this
/// type; buffers are replaced wholesale rather than mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    stride: u32,
    count: u32,
    data: Vec<u8>,
    offset: u64,
}

impl Buffer {
    /// Build a buffer from elements of `stride` bytes.
    pub fn new(stride: u32, data: Vec<u8>) -> Result<Self> {
        if stride == 0 || data.len() % stride as usize != 0 {
            return Err(Error::InvalidInterchange {
                message: format!("{} bytes is not a whole number of {stride}-byte elements", data.len()),
            });
        }
        let count = (data.len() / stride as usize) as u32;
        Ok(Self { stride, count, data, offset: 0 })
    }

    /// Read `(stride: u32, count: u32)` then exactly `stride * count` bytes.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let stride = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u32::<LittleEndian>()?;
        let offset = reader.pos()?;
        let len = (stride as usize)
            .checked_mul(count as usize)
            .ok_or_else(|| Error::mismatch(offset, "buffer byte length", "fits in memory", (stride, count)))?;
        let data = reader.read_bytes(len)?;
        Ok(Self { stride, count, data, offset })
    }

    /// Write the `(stride, count, data)` triple.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.stride)?;
        writer.write_u32::<LittleEndian>(self.count)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Position of the first data byte in the stream it was read from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Iterate over the elements of the buffer.
    pub fn elements(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.stride.max(1) as usize)
    }

    /// Truncate or pad (with `fill`) to exactly `count` elements.
    #[must_use]
    pub fn resized(&self, count: u32, fill: u8) -> Self {
        let mut data = self.data.clone();
        data.resize(self.stride as usize * count as usize, fill);
        Self { stride: self.stride, count, data, offset: self.offset }
    }
}

/// Closed set of buffer variants, used when listing a LOD's buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Position,
    StaticMeshAttr,
    Color,
    SkeletalMeshAttr,
    SkinWeight,
    StaticIndex,
    SkeletalIndex,
    Auxiliary,
}

impl BufferKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::StaticMeshAttr => "static mesh attributes",
            Self::Color => "color",
            Self::SkeletalMeshAttr => "skeletal mesh attributes",
            Self::SkinWeight => "skin weights",
            Self::StaticIndex => "static index",
            Self::SkeletalIndex => "skeletal index",
            Self::Auxiliary => "auxiliary",
        }
    }
}

/// A named view of one buffer inside a LOD.
#[derive(Debug, Clone, Copy)]
pub struct LodBuffer<'a> {
    pub name: &'static str,
    pub kind: BufferKind,
    pub buffer: &'a Buffer,
}

/// Storage precision of UV channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvPrecision {
    Half,
    Full,
}

impl UvPrecision {
    pub(crate) fn from_flag(flag: u32, offset: u64) -> Result<Self> {
        match flag {
            0 => Ok(Self::Half),
            1 => Ok(Self::Full),
            other => Err(Error::mismatch(offset, "float32 UV flag", "0 or 1", other)),
        }
    }

    #[must_use]
    pub fn flag(self) -> u32 {
        match self {
            Self::Half => 0,
            Self::Full => 1,
        }
    }

    /// Bytes taken by one (u, v) pair.
    #[must_use]
    pub fn pair_size(self) -> usize {
        match self {
            Self::Half => 4,
            Self::Full => 8,
        }
    }

    fn read_pair(self, bytes: &[u8]) -> [f32; 2] {
        match self {
            Self::Half => [
                f16::from_le_bytes([bytes[0], bytes[1]]).to_f32(),
                f16::from_le_bytes([bytes[2], bytes[3]]).to_f32(),
            ],
            Self::Full => [
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ],
        }
    }

    fn write_pair(self, out: &mut Vec<u8>, uv: [f32; 2]) {
        match self {
            Self::Half => {
                out.extend_from_slice(&f16::from_f32(uv[0]).to_le_bytes());
                out.extend_from_slice(&f16::from_f32(uv[1]).to_le_bytes());
            }
            Self::Full => {
                out.extend_from_slice(&uv[0].to_le_bytes());
                out.extend_from_slice(&uv[1].to_le_bytes());
            }
        }
    }
}

/// Decode one quantized byte to `[-1, 1]`.
#[must_use]
pub fn dequantize(b: u8) -> f32 {
    f32::from(b) * 2.0 / 255.0 - 1.0
}

/// Quantize a `[-1, 1]` value to a byte.
#[must_use]
pub fn quantize(v: f32) -> u8 {
    ((v + 1.0) * 255.0 / 2.0).round().clamp(0.0, 255.0) as u8
}

/// Decode the 8-byte tangent basis block to `(normal, tangent)`.
///
/// The second and third components are swapped, matching the position axis
/// swap.
#[must_use]
pub fn decode_tangent_basis(block: &[u8]) -> ([f32; 3], [f32; 4]) {
    let n: Vec<f32> = block[..TANGENT_BASIS_SIZE].iter().map(|&b| dequantize(b)).collect();
    ([n[4], n[6], n[5]], [n[0], n[2], n[1], n[3]])
}

/// Encode `(normal, tangent)` back to the 8-byte block.
#[must_use]
pub fn encode_tangent_basis(normal: [f32; 3], tangent: [f32; 4]) -> [u8; TANGENT_BASIS_SIZE] {
    [
        quantize(tangent[0]),
        quantize(tangent[2]),
        quantize(tangent[1]),
        quantize(tangent[3]),
        quantize(normal[0]),
        quantize(normal[2]),
        quantize(normal[1]),
        quantize(1.0),
    ]
}

/// Stored engine position to interchange position.
#[must_use]
pub fn decode_position(p: [f32; 3]) -> [f32; 3] {
    [p[0] / UNIT_SCALE, p[2] / UNIT_SCALE, p[1] / UNIT_SCALE]
}

/// Interchange position to stored engine position.
#[must_use]
pub fn encode_position(p: [f32; 3]) -> [f32; 3] {
    [p[0] * UNIT_SCALE, p[2] * UNIT_SCALE, p[1] * UNIT_SCALE]
}

pub(crate) fn read_f32x3(bytes: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    [f(0), f(4), f(8)]
}

pub(crate) fn write_f32x3(out: &mut Vec<u8>, v: [f32; 3]) {
    for c in v {
        out.extend_from_slice(&c.to_le_bytes());
    }
}
