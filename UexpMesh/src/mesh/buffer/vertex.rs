//! Typed vertex buffers

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use super::{
    Buffer, BufferKind, TANGENT_BASIS_SIZE, UvPrecision, decode_position, decode_tangent_basis,
    encode_position, encode_tangent_basis, read_f32x3, write_f32x3,
};
use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt, check};

const POSITION_STRIDE: u32 = 12;
const COLOR_STRIDE: u32 = 4;
const SKIN_WEIGHT_STRIDE: u32 = 8;
const SKIN_WEIGHT_STRIDE_EXTRA: u32 = 16;

/// Skeletal vertex: tangent basis block followed by an inline `f32` position.
const SKELETAL_VERTEX_BASE: usize = TANGENT_BASIS_SIZE + 12;

fn vertex_count_mismatch(len: usize, expected: usize, what: &str) -> Error {
    Error::InvalidInterchange {
        message: format!("{what} has {len} entries, expected {expected}"),
    }
}

fn check_uv_channels(uvs: &[Vec<[f32; 2]>], vertex_count: usize) -> Result<()> {
    for channel in uvs {
        if channel.len() != vertex_count {
            return Err(vertex_count_mismatch(channel.len(), vertex_count, "UV channel"));
        }
    }
    Ok(())
}

fn decode_uv_channels(buffer: &Buffer, base: usize, uv_count: u32, precision: UvPrecision) -> Vec<Vec<[f32; 2]>> {
    let pair = precision.pair_size();
    (0..uv_count as usize)
        .map(|channel| {
            let start = base + channel * pair;
            buffer
                .elements()
                .map(|v| precision.read_pair(&v[start..start + pair]))
                .collect()
        })
        .collect()
}

/// Positions for static meshes (`3 x f32` per vertex).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionVertexBuffer {
    pub buffer: Buffer,
}

impl PositionVertexBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let stride = reader.read_u32::<LittleEndian>()?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let buffer = Buffer::read(reader)?;
        let offset = buffer.offset();
        check(offset, "position stride", stride, buffer.stride())?;
        check(offset, "position vertex count", vertex_count, buffer.count())?;
        check(offset, "position element size", POSITION_STRIDE, buffer.stride())?;
        Ok(Self { buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.buffer.stride())?;
        writer.write_u32::<LittleEndian>(self.buffer.count())?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::Position
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.buffer.count()
    }

    /// Decoded positions (axis-swapped, in interchange units).
    #[must_use]
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.buffer.elements().map(|v| decode_position(read_f32x3(v))).collect()
    }

    pub fn set_positions(&mut self, positions: &[[f32; 3]]) -> Result<()> {
        let mut data = Vec::with_capacity(positions.len() * POSITION_STRIDE as usize);
        for &p in positions {
            write_f32x3(&mut data, encode_position(p));
        }
        self.buffer = Buffer::new(POSITION_STRIDE, data)?;
        Ok(())
    }
}

/// Normals, tangents and UVs of a static mesh vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticVertexAttributes {
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    /// One entry per UV channel, each holding one pair per vertex.
    pub uvs: Vec<Vec<[f32; 2]>>,
}

/// Tangent basis and UV channels for static meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMeshVertexBuffer {
    pub uv_count: u32,
    pub precision: UvPrecision,
    pub buffer: Buffer,
}

impl StaticMeshVertexBuffer {
    fn expected_stride(uv_count: u32, precision: UvPrecision) -> u32 {
        (TANGENT_BASIS_SIZE + uv_count as usize * precision.pair_size()) as u32
    }

    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "static mesh vertex buffer marker")?;
        let uv_count = reader.read_u32::<LittleEndian>()?;
        let stride = reader.read_u32::<LittleEndian>()?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let flag_offset = reader.pos()?;
        let precision = UvPrecision::from_flag(reader.read_u32::<LittleEndian>()?, flag_offset)?;
        reader.read_null("static mesh vertex buffer padding")?;
        let buffer = Buffer::read(reader)?;
        let offset = buffer.offset();
        check(offset, "static mesh vertex stride", stride, buffer.stride())?;
        check(offset, "static mesh vertex count", vertex_count, buffer.count())?;
        check(
            offset,
            "static mesh vertex stride for UV layout",
            Self::expected_stride(uv_count, precision),
            stride,
        )?;
        Ok(Self { uv_count, precision, buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(self.uv_count)?;
        writer.write_u32::<LittleEndian>(self.buffer.stride())?;
        writer.write_u32::<LittleEndian>(self.buffer.count())?;
        writer.write_u32::<LittleEndian>(self.precision.flag())?;
        writer.write_null()?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::StaticMeshAttr
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.buffer.count()
    }

    #[must_use]
    pub fn attributes(&self) -> StaticVertexAttributes {
        let (normals, tangents) = self.buffer.elements().map(decode_tangent_basis).unzip();
        StaticVertexAttributes {
            normals,
            tangents,
            uvs: decode_uv_channels(&self.buffer, TANGENT_BASIS_SIZE, self.uv_count, self.precision),
        }
    }

    /// Rebuild the buffer from interchange arrays, keeping the UV precision.
    pub fn set_attributes(&mut self, attributes: &StaticVertexAttributes) -> Result<()> {
        let count = attributes.normals.len();
        if attributes.tangents.len() != count {
            return Err(vertex_count_mismatch(attributes.tangents.len(), count, "tangents"));
        }
        check_uv_channels(&attributes.uvs, count)?;

        let uv_count = attributes.uvs.len() as u32;
        let stride = Self::expected_stride(uv_count, self.precision);
        let mut data = Vec::with_capacity(count * stride as usize);
        for i in 0..count {
            data.extend_from_slice(&encode_tangent_basis(attributes.normals[i], attributes.tangents[i]));
            for channel in &attributes.uvs {
                self.precision.write_pair(&mut data, channel[i]);
            }
        }
        self.uv_count = uv_count;
        self.buffer = Buffer::new(stride, data)?;
        Ok(())
    }
}

/// Vertex colors (`4` bytes per vertex, opaque).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorVertexBuffer {
    pub buffer: Buffer,
}

impl ColorVertexBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "color vertex buffer marker")?;
        reader.expect_u32(COLOR_STRIDE, "color stride")?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let buffer = Buffer::read(reader)?;
        check(buffer.offset(), "color vertex count", vertex_count, buffer.count())?;
        Ok(Self { buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(COLOR_STRIDE)?;
        writer.write_u32::<LittleEndian>(self.buffer.count())?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::Color
    }
}

/// Tangent basis, position and UVs of a skeletal mesh vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalVertexAttributes {
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    pub positions: Vec<[f32; 3]>,
    /// One entry per UV channel, each holding one pair per vertex.
    pub uvs: Vec<Vec<[f32; 2]>>,
}

/// Tangent basis, positions and UVs for skeletal meshes.
///
/// The header carries a mesh extension that must be `(1, 1, 1)` and an
/// origin that must be zero; both are enforced at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalMeshVertexBuffer {
    pub uv_count: u32,
    pub precision: UvPrecision,
    pub buffer: Buffer,
}

impl SkeletalMeshVertexBuffer {
    fn expected_stride(uv_count: u32, precision: UvPrecision) -> u32 {
        (SKELETAL_VERTEX_BASE + uv_count as usize * precision.pair_size()) as u32
    }

    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "skeletal mesh vertex buffer marker")?;
        let uv_count = reader.read_u32::<LittleEndian>()?;
        let flag_offset = reader.pos()?;
        let precision = UvPrecision::from_flag(reader.read_u32::<LittleEndian>()?, flag_offset)?;

        let scale_offset = reader.pos()?;
        let scale = reader.read_f32_array::<3>()?;
        if scale != [1.0, 1.0, 1.0] {
            return Err(Error::mismatch(scale_offset, "mesh extension", [1.0f32; 3], scale));
        }
        reader.read_null_array(3, "mesh origin")?;

        let buffer = Buffer::read(reader)?;
        check(
            buffer.offset(),
            "skeletal mesh vertex stride for UV layout",
            Self::expected_stride(uv_count, precision),
            buffer.stride(),
        )?;
        Ok(Self { uv_count, precision, buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(self.uv_count)?;
        writer.write_u32::<LittleEndian>(self.precision.flag())?;
        writer.write_f32_slice(&[1.0, 1.0, 1.0])?;
        writer.write_null_array(3)?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::SkeletalMeshAttr
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.buffer.count()
    }

    #[must_use]
    pub fn attributes(&self) -> SkeletalVertexAttributes {
        let mut attributes = SkeletalVertexAttributes::default();
        for v in self.buffer.elements() {
            let (normal, tangent) = decode_tangent_basis(v);
            attributes.normals.push(normal);
            attributes.tangents.push(tangent);
            attributes.positions.push(decode_position(read_f32x3(&v[TANGENT_BASIS_SIZE..])));
        }
        attributes.uvs = decode_uv_channels(&self.buffer, SKELETAL_VERTEX_BASE, self.uv_count, self.precision);
        attributes
    }

    /// Bounding box extent of the decoded positions (interchange units).
    #[must_use]
    pub fn extent(&self) -> [f32; 3] {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in self.attributes().positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        if self.buffer.count() == 0 {
            return [0.0; 3];
        }
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }

    /// Rebuild the buffer from interchange arrays, keeping the UV precision.
    pub fn set_attributes(&mut self, attributes: &SkeletalVertexAttributes) -> Result<()> {
        let count = attributes.normals.len();
        if attributes.tangents.len() != count {
            return Err(vertex_count_mismatch(attributes.tangents.len(), count, "tangents"));
        }
        if attributes.positions.len() != count {
            return Err(vertex_count_mismatch(attributes.positions.len(), count, "positions"));
        }
        check_uv_channels(&attributes.uvs, count)?;

        let uv_count = attributes.uvs.len() as u32;
        let stride = Self::expected_stride(uv_count, self.precision);
        let mut data = Vec::with_capacity(count * stride as usize);
        for i in 0..count {
            data.extend_from_slice(&encode_tangent_basis(attributes.normals[i], attributes.tangents[i]));
            write_f32x3(&mut data, encode_position(attributes.positions[i]));
            for channel in &attributes.uvs {
                self.precision.write_pair(&mut data, channel[i]);
            }
        }
        self.uv_count = uv_count;
        self.buffer = Buffer::new(stride, data)?;
        Ok(())
    }
}

/// Decoded skin weights. Weights are normalised to `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinWeights {
    pub joints: Vec<[u8; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub joints2: Option<Vec<[u8; 4]>>,
    pub weights2: Option<Vec<[f32; 4]>>,
}

/// Four joint indices and four weight bytes per vertex, doubled when the
/// extra-bone flag is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinWeightVertexBuffer {
    pub extra_bone: bool,
    pub buffer: Buffer,
}

impl SkinWeightVertexBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "skin weight buffer marker")?;
        let flag_offset = reader.pos()?;
        let extra_bone = match reader.read_u32::<LittleEndian>()? {
            0 => false,
            1 => true,
            other => return Err(Error::mismatch(flag_offset, "extra bone flag", "0 or 1", other)),
        };
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let buffer = Buffer::read(reader)?;
        let offset = buffer.offset();
        check(offset, "skin weight vertex count", vertex_count, buffer.count())?;
        let expected = if extra_bone { SKIN_WEIGHT_STRIDE_EXTRA } else { SKIN_WEIGHT_STRIDE };
        check(offset, "skin weight stride for extra bone flag", expected, buffer.stride())?;
        Ok(Self { extra_bone, buffer })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(u32::from(self.extra_bone))?;
        writer.write_u32::<LittleEndian>(self.buffer.count())?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::SkinWeight
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.buffer.count()
    }

    #[must_use]
    pub fn weights(&self) -> SkinWeights {
        let half = self.buffer.stride() as usize / 2;
        let joints_at = |v: &[u8], at: usize| [v[at], v[at + 1], v[at + 2], v[at + 3]];
        let weights_at = |v: &[u8], at: usize| {
            [v[at], v[at + 1], v[at + 2], v[at + 3]].map(|w| f32::from(w) / 255.0)
        };

        let mut out = SkinWeights {
            joints: self.buffer.elements().map(|v| joints_at(v, 0)).collect(),
            weights: self.buffer.elements().map(|v| weights_at(v, half)).collect(),
            joints2: None,
            weights2: None,
        };
        if self.extra_bone {
            out.joints2 = Some(self.buffer.elements().map(|v| joints_at(v, 4)).collect());
            out.weights2 = Some(self.buffer.elements().map(|v| weights_at(v, half + 4)).collect());
        }
        out
    }

    /// Rebuild the buffer; the extra-bone flag follows the presence of a
    /// secondary set.
    pub fn set_weights(&mut self, weights: &SkinWeights) -> Result<()> {
        let count = weights.joints.len();
        if weights.weights.len() != count {
            return Err(vertex_count_mismatch(weights.weights.len(), count, "weights"));
        }
        let secondary = match (&weights.joints2, &weights.weights2) {
            (Some(j), Some(w)) if j.len() == count && w.len() == count => Some((j, w)),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidInterchange {
                    message: "secondary joints and weights must both be present with one entry per vertex".to_string(),
                });
            }
        };

        let quantize_weights = |w: &[f32; 4]| w.map(|x| (x * 255.0).round().clamp(0.0, 255.0) as u8);
        let stride = if secondary.is_some() { SKIN_WEIGHT_STRIDE_EXTRA } else { SKIN_WEIGHT_STRIDE };
        let mut data = Vec::with_capacity(count * stride as usize);
        for i in 0..count {
            data.extend_from_slice(&weights.joints[i]);
            if let Some((j2, _)) = secondary {
                data.extend_from_slice(&j2[i]);
            }
            data.extend_from_slice(&quantize_weights(&weights.weights[i]));
            if let Some((_, w2)) = secondary {
                data.extend_from_slice(&quantize_weights(&w2[i]));
            }
        }
        self.extra_bone = secondary.is_some();
        self.buffer = Buffer::new(stride, data)?;
        Ok(())
    }
}

/// Auxiliary ("KDI") buffer attached to skeletal LODs. The payload is opaque;
/// only its size is tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct KdiBuffer {
    pub buffer: Buffer,
}

impl KdiBuffer {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "auxiliary buffer marker")?;
        Ok(Self { buffer: Buffer::read(reader)? })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        self.buffer.write(writer)
    }

    #[must_use]
    pub fn kind(&self) -> BufferKind {
        BufferKind::Auxiliary
    }
}
