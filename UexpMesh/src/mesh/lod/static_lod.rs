//! Static mesh LOD

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use tracing::{info, warn};

use super::{resize_by_cloning_last, split_indices, split_per_section};
use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt, check};
use crate::mesh::buffer::{
    ColorVertexBuffer, LodBuffer, PositionVertexBuffer, StaticIndexBuffer, StaticMeshVertexBuffer,
    StaticVertexAttributes,
};
use crate::mesh::interchange::{FlatGeometry, LodInterchange, SectionGeometry};
use crate::mesh::section::StaticSection;

/// Color padding used when a LOD has to grow its color buffer.
const COLOR_FILL: u8 = 0xFF;

/// One LOD of a static mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticLod {
    pub sections: Vec<StaticSection>,
    pub flags: [u8; 4],
    pub positions: PositionVertexBuffer,
    pub attributes: StaticMeshVertexBuffer,
    pub colors: Option<ColorVertexBuffer>,
    pub indices: StaticIndexBuffer,
    /// Secondary (depth-only) index buffer.
    pub depth_indices: StaticIndexBuffer,
    /// Trailing region, always kept from the original asset.
    pub trailer: [u8; 48],
    offset: u64,
}

impl StaticLod {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let offset = reader.pos()?;
        reader.expect_u16(1, "static LOD marker")?;
        let section_count = reader.read_u32::<LittleEndian>()?;
        let sections = (0..section_count)
            .map(|_| StaticSection::read(reader))
            .collect::<Result<Vec<_>>>()?;
        let flags = reader.read_fixed()?;

        let positions = PositionVertexBuffer::read(reader)?;
        let attributes = StaticMeshVertexBuffer::read(reader)?;
        check(
            attributes.buffer.offset(),
            "attribute vertex count equals position vertex count",
            positions.vertex_count(),
            attributes.vertex_count(),
        )?;

        // A lone `1` marks a missing color buffer; a color buffer starts with `u16 1, u32 4`.
        let colors = if reader.read_u32::<LittleEndian>()? == 1 {
            let padding_offset = reader.pos()?;
            let padding = reader.read_fixed::<6>()?;
            check(padding_offset, "color buffer placeholder", [0u8; 6], padding)?;
            None
        } else {
            reader.rewind_by(4)?;
            Some(ColorVertexBuffer::read(reader)?)
        };

        let indices = StaticIndexBuffer::read(reader)?;
        reader.read_null("index buffer separator")?;
        reader.expect_u32(1, "index buffer separator")?;
        let flag_offset = reader.pos()?;
        if reader.read_u32::<LittleEndian>()? != 0 {
            return Err(Error::UnsupportedFeature {
                offset: flag_offset,
                feature: "adjacency or reversed index buffer",
            });
        }
        let depth_indices = StaticIndexBuffer::read(reader)?;
        let trailer = reader.read_fixed()?;

        Ok(Self {
            sections,
            flags,
            positions,
            attributes,
            colors,
            indices,
            depth_indices,
            trailer,
            offset,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(self.sections.len() as u32)?;
        for section in &self.sections {
            section.write(writer)?;
        }
        writer.write_all(&self.flags)?;
        self.positions.write(writer)?;
        self.attributes.write(writer)?;
        match &self.colors {
            Some(colors) => colors.write(writer)?,
            None => {
                writer.write_u32::<LittleEndian>(1)?;
                writer.write_all(&[0u8; 6])?;
            }
        }
        self.indices.write(writer)?;
        writer.write_u32_slice(&[0, 1, 0])?;
        self.depth_indices.write(writer)?;
        writer.write_all(&self.trailer)?;
        Ok(())
    }

    /// Stream position this LOD was read from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn uv_count(&self) -> u32 {
        self.attributes.uv_count
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.positions.vertex_count()
    }

    #[must_use]
    pub fn face_count(&self) -> u32 {
        self.sections.iter().map(|s| s.face_count).sum()
    }

    pub fn update_material_ids(&mut self, remap: &[u32]) {
        for section in &mut self.sections {
            section.update_material_ids(remap);
        }
    }

    /// Replace this LOD's geometry with the donor's.
    ///
    /// Every buffer comes from the donor. The section list takes the donor's
    /// length (cloning the last target section to grow) and each section is
    /// then overwritten from its donor counterpart. The trailing region stays.
    pub fn import_from(&mut self, donor: &Self) -> Result<()> {
        info!(
            "Importing static LOD: faces {} -> {}, vertices {} -> {}, uv maps {} -> {}",
            self.face_count(),
            donor.face_count(),
            self.vertex_count(),
            donor.vertex_count(),
            self.uv_count(),
            donor.uv_count()
        );

        self.positions = donor.positions.clone();
        self.attributes = donor.attributes.clone();
        self.indices = donor.indices.clone();
        self.depth_indices = donor.depth_indices.clone();
        self.colors = match (self.colors.take(), &donor.colors) {
            (_, Some(colors)) => Some(colors.clone()),
            (Some(own), None) => {
                warn!("Target LOD has a color buffer but the donor doesn't; keeping the target's colors");
                Some(ColorVertexBuffer { buffer: own.buffer.resized(donor.vertex_count(), COLOR_FILL) })
            }
            (None, None) => None,
        };

        resize_by_cloning_last(&mut self.sections, donor.sections.len())?;
        for (section, donor_section) in self.sections.iter_mut().zip(&donor.sections) {
            section.import_section(donor_section);
        }
        self.flags = donor.flags;
        Ok(())
    }

    /// Named views of every buffer, for listing and dumping.
    #[must_use]
    pub fn buffers(&self) -> Vec<LodBuffer<'_>> {
        let mut buffers = vec![
            LodBuffer { name: "VB0", kind: self.positions.kind(), buffer: &self.positions.buffer },
            LodBuffer { name: "VB2", kind: self.attributes.kind(), buffer: &self.attributes.buffer },
            LodBuffer { name: "IB", kind: self.indices.kind(), buffer: &self.indices.buffer },
            LodBuffer { name: "IB2", kind: self.depth_indices.kind(), buffer: &self.depth_indices.buffer },
        ];
        if let Some(colors) = &self.colors {
            buffers.push(LodBuffer { name: "ColorVB", kind: colors.kind(), buffer: &colors.buffer });
        }
        buffers
    }

    /// Decode the buffers into per-section arrays.
    #[must_use]
    pub fn interchange(&self) -> LodInterchange {
        let first_vertex_ids: Vec<u32> = self.sections.iter().map(|s| s.first_vertex_id).collect();
        let first_index_ids: Vec<u32> = self.sections.iter().map(|s| s.first_index_id).collect();

        let StaticVertexAttributes { normals, tangents, uvs } = self.attributes.attributes();
        let positions = split_per_section(&self.positions.positions(), &first_vertex_ids);
        let normals = split_per_section(&normals, &first_vertex_ids);
        let tangents = split_per_section(&tangents, &first_vertex_ids);
        let uvs: Vec<Vec<Vec<[f32; 2]>>> = uvs.iter().map(|uv| split_per_section(uv, &first_vertex_ids)).collect();
        let indices = split_indices(&self.indices.indices(), &first_index_ids, &first_vertex_ids);

        let sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| SectionGeometry {
                material_id: section.material_id,
                positions: positions[i].clone(),
                normals: normals[i].clone(),
                tangents: tangents[i].clone(),
                uvs: uvs.iter().map(|channel| channel[i].clone()).collect(),
                indices: indices[i].clone(),
                ..SectionGeometry::default()
            })
            .collect();

        LodInterchange { uv_count: self.uv_count(), sections }
    }

    /// Rebuild every buffer and section from interchange arrays.
    ///
    /// The depth-only index buffer receives a copy of the primary indices and
    /// an existing color buffer is resized to the new vertex count.
    pub fn rebuild_from_interchange(&mut self, sections: &[SectionGeometry]) -> Result<()> {
        let flat = FlatGeometry::from_sections(sections)?;
        let vertex_count = flat.positions.len() as u32;

        resize_by_cloning_last(&mut self.sections, sections.len())?;
        for (i, (section, geometry)) in self.sections.iter_mut().zip(sections).enumerate() {
            section.material_id = geometry.material_id;
            section.first_vertex_id = flat.first_vertex_ids[i];
            section.first_index_id = flat.first_index_ids[i];
            section.face_count = geometry.face_count() as u32;
            section.max_vertex_id = section.first_vertex_id + (geometry.vertex_count() as u32).saturating_sub(1);
        }

        self.positions.set_positions(&flat.positions)?;
        self.attributes.set_attributes(&StaticVertexAttributes {
            normals: flat.normals,
            tangents: flat.tangents,
            uvs: flat.uvs,
        })?;
        self.indices.set_indices(&flat.indices)?;
        self.depth_indices.set_indices(&flat.indices)?;
        if let Some(colors) = &mut self.colors {
            colors.buffer = colors.buffer.resized(vertex_count, COLOR_FILL);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::buffer::{Buffer, UvPrecision};
    use std::io::Cursor;

    /// A static LOD with one triangle per section.
    pub(crate) fn sample_lod(section_count: usize, with_colors: bool) -> StaticLod {
        let sections = (0..section_count as u32)
            .map(|i| StaticSection {
                material_id: i,
                first_index_id: 0,
                face_count: 0,
                first_vertex_id: 0,
                max_vertex_id: 0,
                flags: [i as u8; 12],
            })
            .collect();
        let mut lod = StaticLod {
            sections,
            flags: [1, 0, 0, 0],
            positions: PositionVertexBuffer { buffer: Buffer::new(12, Vec::new()).unwrap() },
            attributes: StaticMeshVertexBuffer {
                uv_count: 1,
                precision: UvPrecision::Half,
                buffer: Buffer::new(12, Vec::new()).unwrap(),
            },
            colors: with_colors.then(|| ColorVertexBuffer { buffer: Buffer::new(4, Vec::new()).unwrap() }),
            indices: StaticIndexBuffer { wide: false, buffer: Buffer::new(2, Vec::new()).unwrap() },
            depth_indices: StaticIndexBuffer { wide: false, buffer: Buffer::new(2, Vec::new()).unwrap() },
            trailer: [7; 48],
            offset: 0,
        };
        let geometry: Vec<SectionGeometry> = (0..section_count as u32)
            .map(|i| SectionGeometry {
                material_id: i,
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, i as f32]],
                normals: vec![[0.0, 0.0, 1.0]; 3],
                tangents: vec![[1.0, 0.0, 0.0, 1.0]; 3],
                uvs: vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
                indices: vec![0, 1, 2],
                ..SectionGeometry::default()
            })
            .collect();
        lod.rebuild_from_interchange(&geometry).unwrap();
        lod
    }

    fn encode_decode(lod: &StaticLod) -> (Vec<u8>, StaticLod) {
        let mut out = Vec::new();
        lod.write(&mut out).unwrap();
        let back = StaticLod::read(&mut Cursor::new(out.as_slice())).unwrap();
        (out, back)
    }

    #[test]
    fn test_static_lod_round_trip() {
        for with_colors in [false, true] {
            let lod = sample_lod(2, with_colors);
            let (bytes, back) = encode_decode(&lod);
            assert_eq!(back.colors.is_some(), with_colors);
            assert_eq!(back.sections, lod.sections);
            assert_eq!(back.interchange(), lod.interchange());

            let mut again = Vec::new();
            back.write(&mut again).unwrap();
            assert_eq!(again, bytes);
        }
    }

    #[test]
    fn test_static_lod_rejects_reversed_index_buffer() {
        let (mut bytes, back) = encode_decode(&sample_lod(1, false));
        // separator `0, 1, 0` sits right before the depth index buffer
        let depth_len = 4 + 8 + back.depth_indices.buffer.data().len();
        let flag_at = bytes.len() - 48 - depth_len - 4;
        bytes[flag_at] = 1;
        let err = StaticLod::read(&mut Cursor::new(bytes.as_slice())).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature { offset, .. } if offset == flag_at as u64));
    }

    #[test]
    fn test_static_rebuild_sections() {
        let lod = sample_lod(3, false);
        assert_eq!(lod.vertex_count(), 9);
        assert_eq!(lod.face_count(), 3);
        let firsts: Vec<(u32, u32, u32)> = lod
            .sections
            .iter()
            .map(|s| (s.first_vertex_id, s.first_index_id, s.max_vertex_id))
            .collect();
        assert_eq!(firsts, vec![(0, 0, 2), (3, 3, 5), (6, 6, 8)]);
        assert_eq!(lod.indices.indices(), vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(lod.depth_indices.indices(), lod.indices.indices());
    }

    #[test]
    fn test_static_import_keeps_trailer_and_target_colors() {
        let mut target = sample_lod(1, true);
        target.trailer = [9; 48];
        let donor = sample_lod(2, false);

        target.import_from(&donor).unwrap();
        assert_eq!(target.sections.len(), 2);
        assert_eq!(target.trailer, [9; 48]);
        assert_eq!(target.flags, donor.flags);
        assert_eq!(target.positions, donor.positions);
        let colors = target.colors.as_ref().unwrap();
        assert_eq!(colors.buffer.count(), donor.vertex_count());
        assert_eq!(target.face_count() * 3, target.indices.index_count() as u32);
        // the cloned section keeps its own flags
        assert_eq!(target.sections[1].flags, [0; 12]);
    }
}
