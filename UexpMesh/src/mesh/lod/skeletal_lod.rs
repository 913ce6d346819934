//! Skeletal mesh LOD

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeSet;
use std::io::{Read, Seek, Write};

use tracing::{debug, info, warn};

use super::{max_influences, resize_by_cloning_last, split_indices, split_per_section};
use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt, check};
use crate::mesh::buffer::{
    ColorVertexBuffer, KdiBuffer, LodBuffer, SkeletalIndexBuffer, SkeletalMeshVertexBuffer,
    SkeletalVertexAttributes, SkinWeightVertexBuffer, SkinWeights,
};
use crate::mesh::interchange::{FlatGeometry, LodInterchange, SectionGeometry};
use crate::mesh::section::SkeletalSection;

/// Padding for auxiliary buffers grown past their original size.
const KDI_FILL: u8 = 0xFF;
const COLOR_FILL: u8 = 0xFF;

/// The auxiliary buffer pair, present only when some section has an
/// auxiliary slice.
#[derive(Debug, Clone, PartialEq)]
pub struct KdiBuffers {
    /// One element per auxiliary slice entry across all sections.
    pub buffer: KdiBuffer,
    /// One element per vertex.
    pub vertex_buffer: KdiBuffer,
}

/// One LOD of a skeletal mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalLod {
    pub sections: Vec<SkeletalSection>,
    pub indices: SkeletalIndexBuffer,
    pub active_bone_ids: Vec<u16>,
    pub required_bone_ids: Vec<u16>,
    /// Whether the optional pair of zero `u32`s is present.
    pub has_null_pair: bool,
    /// Optional per-vertex id table (`vertex_count + 1` entries).
    pub vertex_ids: Option<Vec<u32>>,
    /// Cached UV channel count, equal to the attribute buffer's.
    pub uv_count: u32,
    pub attributes: SkeletalMeshVertexBuffer,
    pub weights: SkinWeightVertexBuffer,
    pub colors: Option<ColorVertexBuffer>,
    pub adjacency: SkeletalIndexBuffer,
    pub kdi: Option<KdiBuffers>,
    offset: u64,
}

impl SkeletalLod {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let offset = reader.pos()?;
        reader.expect_u16(1, "skeletal LOD marker")?;
        let section_count = reader.read_u32::<LittleEndian>()?;
        let sections = (0..section_count)
            .map(|_| SkeletalSection::read(reader))
            .collect::<Result<Vec<_>>>()?;
        let kdi_total: u32 = sections.iter().map(SkeletalSection::kdi_entry_count).sum();

        let indices = SkeletalIndexBuffer::read(reader)?;
        let active_count = reader.read_u32::<LittleEndian>()? as usize;
        let active_bone_ids = reader.read_u16_vec(active_count)?;
        reader.read_null("skeletal LOD padding")?;

        let count_offset = reader.pos()?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let required_count = reader.read_u32::<LittleEndian>()? as usize;
        let required_bone_ids = reader.read_u16_vec(required_count)?;

        let has_null_pair = reader.read_u32::<LittleEndian>()? == 0;
        if has_null_pair {
            reader.read_null("skeletal LOD null pair")?;
        } else {
            reader.rewind_by(4)?;
        }

        let vertex_ids = if reader.read_u32::<LittleEndian>()? == vertex_count {
            Some(reader.read_u32_vec(vertex_count as usize + 1)?)
        } else {
            reader.rewind_by(4)?;
            None
        };

        let uv_offset = reader.pos()?;
        let uv_count = reader.read_u32::<LittleEndian>()?;
        let attributes = SkeletalMeshVertexBuffer::read(reader)?;
        check(uv_offset, "cached UV channel count", attributes.uv_count, uv_count)?;
        check(count_offset, "LOD vertex count", attributes.vertex_count(), vertex_count)?;
        let weights = SkinWeightVertexBuffer::read(reader)?;
        check(
            weights.buffer.offset(),
            "skin weight vertex count",
            attributes.vertex_count(),
            weights.vertex_count(),
        )?;

        // The color buffer's `u16 1` marker; the adjacency width is 2 or 4.
        let has_colors = reader.read_u8()? == 1;
        reader.rewind_by(1)?;
        let colors = if has_colors { Some(ColorVertexBuffer::read(reader)?) } else { None };

        let adjacency = SkeletalIndexBuffer::read(reader)?;

        let kdi = if kdi_total > 0 {
            let buffer = KdiBuffer::read(reader)?;
            check(buffer.buffer.offset(), "auxiliary buffer size", kdi_total, buffer.buffer.count())?;
            let vertex_buffer = KdiBuffer::read(reader)?;
            Some(KdiBuffers { buffer, vertex_buffer })
        } else {
            None
        };

        debug!("Read skeletal LOD at {offset}: {} sections, {vertex_count} vertices", sections.len());
        Ok(Self {
            sections,
            indices,
            active_bone_ids,
            required_bone_ids,
            has_null_pair,
            vertex_ids,
            uv_count,
            attributes,
            weights,
            colors,
            adjacency,
            kdi,
            offset,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u32::<LittleEndian>(self.sections.len() as u32)?;
        for section in &self.sections {
            section.write(writer)?;
        }
        self.indices.write(writer)?;
        writer.write_u32::<LittleEndian>(self.active_bone_ids.len() as u32)?;
        writer.write_u16_slice(&self.active_bone_ids)?;
        writer.write_null()?;
        writer.write_u32::<LittleEndian>(self.vertex_count())?;
        writer.write_u32::<LittleEndian>(self.required_bone_ids.len() as u32)?;
        writer.write_u16_slice(&self.required_bone_ids)?;
        if self.has_null_pair {
            writer.write_null_array(2)?;
        }
        if let Some(ids) = &self.vertex_ids {
            writer.write_u32::<LittleEndian>(self.vertex_count())?;
            writer.write_u32_slice(ids)?;
        }
        writer.write_u32::<LittleEndian>(self.uv_count)?;
        self.attributes.write(writer)?;
        self.weights.write(writer)?;
        if let Some(colors) = &self.colors {
            colors.write(writer)?;
        }
        self.adjacency.write(writer)?;
        if let Some(kdi) = &self.kdi {
            kdi.buffer.write(writer)?;
            kdi.vertex_buffer.write(writer)?;
        }
        Ok(())
    }

    /// Stream position this LOD was read from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.attributes.vertex_count()
    }

    #[must_use]
    pub fn face_count(&self) -> u32 {
        self.sections.iter().map(|s| s.face_count).sum()
    }

    /// Total auxiliary entries across sections.
    #[must_use]
    pub fn kdi_entry_count(&self) -> u32 {
        self.sections.iter().map(SkeletalSection::kdi_entry_count).sum()
    }

    pub fn update_material_ids(&mut self, remap: &[u32]) {
        for section in &mut self.sections {
            section.update_material_ids(remap);
        }
    }

    /// Replace this LOD's geometry with the donor's.
    ///
    /// Buffers, UV count and bone id lists come from the donor. The section
    /// list takes the donor's length (cloning the last target section to
    /// grow) and each section is overwritten from its donor counterpart. The
    /// auxiliary buffers are then refitted to the new section slices and
    /// vertex count.
    pub fn import_from(&mut self, donor: &Self) -> Result<()> {
        info!(
            "Importing skeletal LOD: faces {} -> {}, vertices {} -> {}, uv maps {} -> {}",
            self.face_count(),
            donor.face_count(),
            self.vertex_count(),
            donor.vertex_count(),
            self.uv_count,
            donor.uv_count
        );

        let vertex_count = donor.vertex_count();
        self.indices = donor.indices.clone();
        self.attributes = donor.attributes.clone();
        self.weights = donor.weights.clone();
        self.adjacency = donor.adjacency.clone();
        self.uv_count = donor.uv_count;
        self.colors = match (self.colors.take(), &donor.colors) {
            (_, Some(colors)) => Some(colors.clone()),
            (Some(own), None) => {
                warn!("Target LOD has a color buffer but the donor doesn't; keeping the target's colors");
                Some(ColorVertexBuffer { buffer: own.buffer.resized(vertex_count, COLOR_FILL) })
            }
            (None, None) => None,
        };
        self.vertex_ids = match (self.vertex_ids.take(), &donor.vertex_ids) {
            (_, Some(ids)) => Some(ids.clone()),
            (Some(mut own), None) => {
                own.resize(vertex_count as usize + 1, u32::MAX);
                Some(own)
            }
            (None, None) => None,
        };

        resize_by_cloning_last(&mut self.sections, donor.sections.len())?;
        for (section, donor_section) in self.sections.iter_mut().zip(&donor.sections) {
            section.import_section(donor_section);
        }
        self.active_bone_ids.clone_from(&donor.active_bone_ids);
        self.required_bone_ids.clone_from(&donor.required_bone_ids);
        self.refit_kdi();
        Ok(())
    }

    /// Keep the auxiliary pair consistent with the section slices and the
    /// vertex count. Padding uses `0xFF`; nothing past the new size survives.
    fn refit_kdi(&mut self) {
        let total = self.kdi_entry_count();
        let vertex_count = self.vertex_count();
        if total == 0 {
            self.kdi = None;
            return;
        }
        if let Some(kdi) = &mut self.kdi {
            kdi.buffer.buffer = kdi.buffer.buffer.resized(total, KDI_FILL);
            kdi.vertex_buffer.buffer = kdi.vertex_buffer.buffer.resized(vertex_count, KDI_FILL);
        } else {
            // Slices without a buffer can't be written back.
            for section in &mut self.sections {
                section.remove_kdi();
            }
        }
    }

    /// Drop the auxiliary buffers and every section's auxiliary slice.
    pub fn remove_kdi(&mut self) {
        self.kdi = None;
        for section in &mut self.sections {
            section.remove_kdi();
        }
    }

    /// Rebuild the adjacency index buffer from the primary triangles.
    ///
    /// Each triangle `(a, b, c)` becomes `(a, b, c, a, b, b, c, c, a)`: the
    /// triangle followed by its three edges.
    pub fn regenerate_adjacency(&mut self) -> Result<()> {
        let adjacency: Vec<u32> = self
            .indices
            .indices()
            .chunks_exact(3)
            .flat_map(|t| [t[0], t[1], t[2], t[0], t[1], t[1], t[2], t[2], t[0]])
            .collect();
        self.adjacency.set_indices(&adjacency, self.indices.width())
    }

    /// Named views of every buffer, for listing and dumping.
    #[must_use]
    pub fn buffers(&self) -> Vec<LodBuffer<'_>> {
        let mut buffers = vec![
            LodBuffer { name: "VB0", kind: self.attributes.kind(), buffer: &self.attributes.buffer },
            LodBuffer { name: "VB2", kind: self.weights.kind(), buffer: &self.weights.buffer },
            LodBuffer { name: "IB", kind: self.indices.kind(), buffer: &self.indices.buffer },
            LodBuffer { name: "IB2", kind: self.adjacency.kind(), buffer: &self.adjacency.buffer },
        ];
        if let Some(colors) = &self.colors {
            buffers.push(LodBuffer { name: "ColorVB", kind: colors.kind(), buffer: &colors.buffer });
        }
        if let Some(kdi) = &self.kdi {
            buffers.push(LodBuffer { name: "KDI_buffer", kind: kdi.buffer.kind(), buffer: &kdi.buffer.buffer });
            buffers.push(LodBuffer {
                name: "KDI_VB",
                kind: kdi.vertex_buffer.kind(),
                buffer: &kdi.vertex_buffer.buffer,
            });
        }
        buffers
    }

    /// Decode the buffers into per-section arrays. Joints are mapped through
    /// each section's vertex group to skeleton bone ids.
    #[must_use]
    pub fn interchange(&self) -> LodInterchange {
        let first_vertex_ids: Vec<u32> = self.sections.iter().map(|s| s.first_vertex_id).collect();
        let first_index_ids: Vec<u32> = self.sections.iter().map(|s| s.first_index_id).collect();

        let SkeletalVertexAttributes { normals, tangents, positions, uvs } = self.attributes.attributes();
        let SkinWeights { joints, weights, joints2, weights2 } = self.weights.weights();

        let split = |v: &[[f32; 3]]| split_per_section(v, &first_vertex_ids);
        let positions = split(&positions);
        let normals = split(&normals);
        let tangents = split_per_section(&tangents, &first_vertex_ids);
        let uvs: Vec<Vec<Vec<[f32; 2]>>> = uvs.iter().map(|uv| split_per_section(uv, &first_vertex_ids)).collect();
        let joints = split_per_section(&joints, &first_vertex_ids);
        let weights = split_per_section(&weights, &first_vertex_ids);
        let joints2 = joints2.map(|j| split_per_section(&j, &first_vertex_ids));
        let weights2 = weights2.map(|w| split_per_section(&w, &first_vertex_ids));
        let indices = split_indices(&self.indices.indices(), &first_index_ids, &first_vertex_ids);

        let sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let group = &section.vertex_group;
                let secondary = joints2.as_ref().zip(weights2.as_ref());
                SectionGeometry {
                    material_id: u32::from(section.material_id),
                    positions: positions[i].clone(),
                    normals: normals[i].clone(),
                    tangents: tangents[i].clone(),
                    uvs: uvs.iter().map(|channel| channel[i].clone()).collect(),
                    joints: Some(to_bone_ids(group, &joints[i], &weights[i])),
                    weights: Some(weights[i].clone()),
                    joints2: secondary.map(|(j, w)| to_bone_ids(group, &j[i], &w[i])),
                    weights2: secondary.map(|(_, w)| w[i].clone()),
                    indices: indices[i].clone(),
                }
            })
            .collect();

        LodInterchange { uv_count: self.uv_count, sections }
    }

    /// Rebuild every buffer and section from interchange arrays.
    ///
    /// Each section's vertex group is recomputed from the bones it actually
    /// weights. The adjacency buffer is regenerated and the color and
    /// auxiliary buffers are resized to the new vertex count.
    pub fn rebuild_from_interchange(&mut self, sections: &[SectionGeometry]) -> Result<()> {
        let flat = FlatGeometry::from_sections(sections)?;
        let vertex_count = flat.positions.len() as u32;
        let has_secondary = sections[0].joints2.is_some();

        let mut skin = SkinWeights {
            joints2: has_secondary.then(Vec::new),
            weights2: has_secondary.then(Vec::new),
            ..SkinWeights::default()
        };
        resize_by_cloning_last(&mut self.sections, sections.len())?;
        for (i, (section, geometry)) in self.sections.iter_mut().zip(sections).enumerate() {
            let (Some(joints), Some(weights)) = (&geometry.joints, &geometry.weights) else {
                return Err(Error::InvalidInterchange { message: format!("section {i} has no skin weights") });
            };
            if geometry.joints2.is_some() != has_secondary {
                return Err(Error::InvalidInterchange {
                    message: format!("section {i} disagrees with section 0 on secondary weights"),
                });
            }
            let secondary = geometry.joints2.as_ref().zip(geometry.weights2.as_ref());

            let mut bones = BTreeSet::new();
            collect_bones(&mut bones, joints, weights);
            if let Some((j2, w2)) = secondary {
                collect_bones(&mut bones, j2, w2);
            }
            let group: Vec<u16> = if bones.is_empty() { vec![0] } else { bones.into_iter().collect() };
            if group.len() > 256 {
                return Err(Error::InvalidInterchange {
                    message: format!("section {i} weights {} bones, at most 256 are addressable", group.len()),
                });
            }

            skin.joints.extend(to_local_joints(&group, joints, weights));
            skin.weights.extend_from_slice(weights);
            if let (Some((j2, w2)), Some(out_j2), Some(out_w2)) = (secondary, &mut skin.joints2, &mut skin.weights2) {
                out_j2.extend(to_local_joints(&group, j2, w2));
                out_w2.extend_from_slice(w2);
            }

            section.material_id = u16::try_from(geometry.material_id).map_err(|_| Error::InvalidInterchange {
                message: format!("material id {} out of range", geometry.material_id),
            })?;
            section.first_vertex_id = flat.first_vertex_ids[i];
            section.first_index_id = flat.first_index_ids[i];
            section.face_count = geometry.face_count() as u32;
            section.vertex_count = geometry.vertex_count() as u32;
            section.max_bone_influences = max_influences(weights, secondary.map(|(_, w2)| w2.as_slice()));
            section.vertex_group = group;
        }

        self.attributes.set_attributes(&SkeletalVertexAttributes {
            normals: flat.normals,
            tangents: flat.tangents,
            positions: flat.positions,
            uvs: flat.uvs,
        })?;
        self.uv_count = self.attributes.uv_count;
        self.weights.set_weights(&skin)?;
        let width = if vertex_count > u32::from(u16::MAX) { 4 } else { self.indices.width() };
        self.indices.set_indices(&flat.indices, width)?;
        self.regenerate_adjacency()?;

        if let Some(colors) = &mut self.colors {
            colors.buffer = colors.buffer.resized(vertex_count, COLOR_FILL);
        }
        if let Some(ids) = &mut self.vertex_ids {
            ids.resize(vertex_count as usize + 1, u32::MAX);
        }
        self.refit_kdi();
        Ok(())
    }
}

/// Section-local joints to skeleton bone ids, zeroed where the weight is zero.
fn to_bone_ids(group: &[u16], joints: &[[u8; 4]], weights: &[[f32; 4]]) -> Vec<[u16; 4]> {
    joints
        .iter()
        .zip(weights)
        .map(|(j, w)| {
            std::array::from_fn(|k| {
                if w[k] == 0.0 {
                    0
                } else {
                    group.get(usize::from(j[k])).copied().unwrap_or(0)
                }
            })
        })
        .collect()
}

fn collect_bones(bones: &mut BTreeSet<u16>, joints: &[[u16; 4]], weights: &[[f32; 4]]) {
    for (j, w) in joints.iter().zip(weights) {
        for k in 0..4 {
            if w[k] > 0.0 {
                bones.insert(j[k]);
            }
        }
    }
}

/// Skeleton bone ids to indices into `group`. Unweighted slots map to `0`.
fn to_local_joints<'a>(
    group: &'a [u16],
    joints: &'a [[u16; 4]],
    weights: &'a [[f32; 4]],
) -> impl Iterator<Item = [u8; 4]> + 'a {
    joints.iter().zip(weights).map(move |(j, w)| {
        std::array::from_fn(|k| {
            if w[k] > 0.0 {
                group.binary_search(&j[k]).map_or(0, |local| local as u8)
            } else {
                0
            }
        })
    })
}
