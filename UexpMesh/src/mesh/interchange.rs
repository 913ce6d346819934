//! Per-section geometry arrays exchanged with external tooling
//!
//! [`LodInterchange`] is what a LOD hands to format converters (glTF and
//! friends), and what they hand back to rebuild a LOD's buffers. Positions are
//! in interchange units with the up axis swapped; joints are skeleton bone ids,
//! not section-local indices; indices are local to their section.

use crate::error::{Error, Result};

/// Geometry of one material section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionGeometry {
    pub material_id: u32,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    /// One entry per UV channel, each holding one pair per vertex.
    pub uvs: Vec<Vec<[f32; 2]>>,
    /// Skeleton bone ids, zeroed where the matching weight is zero.
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub joints2: Option<Vec<[u16; 4]>>,
    pub weights2: Option<Vec<[f32; 4]>>,
    /// Triangle list, local to this section.
    pub indices: Vec<u32>,
}

impl SectionGeometry {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that every per-vertex array has one entry per vertex and that
    /// the indices form whole triangles within the section.
    pub fn validate(&self) -> Result<()> {
        let count = self.vertex_count();
        let invalid = |message: String| Err(Error::InvalidInterchange { message });

        if self.normals.len() != count || self.tangents.len() != count {
            return invalid(format!(
                "{count} positions but {} normals and {} tangents",
                self.normals.len(),
                self.tangents.len()
            ));
        }
        if let Some(channel) = self.uvs.iter().position(|uv| uv.len() != count) {
            return invalid(format!("UV channel {channel} does not have {count} entries"));
        }
        let per_vertex = [
            ("joints", self.joints.as_ref().map(Vec::len)),
            ("weights", self.weights.as_ref().map(Vec::len)),
            ("secondary joints", self.joints2.as_ref().map(Vec::len)),
            ("secondary weights", self.weights2.as_ref().map(Vec::len)),
        ];
        for (what, len) in per_vertex {
            if let Some(len) = len.filter(|&len| len != count) {
                return invalid(format!("{len} {what} for {count} vertices"));
            }
        }
        if self.joints.is_some() != self.weights.is_some() || self.joints2.is_some() != self.weights2.is_some() {
            return invalid("joints and weights must be given together".to_string());
        }
        if self.indices.len() % 3 != 0 {
            return invalid(format!("{} indices is not a whole number of triangles", self.indices.len()));
        }
        if let Some(&id) = self.indices.iter().find(|&&id| id as usize >= count) {
            return invalid(format!("index {id} out of range for {count} vertices"));
        }
        Ok(())
    }
}

/// Interchange view of one LOD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodInterchange {
    pub uv_count: u32,
    pub sections: Vec<SectionGeometry>,
}

impl LodInterchange {
    #[must_use]
    pub fn material_ids(&self) -> Vec<u32> {
        self.sections.iter().map(|s| s.material_id).collect()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.sections.iter().map(SectionGeometry::vertex_count).sum()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.sections.iter().map(SectionGeometry::face_count).sum()
    }
}

/// Sections concatenated back into LOD-wide arrays.
#[derive(Debug, Default)]
pub(crate) struct FlatGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 4]>,
    pub uvs: Vec<Vec<[f32; 2]>>,
    /// Global (LOD-wide) vertex ids.
    pub indices: Vec<u32>,
    pub first_vertex_ids: Vec<u32>,
    pub first_index_ids: Vec<u32>,
}

impl FlatGeometry {
    /// Validate and concatenate `sections`; every section must carry the
    /// same number of UV channels.
    pub fn from_sections(sections: &[SectionGeometry]) -> Result<Self> {
        if sections.is_empty() {
            return Err(Error::InvalidInterchange { message: "a LOD needs at least one section".to_string() });
        }
        let uv_count = sections[0].uvs.len();
        let mut flat = Self { uvs: vec![Vec::new(); uv_count], ..Self::default() };

        for (i, section) in sections.iter().enumerate() {
            section.validate()?;
            if section.uvs.len() != uv_count {
                return Err(Error::InvalidInterchange {
                    message: format!("section {i} has {} UV channels, section 0 has {uv_count}", section.uvs.len()),
                });
            }
            let base = flat.positions.len() as u32;
            flat.first_vertex_ids.push(base);
            flat.first_index_ids.push(flat.indices.len() as u32);

            flat.positions.extend_from_slice(&section.positions);
            flat.normals.extend_from_slice(&section.normals);
            flat.tangents.extend_from_slice(&section.tangents);
            for (channel, uv) in flat.uvs.iter_mut().zip(&section.uvs) {
                channel.extend_from_slice(uv);
            }
            flat.indices.extend(section.indices.iter().map(|&id| id + base));
        }
        Ok(flat)
    }
}
