//! Per-material LOD sections
//!
//! A section is a contiguous slice of a LOD's vertices and indices drawn with
//! one material. Skeletal sections also carry the vertex group that maps the
//! section-local joint indices in the skin weight buffer to skeleton bones.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt};

/// Bytes per entry of a skeletal section's auxiliary slice.
pub const KDI_ENTRY_SIZE: usize = 16;

/// Section of a static mesh LOD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSection {
    pub material_id: u32,
    pub first_index_id: u32,
    pub face_count: u32,
    pub first_vertex_id: u32,
    pub max_vertex_id: u32,
    /// Collision and shadow flags, kept verbatim.
    pub flags: [u8; 12],
}

impl StaticSection {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            material_id: reader.read_u32::<LittleEndian>()?,
            first_index_id: reader.read_u32::<LittleEndian>()?,
            face_count: reader.read_u32::<LittleEndian>()?,
            first_vertex_id: reader.read_u32::<LittleEndian>()?,
            max_vertex_id: reader.read_u32::<LittleEndian>()?,
            flags: reader.read_fixed()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32_slice(&[
            self.material_id,
            self.first_index_id,
            self.face_count,
            self.first_vertex_id,
            self.max_vertex_id,
        ])?;
        writer.write_all(&self.flags)?;
        Ok(())
    }

    /// Rewrite the material id through `remap` (indexed by old id).
    /// Ids outside the map are left alone.
    pub fn update_material_ids(&mut self, remap: &[u32]) {
        if let Some(&id) = remap.get(self.material_id as usize) {
            self.material_id = id;
        }
    }

    /// Copy the donor's material id and ranges. Flags stay with the target.
    pub fn import_section(&mut self, donor: &Self) {
        self.material_id = donor.material_id;
        self.first_index_id = donor.first_index_id;
        self.face_count = donor.face_count;
        self.first_vertex_id = donor.first_vertex_id;
        self.max_vertex_id = donor.max_vertex_id;
    }
}

/// Section of a skeletal mesh LOD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletalSection {
    pub material_id: u16,
    pub first_index_id: u32,
    pub face_count: u32,
    pub flags: [u8; 2],
    pub first_vertex_id: u32,
    /// Skeleton bone id for each section-local joint index.
    pub vertex_group: Vec<u16>,
    pub vertex_count: u32,
    pub max_bone_influences: u32,
    pub unknown: [u8; 8],
    /// Auxiliary ("KDI") slice, `KDI_ENTRY_SIZE` bytes per entry. Empty when absent.
    pub kdi: Vec<u8>,
}

impl SkeletalSection {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.expect_u16(1, "skeletal section marker")?;
        let material_id = reader.read_u16::<LittleEndian>()?;
        let first_index_id = reader.read_u32::<LittleEndian>()?;
        let face_count = reader.read_u32::<LittleEndian>()?;
        let flags = reader.read_fixed()?;
        let first_vertex_id = reader.read_u32::<LittleEndian>()?;
        let group_len = reader.read_u32::<LittleEndian>()? as usize;
        let vertex_group = reader.read_u16_vec(group_len)?;
        let vertex_count = reader.read_u32::<LittleEndian>()?;
        let max_bone_influences = reader.read_u32::<LittleEndian>()?;
        let unknown = reader.read_fixed()?;
        let kdi_len = reader.read_u32::<LittleEndian>()? as usize;
        let kdi = reader.read_bytes(kdi_len.saturating_mul(KDI_ENTRY_SIZE))?;

        Ok(Self {
            material_id,
            first_index_id,
            face_count,
            flags,
            first_vertex_id,
            vertex_group,
            vertex_count,
            max_bone_influences,
            unknown,
            kdi,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(1)?;
        writer.write_u16::<LittleEndian>(self.material_id)?;
        writer.write_u32::<LittleEndian>(self.first_index_id)?;
        writer.write_u32::<LittleEndian>(self.face_count)?;
        writer.write_all(&self.flags)?;
        writer.write_u32::<LittleEndian>(self.first_vertex_id)?;
        writer.write_u32::<LittleEndian>(self.vertex_group.len() as u32)?;
        writer.write_u16_slice(&self.vertex_group)?;
        writer.write_u32::<LittleEndian>(self.vertex_count)?;
        writer.write_u32::<LittleEndian>(self.max_bone_influences)?;
        writer.write_all(&self.unknown)?;
        writer.write_u32::<LittleEndian>(self.kdi_entry_count())?;
        writer.write_all(&self.kdi)?;
        Ok(())
    }

    /// Rewrite the material id through `remap` (indexed by old id).
    /// Ids outside the map, or too wide for the 16-bit field, are left alone.
    pub fn update_material_ids(&mut self, remap: &[u32]) {
        let Some(&id) = remap.get(usize::from(self.material_id)) else {
            return;
        };
        match u16::try_from(id) {
            Ok(id) => self.material_id = id,
            Err(_) => tracing::warn!("Material id {id} does not fit a skeletal section; keeping {}", self.material_id),
        }
    }

    /// Copy the donor's material id, ranges and vertex group.
    ///
    /// The auxiliary slice stays with the target; the LOD reconciles the
    /// auxiliary buffer afterwards.
    pub fn import_section(&mut self, donor: &Self) {
        self.material_id = donor.material_id;
        self.first_index_id = donor.first_index_id;
        self.face_count = donor.face_count;
        self.first_vertex_id = donor.first_vertex_id;
        self.vertex_group.clone_from(&donor.vertex_group);
        self.vertex_count = donor.vertex_count;
        self.max_bone_influences = donor.max_bone_influences;
    }

    pub fn remove_kdi(&mut self) {
        self.kdi.clear();
    }

    #[must_use]
    pub fn kdi_entry_count(&self) -> u32 {
        (self.kdi.len() / KDI_ENTRY_SIZE) as u32
    }
}
