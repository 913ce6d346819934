//! Material slots

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::formats::io::ReadBinaryExt;
use crate::formats::uasset::NameTable;

/// A material slot. Sections refer to slots by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    /// Import table reference (negative) of the material interface.
    pub import_index: i32,
    pub slot_name_id: u32,
    pub slot_name_number: u32,
    /// UV channel data and flags, kept verbatim.
    pub unknown: [u8; 24],
    /// Resolved through the name table.
    pub slot_name: String,
}

impl Material {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            import_index: reader.read_i32::<LittleEndian>()?,
            slot_name_id: reader.read_u32::<LittleEndian>()?,
            slot_name_number: reader.read_u32::<LittleEndian>()?,
            unknown: reader.read_fixed()?,
            slot_name: String::new(),
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<LittleEndian>(self.import_index)?;
        writer.write_u32::<LittleEndian>(self.slot_name_id)?;
        writer.write_u32::<LittleEndian>(self.slot_name_number)?;
        writer.write_all(&self.unknown)?;
        Ok(())
    }

    pub fn resolve_name(&mut self, names: &NameTable) -> Result<()> {
        self.slot_name = names.get(self.slot_name_id)?.to_string();
        Ok(())
    }
}

/// Map each donor material index to a target material index by slot name.
///
/// Unmatched donor materials keep their index when it is valid for the
/// target, and fall back to slot 0 otherwise.
#[must_use]
pub fn material_remap(target: &[Material], donor: &[Material]) -> Vec<u32> {
    donor
        .iter()
        .enumerate()
        .map(|(i, material)| {
            if let Some(j) = target.iter().position(|t| t.slot_name == material.slot_name) {
                j as u32
            } else if i < target.len() {
                tracing::warn!("Material slot '{}' not found in target; keeping slot {i}", material.slot_name);
                i as u32
            } else {
                tracing::warn!("Material slot '{}' not found in target; using slot 0", material.slot_name);
                0
            }
        })
        .collect()
}
