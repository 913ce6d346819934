//! Export table records

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt};

/// Encoded size of one [`Export`] record.
pub const EXPORT_RECORD_SIZE: usize = 104;

/// How the payload of an export is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Allow-listed user data, stored as raw bytes.
    Opaque,
    /// The asset's own export, decoded as a mesh.
    Mesh,
}

/// One export table record. `size` and `offset` locate the export's payload
/// in the combined `.uasset` + `.uexp` byte space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub unknown1: [u8; 16],
    pub name_id: u32,
    pub unknown2: [u8; 8],
    pub size: u32,
    pub offset: u32,
    pub unknown3: [u8; 64],
    /// Resolved through the name table after reading.
    pub name: String,
    pub kind: ExportKind,
}

impl Export {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let unknown1 = reader.read_fixed()?;
        let name_id = reader.read_u32::<LittleEndian>()?;
        let unknown2 = reader.read_fixed()?;
        let size = reader.read_u32::<LittleEndian>()?;
        reader.read_null("export size high bits")?;
        let offset = reader.read_u32::<LittleEndian>()?;
        let unknown3 = reader.read_fixed()?;
        Ok(Self {
            unknown1,
            name_id,
            unknown2,
            size,
            offset,
            unknown3,
            name: String::new(),
            kind: ExportKind::Opaque,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.unknown1)?;
        writer.write_u32::<LittleEndian>(self.name_id)?;
        writer.write_all(&self.unknown2)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_null()?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_all(&self.unknown3)?;
        Ok(())
    }

    /// Decide how to handle this export: allow-listed names are opaque, the
    /// asset's own name (the file stem) is the mesh, anything else is
    /// unsupported.
    pub fn classify(&mut self, name: &str, stem: &str, known_exports: &[String]) -> Result<()> {
        self.name = name.to_string();
        self.kind = if known_exports.iter().any(|known| known == name) {
            ExportKind::Opaque
        } else if name == stem {
            ExportKind::Mesh
        } else {
            return Err(Error::UnsupportedAsset { name: name.to_string() });
        };
        Ok(())
    }
}
