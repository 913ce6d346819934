//! Package summary at the start of a `.uasset` file

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt, check};

/// Package signature, shared with the `.uexp` trailer.
pub const PACKAGE_MAGIC: [u8; 4] = [0xC1, 0x83, 0x2A, 0x9E];

/// The only supported package version.
pub const SUPPORTED_VERSION: i32 = 6;

/// Encoded size of [`UassetHeader`]; the name table starts right after it.
pub const HEADER_SIZE: u32 = 193;

/// Package summary. Fields with unknown meaning are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UassetHeader {
    pub version: i32,
    /// Size of the `.uasset` file as recorded by the cooker.
    pub file_size: u32,
    pub package_flags: [u8; 4],
    pub name_count: u32,
    pub name_offset: u32,
    pub export_count: u32,
    pub export_offset: u32,
    pub import_count: u32,
    pub import_offset: u32,
    pub unknown1: [u8; 4],
    pub guid: [u8; 16],
    pub unknown2: [u8; 8],
    pub unknown3: [u8; 4],
    pub padding_offset: u32,
    /// Usually the combined length of both files minus four; updated on save
    /// only when it held that value.
    pub bulk_data_offset: u32,
    pub unknown5: [u8; 4],
    pub file_data_offset: u32,
}

impl UassetHeader {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_fixed::<4>()?;
        if magic != PACKAGE_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        let version = -reader.read_i32::<LittleEndian>()? - 1;
        if version != SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion { version });
        }
        reader.read_null_array(4, "header padding")?;
        let file_size = reader.read_u32::<LittleEndian>()?;

        let folder_offset = reader.pos()?;
        let folder = reader.read_str()?;
        check(folder_offset, "package folder name", "None", folder.as_str())?;
        let package_flags = reader.read_fixed()?;

        let name_count = reader.read_u32::<LittleEndian>()?;
        let name_offset_pos = reader.pos()?;
        let name_offset = reader.read_u32::<LittleEndian>()?;
        check(name_offset_pos, "name table offset", HEADER_SIZE, name_offset)?;
        reader.read_null_array(2, "header padding")?;

        let export_count = reader.read_u32::<LittleEndian>()?;
        let export_offset = reader.read_u32::<LittleEndian>()?;
        let import_count = reader.read_u32::<LittleEndian>()?;
        let import_offset = reader.read_u32::<LittleEndian>()?;
        let unknown1 = reader.read_fixed()?;
        reader.read_null_array(4, "header padding")?;
        let guid = reader.read_fixed()?;
        let unknown2 = reader.read_fixed()?;

        let repeat_offset = reader.pos()?;
        let repeated_count = reader.read_u32::<LittleEndian>()?;
        check(repeat_offset, "repeated name count", name_count, repeated_count)?;
        reader.read_null_array(9, "header padding")?;
        let unknown3 = reader.read_fixed()?;
        reader.read_null("header padding")?;
        let padding_offset = reader.read_u32::<LittleEndian>()?;
        let bulk_data_offset = reader.read_u32::<LittleEndian>()?;
        reader.read_null_array(3, "header padding")?;
        let unknown5 = reader.read_fixed()?;
        let file_data_offset = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            version,
            file_size,
            package_flags,
            name_count,
            name_offset,
            export_count,
            export_offset,
            import_count,
            import_offset,
            unknown1,
            guid,
            unknown2,
            unknown3,
            padding_offset,
            bulk_data_offset,
            unknown5,
            file_data_offset,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PACKAGE_MAGIC)?;
        writer.write_i32::<LittleEndian>(-(self.version + 1))?;
        writer.write_null_array(4)?;
        writer.write_u32::<LittleEndian>(self.file_size)?;
        writer.write_str("None")?;
        writer.write_all(&self.package_flags)?;
        writer.write_u32::<LittleEndian>(self.name_count)?;
        writer.write_u32::<LittleEndian>(self.name_offset)?;
        writer.write_null_array(2)?;
        writer.write_u32_slice(&[self.export_count, self.export_offset, self.import_count, self.import_offset])?;
        writer.write_all(&self.unknown1)?;
        writer.write_null_array(4)?;
        writer.write_all(&self.guid)?;
        writer.write_all(&self.unknown2)?;
        writer.write_u32::<LittleEndian>(self.name_count)?;
        writer.write_null_array(9)?;
        writer.write_all(&self.unknown3)?;
        writer.write_null()?;
        writer.write_u32::<LittleEndian>(self.padding_offset)?;
        writer.write_u32::<LittleEndian>(self.bulk_data_offset)?;
        writer.write_null_array(3)?;
        writer.write_all(&self.unknown5)?;
        writer.write_u32::<LittleEndian>(self.file_data_offset)?;
        Ok(())
    }
}
