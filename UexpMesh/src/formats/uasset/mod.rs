//! `.uasset` metadata file
//!
//! Holds the package summary, the name table and the export table. Every
//! region between them is carried as raw bytes, so writing an unmodified
//! file reproduces it exactly.

mod export;
mod header;

pub use export::{EXPORT_RECORD_SIZE, Export, ExportKind};
pub use header::{HEADER_SIZE, PACKAGE_MAGIC, SUPPORTED_VERSION, UassetHeader};

use std::io::{Cursor, Write};

use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt};
use crate::mesh::MeshKind;

/// One name table entry: the string plus a 4-byte hash kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    pub hash: [u8; 4],
}

/// The package's name table. Other structures refer to names by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: Vec<NameEntry>,
}

impl NameTable {
    #[must_use]
    pub fn new(entries: Vec<NameEntry>) -> Self {
        Self { entries }
    }

    /// Resolve a name index.
    pub fn get(&self, id: u32) -> Result<&str> {
        self.entries
            .get(id as usize)
            .map(|e| e.name.as_str())
            .ok_or(Error::InvalidNameIndex(id))
    }

    /// Index of `name`, if present.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<u32> {
        self.entries.iter().position(|e| e.name == name).map(|i| i as u32)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// A decoded `.uasset` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uasset {
    pub header: UassetHeader,
    pub names: NameTable,
    pub exports: Vec<Export>,
    /// Bytes between the name table and the export table.
    gap: Vec<u8>,
    /// Everything after the export table.
    tail: Vec<u8>,
}

impl Uasset {
    /// Decode a `.uasset` file and classify its exports.
    ///
    /// `stem` is the asset's file name without extension; `known_exports` is
    /// the allow-list of opaque export names.
    pub fn from_bytes(bytes: &[u8], stem: &str, known_exports: &[String]) -> Result<Self> {
        let mut reader = Cursor::new(bytes);
        let header = UassetHeader::read(&mut reader)?;

        let entries = (0..header.name_count)
            .map(|_| {
                Ok(NameEntry {
                    name: reader.read_str()?,
                    hash: reader.read_fixed()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let names = NameTable::new(entries);

        let gap_offset = reader.pos()?;
        let gap_len = u64::from(header.export_offset)
            .checked_sub(gap_offset)
            .ok_or_else(|| Error::mismatch(gap_offset, "export table offset", format!(">= {gap_offset}"), header.export_offset))?;
        let gap = reader.read_bytes(gap_len as usize)?;

        let mut exports = (0..header.export_count)
            .map(|_| Export::read(&mut reader))
            .collect::<Result<Vec<_>>>()?;
        for export in &mut exports {
            let name = names.get(export.name_id)?.to_string();
            export.classify(&name, stem, known_exports)?;
            debug!("Export '{}' ({:?}): size {}, offset {}", export.name, export.kind, export.size, export.offset);
        }
        let tail = reader.read_rest()?;

        Ok(Self { header, names, exports, gap, tail })
    }

    /// Encode the file with the current header and export table.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.header.write(&mut out)?;
        for entry in &self.names.entries {
            out.write_str(&entry.name)?;
            out.write_all(&entry.hash)?;
        }
        out.write_all(&self.gap)?;
        for export in &self.exports {
            export.write(&mut out)?;
        }
        out.write_all(&self.tail)?;
        Ok(out)
    }

    /// Encoded length. Edits never change it: only fixed-width fields move.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let names: usize = self.names.entries.iter().map(|e| 4 + e.name.len() + usize::from(!e.name.is_empty()) + 4).sum();
        HEADER_SIZE as usize + names + self.gap.len() + self.exports.len() * EXPORT_RECORD_SIZE + self.tail.len()
    }

    /// Mesh kind, detected from the class names in the name table.
    pub fn mesh_kind(&self) -> Result<MeshKind> {
        if self.names.contains("SkeletalMesh") {
            Ok(MeshKind::Skeletal)
        } else if self.names.contains("StaticMesh") {
            Ok(MeshKind::Static)
        } else {
            Err(Error::UnknownMeshKind)
        }
    }

    /// Index of the export decoded as a mesh, if any.
    #[must_use]
    pub fn mesh_export(&self) -> Option<usize> {
        self.exports.iter().position(|e| e.kind == ExportKind::Mesh)
    }
}
