//! `.uexp` payload file and the `.uasset`/`.uexp` container
//!
//! The payload file holds each export's bytes in export-table order, then an
//! optional author tag and the package signature. Export offsets are counted
//! from the start of the `.uasset`, so every offset check adds the metadata
//! file's length to the payload position.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::formats::cipher::Cipher;
use crate::formats::io::{ReadBinaryExt, check};
use crate::formats::uasset::{ExportKind, PACKAGE_MAGIC, Uasset};
use crate::mesh::{MeshAsset, MeshKind};
use crate::options::{ContainerOptions, ImportOptions};

/// Decoded payload of one export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    /// Allow-listed export, kept as raw bytes.
    Opaque(Vec<u8>),
    /// The asset's mesh, followed by the undecoded rest of the export.
    Mesh { asset: MeshAsset, tail: Vec<u8> },
}

/// Lifecycle of a container. A failed load never produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Loaded,
    Saved,
    /// A save failed part-way; files on disk may be inconsistent.
    Failed,
}

/// Resolve `path` (either half of the pair) to `(uasset, uexp, stem)`.
fn container_paths(path: &Path) -> Result<(PathBuf, PathBuf, String)> {
    let is_container = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("uexp") || ext.eq_ignore_ascii_case("uasset"));
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    match stem {
        Some(stem) if is_container => Ok((path.with_extension("uasset"), path.with_extension("uexp"), stem)),
        _ => Err(Error::InvalidPath(path.to_path_buf())),
    }
}

/// A loaded `.uasset`/`.uexp` pair.
#[derive(Debug, Clone)]
pub struct UexpContainer {
    uasset: Uasset,
    payloads: Vec<ExportPayload>,
    /// Raw author tag bytes from the trailer.
    author: Vec<u8>,
    cipher: Arc<dyn Cipher>,
    state: ContainerState,
    /// Combined length of both files when last loaded or saved.
    total_len: u64,
}

impl UexpContainer {
    /// Load a container from either its `.uexp` or its `.uasset` path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_options(path, &ContainerOptions::default())
    }

    pub fn load_with_options<P: AsRef<Path>>(path: P, options: &ContainerOptions) -> Result<Self> {
        let (uasset_path, uexp_path, stem) = container_paths(path.as_ref())?;
        info!("Loading {}", uexp_path.display());
        let uasset_bytes = fs::read(&uasset_path)?;
        let uexp_bytes = fs::read(&uexp_path)?;
        Self::from_bytes(&uasset_bytes, &uexp_bytes, &stem, options)
    }

    /// Decode a container from the bytes of both files.
    ///
    /// `stem` is the asset name; the export with that name is decoded as a mesh.
    pub fn from_bytes(uasset_bytes: &[u8], uexp_bytes: &[u8], stem: &str, options: &ContainerOptions) -> Result<Self> {
        let uasset = Uasset::from_bytes(uasset_bytes, stem, &options.known_exports)?;
        let kind = match uasset.mesh_export() {
            Some(_) => Some(uasset.mesh_kind()?),
            None => None,
        };
        let base = uasset_bytes.len() as u64;

        let mut reader = Cursor::new(uexp_bytes);
        let mut payloads = Vec::with_capacity(uasset.exports.len());
        for export in &uasset.exports {
            let position = reader.pos()? + base;
            if position != u64::from(export.offset) {
                return Err(Error::OffsetMismatch {
                    export: export.name.clone(),
                    expected: u64::from(export.offset),
                    actual: position,
                });
            }
            let payload = match (export.kind, kind) {
                (ExportKind::Mesh, Some(kind)) => {
                    debug!("{} (offset {}): {kind} mesh", export.name, export.offset);
                    let mut asset = MeshAsset::read(&mut reader, kind)?;
                    asset.resolve_names(&uasset.names)?;
                    let end = u64::from(export.offset) + u64::from(export.size) - base;
                    let consumed = reader.pos()?;
                    let tail_len = end
                        .checked_sub(consumed)
                        .ok_or_else(|| Error::mismatch(consumed, "mesh export end", end, consumed))?;
                    let tail = reader.read_bytes(tail_len as usize)?;
                    ExportPayload::Mesh { asset, tail }
                }
                _ => {
                    debug!("{} (offset {}): {} opaque bytes", export.name, export.offset, export.size);
                    ExportPayload::Opaque(reader.read_bytes(export.size as usize)?)
                }
            };
            payloads.push(payload);
        }

        let trailer_offset = reader.pos()?;
        let mut trailer = reader.read_rest()?;
        let Some(author_len) = trailer.len().checked_sub(PACKAGE_MAGIC.len()) else {
            return Err(Error::mismatch(trailer_offset, "trailer length", ">= 4", trailer.len()));
        };
        let signature = trailer.split_off(author_len);
        check(trailer_offset + author_len as u64, "uexp signature", PACKAGE_MAGIC.as_slice(), signature.as_slice())?;

        let container = Self {
            uasset,
            payloads,
            author: trailer,
            cipher: Arc::clone(&options.cipher),
            state: ContainerState::Loaded,
            total_len: base + uexp_bytes.len() as u64,
        };
        if !container.author.is_empty() {
            info!("Author: {}", container.author());
        }
        Ok(container)
    }

    /// Encode both files, updating export sizes and offsets.
    ///
    /// Returns `(uasset, uexp)` bytes.
    pub fn to_bytes(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let base = self.uasset.encoded_len() as u64;
        let mut uexp = Vec::new();
        for (export, payload) in self.uasset.exports.iter_mut().zip(&self.payloads) {
            let start = uexp.len();
            match payload {
                ExportPayload::Opaque(bytes) => uexp.extend_from_slice(bytes),
                ExportPayload::Mesh { asset, tail } => {
                    asset.write(&mut uexp)?;
                    uexp.extend_from_slice(tail);
                }
            }
            export.size = (uexp.len() - start) as u32;
            export.offset = (start as u64 + base) as u32;
            debug!("{}: size {}, offset {}", export.name, export.size, export.offset);
        }
        uexp.extend_from_slice(&self.author);
        uexp.extend_from_slice(&PACKAGE_MAGIC);

        let total_len = base + uexp.len() as u64;
        let header = &mut self.uasset.header;
        if u64::from(header.bulk_data_offset) + 4 == self.total_len {
            header.bulk_data_offset = (total_len - 4) as u32;
        }
        self.total_len = total_len;

        Ok((self.uasset.to_bytes()?, uexp))
    }

    /// Write both files next to `path` (either half of the pair).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let result = self.write_files(path.as_ref());
        self.state = if result.is_ok() { ContainerState::Saved } else { ContainerState::Failed };
        result
    }

    fn write_files(&mut self, path: &Path) -> Result<()> {
        let (uasset_path, uexp_path, _) = container_paths(path)?;
        info!("Saving {}", uexp_path.display());
        let (uasset, uexp) = self.to_bytes()?;
        if let Some(parent) = uexp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&uexp_path, uexp)?;
        fs::write(&uasset_path, uasset)?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> ContainerState {
        self.state
    }

    #[must_use]
    pub fn uasset(&self) -> &Uasset {
        &self.uasset
    }

    #[must_use]
    pub fn payloads(&self) -> &[ExportPayload] {
        &self.payloads
    }

    /// Kind of the mesh export, if the container has one.
    #[must_use]
    pub fn mesh_kind(&self) -> Option<MeshKind> {
        self.payloads.iter().find_map(|p| match p {
            ExportPayload::Mesh { asset, .. } => Some(asset.kind()),
            ExportPayload::Opaque(_) => None,
        })
    }

    pub fn mesh(&self) -> Result<&MeshAsset> {
        self.payloads
            .iter()
            .find_map(|p| match p {
                ExportPayload::Mesh { asset, .. } => Some(asset),
                ExportPayload::Opaque(_) => None,
            })
            .ok_or(Error::NoMeshExport)
    }

    pub fn mesh_mut(&mut self) -> Result<&mut MeshAsset> {
        self.payloads
            .iter_mut()
            .find_map(|p| match p {
                ExportPayload::Mesh { asset, .. } => Some(asset),
                ExportPayload::Opaque(_) => None,
            })
            .ok_or(Error::NoMeshExport)
    }

    /// The author tag, decoded through the container's cipher.
    #[must_use]
    pub fn author(&self) -> String {
        self.cipher.decrypt(&self.author)
    }

    #[must_use]
    pub fn author_bytes(&self) -> &[u8] {
        &self.author
    }

    /// Replace the author tag.
    pub fn embed_author(&mut self, author: &str) {
        self.author = self.cipher.encrypt(author);
        info!("Embedded author tag ({} bytes)", self.author.len());
    }

    /// Import the donor container's LODs into this container's mesh.
    pub fn import_lods(&mut self, donor: &Self, options: ImportOptions) -> Result<()> {
        let donor_mesh = donor.mesh()?;
        self.mesh_mut()?.import_lods(donor_mesh, options)
    }

    pub fn remove_lods(&mut self) -> Result<()> {
        self.mesh_mut()?.remove_lods();
        Ok(())
    }

    pub fn remove_kdi(&mut self) -> Result<()> {
        self.mesh_mut()?.remove_kdi();
        Ok(())
    }

    /// Write every LOD buffer to `dir` as `LOD{i}_{name}.bin`.
    pub fn dump_buffers<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        self.mesh()?.dump_buffers(dir.as_ref())
    }
}
