//! Static and skeletal mesh export payloads

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::interchange::{LodInterchange, SectionGeometry};
use super::lod::{SkeletalLod, StaticLod};
use super::material::{Material, material_remap};
use super::skeleton::Skeleton;
use crate::error::{Error, Result};
use crate::formats::uasset::NameTable;
use crate::mesh::buffer::LodBuffer;
use crate::options::ImportOptions;

/// Which kind of mesh an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Static,
    Skeletal,
}

impl MeshKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Skeletal => "skeletal",
        }
    }
}

impl std::fmt::Display for MeshKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn read_list<R, T>(reader: &mut R, read: impl Fn(&mut R) -> Result<T>) -> Result<Vec<T>>
where
    R: Read + Seek,
{
    let count = reader.read_u32::<LittleEndian>()?;
    (0..count).map(|_| read(reader)).collect()
}

fn write_materials<W: Write>(writer: &mut W, materials: &[Material]) -> Result<()> {
    writer.write_u32::<LittleEndian>(materials.len() as u32)?;
    for material in materials {
        material.write(writer)?;
    }
    Ok(())
}

/// Section material ids to restore after an import with `only_mesh`.
fn kept_material_ids<T: Copy>(current: &[T], len: usize) -> Vec<T> {
    (0..len).filter_map(|i| current.get(i).or(current.last()).copied()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticMesh {
    pub materials: Vec<Material>,
    pub lods: Vec<StaticLod>,
}

impl StaticMesh {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let materials = read_list(reader, Material::read)?;
        let lods = read_list(reader, StaticLod::read)?;
        Ok(Self { materials, lods })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_materials(writer, &self.materials)?;
        writer.write_u32::<LittleEndian>(self.lods.len() as u32)?;
        for lod in &self.lods {
            lod.write(writer)?;
        }
        Ok(())
    }

    fn import_lods(&mut self, donor: &Self, options: ImportOptions) -> Result<()> {
        let remap = material_remap(&self.materials, &donor.materials);
        for (i, (lod, donor_lod)) in self.lods.iter_mut().zip(&donor.lods).enumerate() {
            let before: Vec<u32> = lod.sections.iter().map(|s| s.material_id).collect();
            lod.import_from(donor_lod)?;
            if options.only_mesh {
                let kept = kept_material_ids(&before, lod.sections.len());
                for (section, id) in lod.sections.iter_mut().zip(kept) {
                    section.material_id = id;
                }
            } else {
                lod.update_material_ids(&remap);
            }
            debug!("LOD{i} imported");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkeletalMesh {
    pub materials: Vec<Material>,
    pub skeleton: Skeleton,
    pub lods: Vec<SkeletalLod>,
}

impl SkeletalMesh {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let materials = read_list(reader, Material::read)?;
        let skeleton = Skeleton::read(reader)?;
        let lods = read_list(reader, SkeletalLod::read)?;
        Ok(Self { materials, skeleton, lods })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_materials(writer, &self.materials)?;
        self.skeleton.write(writer)?;
        writer.write_u32::<LittleEndian>(self.lods.len() as u32)?;
        for lod in &self.lods {
            lod.write(writer)?;
        }
        Ok(())
    }

    /// Target bone id for each donor bone, matched by name.
    fn bone_remap(&self, donor: &Skeleton) -> Result<Vec<u16>> {
        donor
            .bones
            .iter()
            .map(|bone| match self.skeleton.find_bone_id(&bone.name) {
                -1 => Err(Error::MissingBone { name: bone.name.clone() }),
                id => Ok(id as u16),
            })
            .collect()
    }

    fn import_lods(&mut self, donor: &Self, options: ImportOptions) -> Result<()> {
        self.skeleton.validate_hierarchy()?;
        donor.skeleton.validate_hierarchy()?;
        let bones = bone_lookup(self.bone_remap(&donor.skeleton)?);
        let remap = material_remap(&self.materials, &donor.materials);

        for (i, (lod, donor_lod)) in self.lods.iter_mut().zip(&donor.lods).enumerate() {
            let mut donor_lod = donor_lod.clone();
            for section in &mut donor_lod.sections {
                section.vertex_group.iter_mut().for_each(|id| *id = bones(*id));
            }
            donor_lod.active_bone_ids.iter_mut().for_each(|id| *id = bones(*id));
            donor_lod.required_bone_ids.iter_mut().for_each(|id| *id = bones(*id));

            let before: Vec<u16> = lod.sections.iter().map(|s| s.material_id).collect();
            lod.import_from(&donor_lod)?;
            if options.only_mesh {
                let kept = kept_material_ids(&before, lod.sections.len());
                for (section, id) in lod.sections.iter_mut().zip(kept) {
                    section.material_id = id;
                }
            } else {
                lod.update_material_ids(&remap);
            }
            if !options.keep_kdi {
                lod.remove_kdi();
            }
            lod.regenerate_adjacency()?;
            debug!("LOD{i} imported");
        }
        Ok(())
    }
}

/// Bone lookup closure; ids outside the donor skeleton map to the root.
fn bone_lookup(remap: Vec<u16>) -> impl Fn(u16) -> u16 {
    move |id| remap.get(usize::from(id)).copied().unwrap_or(0)
}

/// The decoded mesh export of a container.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshAsset {
    Static(StaticMesh),
    Skeletal(SkeletalMesh),
}

impl MeshAsset {
    pub fn read<R: Read + Seek>(reader: &mut R, kind: MeshKind) -> Result<Self> {
        Ok(match kind {
            MeshKind::Static => Self::Static(StaticMesh::read(reader)?),
            MeshKind::Skeletal => Self::Skeletal(SkeletalMesh::read(reader)?),
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::Static(mesh) => mesh.write(writer),
            Self::Skeletal(mesh) => mesh.write(writer),
        }
    }

    #[must_use]
    pub fn kind(&self) -> MeshKind {
        match self {
            Self::Static(_) => MeshKind::Static,
            Self::Skeletal(_) => MeshKind::Skeletal,
        }
    }

    #[must_use]
    pub fn materials(&self) -> &[Material] {
        match self {
            Self::Static(mesh) => &mesh.materials,
            Self::Skeletal(mesh) => &mesh.materials,
        }
    }

    #[must_use]
    pub fn skeleton(&self) -> Option<&Skeleton> {
        match self {
            Self::Static(_) => None,
            Self::Skeletal(mesh) => Some(&mesh.skeleton),
        }
    }

    #[must_use]
    pub fn lod_count(&self) -> usize {
        match self {
            Self::Static(mesh) => mesh.lods.len(),
            Self::Skeletal(mesh) => mesh.lods.len(),
        }
    }

    /// Bind material slot and bone names from the package name table.
    pub fn resolve_names(&mut self, names: &NameTable) -> Result<()> {
        let materials = match self {
            Self::Static(mesh) => &mut mesh.materials,
            Self::Skeletal(mesh) => {
                mesh.skeleton.resolve_names(names)?;
                &mut mesh.materials
            }
        };
        for material in materials {
            material.resolve_name(names)?;
        }
        Ok(())
    }

    /// Replace this mesh's LODs with the donor's, LOD by LOD.
    ///
    /// Only LOD indices present in both meshes are touched. Skeletal donors
    /// have their vertex groups mapped onto this skeleton by bone name.
    pub fn import_lods(&mut self, donor: &Self, options: ImportOptions) -> Result<()> {
        info!(
            "Importing {} LODs (target has {}, donor has {})",
            self.lod_count().min(donor.lod_count()),
            self.lod_count(),
            donor.lod_count()
        );
        if donor.lod_count() < self.lod_count() {
            warn!("Donor has fewer LODs than the target; the remaining target LODs keep their geometry");
        }
        match (self, donor) {
            (Self::Static(target), Self::Static(donor)) => target.import_lods(donor, options),
            (Self::Skeletal(target), Self::Skeletal(donor)) => target.import_lods(donor, options),
            (target, donor) => Err(Error::MeshKindMismatch {
                target: target.kind().as_str(),
                donor: donor.kind().as_str(),
            }),
        }
    }

    /// Keep only the first LOD.
    pub fn remove_lods(&mut self) {
        info!("Removing {} LODs", self.lod_count().saturating_sub(1));
        match self {
            Self::Static(mesh) => mesh.lods.truncate(1),
            Self::Skeletal(mesh) => mesh.lods.truncate(1),
        }
    }

    /// Strip the auxiliary (KDI) buffers from every LOD. Static meshes have none.
    pub fn remove_kdi(&mut self) {
        if let Self::Skeletal(mesh) = self {
            for lod in &mut mesh.lods {
                lod.remove_kdi();
            }
        }
    }

    /// Named buffers of one LOD.
    pub fn lod_buffers(&self, index: usize) -> Result<Vec<LodBuffer<'_>>> {
        let count = self.lod_count();
        let out_of_range = || Error::LodIndexOutOfRange { index, count };
        match self {
            Self::Static(mesh) => mesh.lods.get(index).map(StaticLod::buffers).ok_or_else(out_of_range),
            Self::Skeletal(mesh) => mesh.lods.get(index).map(SkeletalLod::buffers).ok_or_else(out_of_range),
        }
    }

    /// Write every buffer's raw bytes to `dir/LOD{i}_{name}.bin`.
    pub fn dump_buffers(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for i in 0..self.lod_count() {
            for buffer in self.lod_buffers(i)? {
                let path = dir.join(format!("LOD{i}_{}.bin", buffer.name));
                fs::write(&path, buffer.buffer.data())?;
                debug!("Dumped {} buffer to {}", buffer.kind.as_str(), path.display());
                written.push(path);
            }
        }
        info!("Dumped {} buffers to {}", written.len(), dir.display());
        Ok(written)
    }

    /// Per-section attribute arrays of one LOD.
    pub fn lod_interchange(&self, index: usize) -> Result<LodInterchange> {
        let count = self.lod_count();
        let out_of_range = || Error::LodIndexOutOfRange { index, count };
        match self {
            Self::Static(mesh) => mesh.lods.get(index).map(StaticLod::interchange).ok_or_else(out_of_range),
            Self::Skeletal(mesh) => mesh.lods.get(index).map(SkeletalLod::interchange).ok_or_else(out_of_range),
        }
    }

    /// Rebuild one LOD's buffers from per-section arrays.
    pub fn rebuild_lod(&mut self, index: usize, sections: &[SectionGeometry]) -> Result<()> {
        let count = self.lod_count();
        let out_of_range = Error::LodIndexOutOfRange { index, count };
        match self {
            Self::Static(mesh) => mesh.lods.get_mut(index).ok_or(out_of_range)?.rebuild_from_interchange(sections),
            Self::Skeletal(mesh) => mesh.lods.get_mut(index).ok_or(out_of_range)?.rebuild_from_interchange(sections),
        }
    }
}
