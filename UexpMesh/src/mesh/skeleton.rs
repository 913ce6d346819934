//! Bone hierarchy of a skeletal mesh

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Mat4, Quat, Vec3};
use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::formats::io::{ReadBinaryExt, WriteBinaryExt, check};
use crate::formats::uasset::NameTable;

/// A bone: name reference, parent index and rest transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name_id: u32,
    pub instance: i32,
    /// Index of the parent bone, `-1` for a root.
    pub parent: i32,
    pub rotation: Quat,
    pub position: Vec3,
    pub scale: Vec3,
    /// Resolved through the name table.
    pub name: String,
}

impl Bone {
    #[must_use]
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Entry of the name-to-index side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneIndexEntry {
    pub name_id: u32,
    pub instance: i32,
    pub index: i32,
}

fn read_record<R: Read>(reader: &mut R) -> Result<(u32, i32, i32)> {
    Ok((
        reader.read_u32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
        reader.read_i32::<LittleEndian>()?,
    ))
}

fn write_record<W: Write>(writer: &mut W, name_id: u32, instance: i32, value: i32) -> Result<()> {
    writer.write_u32::<LittleEndian>(name_id)?;
    writer.write_i32::<LittleEndian>(instance)?;
    writer.write_i32::<LittleEndian>(value)?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
    pub name_to_index: Vec<BoneIndexEntry>,
}

impl Skeleton {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let bone_count = reader.read_u32::<LittleEndian>()?;
        let records = (0..bone_count)
            .map(|_| read_record(reader))
            .collect::<Result<Vec<_>>>()?;

        let offset = reader.pos()?;
        let transform_count = reader.read_u32::<LittleEndian>()?;
        check(offset, "bone transform count", bone_count, transform_count)?;

        let mut bones = Vec::with_capacity(records.len());
        for (name_id, instance, parent) in records {
            let [x, y, z, w] = reader.read_f32_array::<4>()?;
            bones.push(Bone {
                name_id,
                instance,
                parent,
                rotation: Quat::from_xyzw(x, y, z, w),
                position: Vec3::from_array(reader.read_f32_array()?),
                scale: Vec3::from_array(reader.read_f32_array()?),
                name: String::new(),
            });
        }

        let entry_count = reader.read_u32::<LittleEndian>()?;
        let name_to_index = (0..entry_count)
            .map(|_| {
                let (name_id, instance, index) = read_record(reader)?;
                Ok(BoneIndexEntry { name_id, instance, index })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { bones, name_to_index })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.bones.len() as u32)?;
        for bone in &self.bones {
            write_record(writer, bone.name_id, bone.instance, bone.parent)?;
        }
        writer.write_u32::<LittleEndian>(self.bones.len() as u32)?;
        for bone in &self.bones {
            writer.write_f32_slice(&bone.rotation.to_array())?;
            writer.write_f32_slice(&bone.position.to_array())?;
            writer.write_f32_slice(&bone.scale.to_array())?;
        }
        writer.write_u32::<LittleEndian>(self.name_to_index.len() as u32)?;
        for entry in &self.name_to_index {
            write_record(writer, entry.name_id, entry.instance, entry.index)?;
        }
        Ok(())
    }

    pub fn resolve_names(&mut self, names: &NameTable) -> Result<()> {
        for bone in &mut self.bones {
            bone.name = names.get(bone.name_id)?.to_string();
        }
        Ok(())
    }

    /// Index of the bone called `name`, or `-1`.
    #[must_use]
    pub fn find_bone_id(&self, name: &str) -> i32 {
        self.bones
            .iter()
            .position(|b| b.name == name)
            .map_or(-1, |i| i as i32)
    }

    /// Check that every parent index is in range and the hierarchy has no
    /// cycles. Not enforced when decoding.
    pub fn validate_hierarchy(&self) -> Result<()> {
        let count = self.bones.len();
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent < -1 || bone.parent >= count as i32 {
                return Err(Error::InvalidHierarchy {
                    message: format!("bone {i} ('{}') has parent {} out of range", bone.name, bone.parent),
                });
            }
        }
        for start in 0..count {
            let mut current = self.bones[start].parent;
            let mut steps = 0;
            while current >= 0 {
                steps += 1;
                if steps > count {
                    return Err(Error::InvalidHierarchy {
                        message: format!("bone {start} ('{}') is part of a parent cycle", self.bones[start].name),
                    });
                }
                current = self.bones[current as usize].parent;
            }
        }
        Ok(())
    }

    /// Rest pose of every bone in skeleton space.
    pub fn global_transforms(&self) -> Result<Vec<Mat4>> {
        self.validate_hierarchy()?;
        let mut globals: Vec<Option<Mat4>> = vec![None; self.bones.len()];
        for i in 0..self.bones.len() {
            // walk up to the first resolved ancestor, then resolve downwards
            let mut chain = vec![i];
            let mut parent = self.bones[i].parent;
            while parent >= 0 && globals[parent as usize].is_none() {
                chain.push(parent as usize);
                parent = self.bones[parent as usize].parent;
            }
            let mut base = if parent >= 0 { globals[parent as usize].unwrap_or(Mat4::IDENTITY) } else { Mat4::IDENTITY };
            for &bone in chain.iter().rev() {
                base *= self.bones[bone].local_transform();
                globals[bone] = Some(base);
            }
        }
        Ok(globals.into_iter().map(|m| m.unwrap_or(Mat4::IDENTITY)).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::formats::uasset::NameEntry;
    use std::io::Cursor;

    pub(crate) fn bone(name_id: u32, name: &str, parent: i32) -> Bone {
        Bone {
            name_id,
            instance: 0,
            parent,
            rotation: Quat::IDENTITY,
            position: Vec3::new(0.0, 0.0, 1.0),
            scale: Vec3::ONE,
            name: name.to_string(),
        }
    }

    fn chain() -> Skeleton {
        Skeleton {
            bones: vec![bone(1, "root", -1), bone(2, "spine", 0), bone(3, "head", 1)],
            name_to_index: vec![BoneIndexEntry { name_id: 1, instance: 0, index: 0 }],
        }
    }

    #[test]
    fn test_skeleton_round_trip_and_names() {
        let skeleton = chain();
        let mut out = Vec::new();
        skeleton.write(&mut out).unwrap();
        assert_eq!(out.len(), 4 + 3 * 12 + 4 + 3 * 40 + 4 + 12);

        let mut back = Skeleton::read(&mut Cursor::new(out.as_slice())).unwrap();
        assert_eq!(back.find_bone_id("spine"), -1);

        let names = NameTable::new(
            ["None", "root", "spine", "head"]
                .iter()
                .map(|n| NameEntry { name: (*n).to_string(), hash: [0; 4] })
                .collect(),
        );
        back.resolve_names(&names).unwrap();
        assert_eq!(back, skeleton);
        assert_eq!(back.find_bone_id("spine"), 1);
        assert_eq!(back.find_bone_id("tail"), -1);
    }

    #[test]
    fn test_transform_count_must_match() {
        let mut out = Vec::new();
        chain().write(&mut out).unwrap();
        out[40..44].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            Skeleton::read(&mut Cursor::new(out.as_slice())),
            Err(Error::FormatMismatch { offset: 40, .. })
        ));
    }

    #[test]
    fn test_validate_hierarchy() {
        assert!(chain().validate_hierarchy().is_ok());

        let mut out_of_range = chain();
        out_of_range.bones[2].parent = 3;
        assert!(matches!(out_of_range.validate_hierarchy(), Err(Error::InvalidHierarchy { .. })));

        let mut cycle = chain();
        cycle.bones[0].parent = 2;
        assert!(matches!(cycle.validate_hierarchy(), Err(Error::InvalidHierarchy { .. })));
    }

    #[test]
    fn test_global_transforms() {
        let globals = chain().global_transforms().unwrap();
        let head = globals[2].transform_point3(Vec3::ZERO);
        assert!((head - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-6);
    }
}
