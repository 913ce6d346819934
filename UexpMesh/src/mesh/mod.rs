//! Mesh export payloads
//!
//! A mesh export is a material list, a skeleton for skeletal meshes, and a
//! list of LODs. Each LOD is a set of typed vertex and index buffers plus the
//! sections that partition them.

mod asset;
pub mod buffer;
pub mod interchange;
pub mod lod;
pub mod material;
pub mod section;
pub mod skeleton;

pub use asset::{MeshAsset, MeshKind, SkeletalMesh, StaticMesh};
pub use interchange::{LodInterchange, SectionGeometry};
pub use lod::{KdiBuffers, SkeletalLod, StaticLod};
pub use material::{Material, material_remap};
pub use section::{SkeletalSection, StaticSection};
pub use skeleton::{Bone, BoneIndexEntry, Skeleton};
