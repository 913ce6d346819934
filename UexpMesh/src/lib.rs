#![allow(non_snake_case)]
//! # UexpMesh
//!
//! A pure-Rust codec for Unreal Engine 4 cooked mesh assets: the `.uasset`
//! metadata file and its `.uexp` payload, specialised to static and skeletal
//! mesh exports.
//!
//! ## What it does
//!
//! - **Lossless round trips** - every field, known or not, is re-encoded as read
//! - **Typed buffers** - positions, normals, tangents, UVs, skin weights and
//!   indices decode to plain arrays
//! - **LOD import** - replace a mesh's LODs with another mesh's, remapping
//!   materials and bones by name
//! - **Batch verification** - decode and re-encode whole directories in parallel
//!
//! ## Quick Start
//!
//! ```no_run
//! use uexpmesh::prelude::*;
//!
//! let mut target = UexpContainer::load("SK_Hero.uexp")?;
//! let donor = UexpContainer::load("SK_Hero_Edited.uexp")?;
//!
//! target.import_lods(&donor, ImportOptions::new().with_keep_kdi(true))?;
//! target.save("out/SK_Hero.uexp")?;
//! # Ok::<(), uexpmesh::Error>(())
//! ```
//!
//! ### Reading geometry
//!
//! ```no_run
//! use uexpmesh::prelude::*;
//!
//! let container = UexpContainer::load("SM_Rock.uasset")?;
//! let lod0 = container.mesh()?.lod_interchange(0)?;
//! for section in &lod0.sections {
//!     println!("material {}: {} faces", section.material_id, section.face_count());
//! }
//! # Ok::<(), uexpmesh::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `uexpmesh` command-line binary

pub mod batch;
pub mod error;
pub mod formats;
pub mod mesh;
pub mod options;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::formats::cipher::{Cipher, PlainCipher};
    pub use crate::formats::uasset::{Export, ExportKind, NameTable, Uasset};
    pub use crate::formats::uexp::{ContainerState, ExportPayload, UexpContainer};
    pub use crate::mesh::{
        LodInterchange, Material, MeshAsset, MeshKind, SectionGeometry, SkeletalLod, SkeletalMesh,
        Skeleton, StaticLod, StaticMesh,
    };
    pub use crate::options::{ContainerOptions, ImportOptions, KNOWN_EXPORTS};

    pub use crate::batch::{BatchVerifyResult, VerifyOutcome, batch_verify, find_uexp_files, verify_round_trip};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
