//! Error types for `UexpMesh`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `UexpMesh` operations.
///
/// Every variant is fatal for the asset being processed: the container format
/// carries no redundancy, so a failed check means the file is not what this
/// decoder understands. Callers processing many assets decide whether to
/// halt the batch or skip the asset.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations (including truncated streams).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Invalid file path or extension.
    #[error("invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    // ==================== Format Errors ====================
    /// An expected-constant check failed (reserved region, stride/count
    /// disagreement, unknown variant selector).
    #[error("format mismatch at offset {offset}: {what} (expected {expected}, found {actual})")]
    FormatMismatch {
        /// Stream position where the check failed.
        offset: u64,
        /// What was being checked.
        what: &'static str,
        /// The expected value.
        expected: String,
        /// The value found in the stream.
        actual: String,
    },

    /// The file does not start with the package signature.
    #[error("invalid package magic: expected C1 83 2A 9E, found {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// The package version is not supported.
    #[error("unsupported package version: {version} (supported: 6)")]
    UnsupportedVersion {
        /// The decoded version number.
        version: i32,
    },

    /// An export name is neither allow-listed nor the asset's own name.
    #[error("unsupported asset export: {name}")]
    UnsupportedAsset {
        /// The export's resolved name.
        name: String,
    },

    /// A detectable but deliberately unsupported buffer layout.
    #[error("unsupported feature at offset {offset}: {feature}")]
    UnsupportedFeature {
        /// Stream position of the flag that selected the feature.
        offset: u64,
        /// Description of the feature.
        feature: &'static str,
    },

    /// The payload file and the export table disagree on layout.
    #[error("offset mismatch for export '{export}': table says {expected}, payload is at {actual}")]
    OffsetMismatch {
        /// The export's resolved name.
        export: String,
        /// Offset recorded in the export table.
        expected: u64,
        /// Actual position in the payload (plus the metadata file length).
        actual: u64,
    },

    /// A name-table index points past the end of the table.
    #[error("invalid name index: {0}")]
    InvalidNameIndex(u32),

    // ==================== Mesh Errors ====================
    /// The asset's export is neither a static nor a skeletal mesh.
    #[error("no mesh class found in name table")]
    UnknownMeshKind,

    /// Static and skeletal meshes can't be mixed during import.
    #[error("can't import a {donor} mesh into a {target} mesh")]
    MeshKindMismatch {
        /// Kind of the mesh being edited.
        target: &'static str,
        /// Kind of the donor mesh.
        donor: &'static str,
    },

    /// The container has no structurally decoded mesh export.
    #[error("container has no mesh export")]
    NoMeshExport,

    /// A donor bone has no counterpart in the target skeleton.
    #[error("bone '{name}' not found in target skeleton")]
    MissingBone {
        /// The donor bone's name.
        name: String,
    },

    /// A LOD index past the end of the mesh's LOD list.
    #[error("LOD index {index} out of range (mesh has {count} LODs)")]
    LodIndexOutOfRange {
        /// Requested LOD index.
        index: usize,
        /// Number of LODs in the mesh.
        count: usize,
    },

    /// Interchange arrays are inconsistent with each other.
    #[error("invalid interchange data: {message}")]
    InvalidInterchange {
        /// Description of what is invalid.
        message: String,
    },

    /// The bone hierarchy has an out-of-range parent or a cycle.
    #[error("invalid bone hierarchy: {message}")]
    InvalidHierarchy {
        /// Description of what is invalid.
        message: String,
    },
}

impl Error {
    /// Build a [`Error::FormatMismatch`] from any two debug-printable values.
    pub fn mismatch(
        offset: u64,
        what: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Error::FormatMismatch {
            offset,
            what,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

/// A specialized Result type for `UexpMesh` operations.
pub type Result<T> = std::result::Result<T, Error>;
