//! Options for loading containers and importing LODs

use std::sync::Arc;

use crate::formats::cipher::{Cipher, PlainCipher};

/// User-data exports that are carried as raw bytes.
pub const KNOWN_EXPORTS: [&str; 3] = [
    "EndEmissiveColorUserData",
    "SQEX_BonamikAssetUserData",
    "SQEX_KineDriver_AssetUserData",
];

/// Options for loading a `.uasset`/`.uexp` pair.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Export names stored opaquely instead of being rejected.
    pub known_exports: Vec<String>,
    /// Encoding of the author tag in the `.uexp` trailer.
    pub cipher: Arc<dyn Cipher>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            known_exports: KNOWN_EXPORTS.iter().map(ToString::to_string).collect(),
            cipher: Arc::new(PlainCipher),
        }
    }
}

impl ContainerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow one more export name to be carried opaquely.
    #[must_use]
    pub fn with_known_export(mut self, name: impl Into<String>) -> Self {
        self.known_exports.push(name.into());
        self
    }

    /// Use a different author tag encoding.
    #[must_use]
    pub fn with_cipher(mut self, cipher: impl Cipher + 'static) -> Self {
        self.cipher = Arc::new(cipher);
        self
    }
}

/// Options for [`MeshAsset::import_lods`](crate::mesh::MeshAsset::import_lods).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Keep each target section's material assignment instead of mapping the
    /// donor's materials by slot name.
    pub only_mesh: bool,
    /// Keep the auxiliary (KDI) buffers, refitted to the new geometry,
    /// instead of stripping them.
    pub keep_kdi: bool,
}

impl ImportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_only_mesh(mut self, only_mesh: bool) -> Self {
        self.only_mesh = only_mesh;
        self
    }

    #[must_use]
    pub fn with_keep_kdi(mut self, keep_kdi: bool) -> Self {
        self.keep_kdi = keep_kdi;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_known_exports() {
        let options = ContainerOptions::new().with_known_export("BodySetup");
        assert_eq!(options.known_exports.len(), 4);
        assert_eq!(options.known_exports[0], "EndEmissiveColorUserData");
        assert_eq!(options.cipher.encrypt("a"), b"a");
    }

    #[test]
    fn test_import_options_builder() {
        let options = ImportOptions::new().with_only_mesh(true).with_keep_kdi(true);
        assert!(options.only_mesh);
        assert!(options.keep_kdi);
        assert_eq!(ImportOptions::default(), ImportOptions { only_mesh: false, keep_kdi: false });
    }
}
