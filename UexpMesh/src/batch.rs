//! Batch round-trip verification
//!
//! Decodes every container under a directory and re-encodes it in memory,
//! checking that both files come back byte-identical. Containers are
//! independent, so they are processed in parallel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::formats::uexp::UexpContainer;
use crate::options::ContainerOptions;

/// Result of a batch verification
#[derive(Debug, Clone)]
pub struct BatchVerifyResult {
    /// Containers that decoded and re-encoded identically
    pub success_count: usize,
    /// Containers that failed to decode or changed on re-encode
    pub fail_count: usize,
    /// One message per container, in input order
    pub results: Vec<String>,
}

/// Outcome of verifying one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Identical,
    UassetChanged,
    UexpChanged,
}

/// Find all `.uexp` files in a directory recursively, sorted.
pub fn find_uexp_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("uexp"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Decode and re-encode one container without touching the disk.
pub fn verify_round_trip(path: &Path, options: &ContainerOptions) -> Result<VerifyOutcome> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?;
    let uasset = fs::read(path.with_extension("uasset"))?;
    let uexp = fs::read(path.with_extension("uexp"))?;

    let mut container = UexpContainer::from_bytes(&uasset, &uexp, &stem, options)?;
    let (uasset_out, uexp_out) = container.to_bytes()?;
    Ok(if uexp_out != uexp {
        VerifyOutcome::UexpChanged
    } else if uasset_out != uasset {
        VerifyOutcome::UassetChanged
    } else {
        VerifyOutcome::Identical
    })
}

/// Verify many containers in parallel.
///
/// `progress` is called once per container with `(current, total, path)`.
pub fn batch_verify<F>(files: &[PathBuf], options: &ContainerOptions, progress: F) -> BatchVerifyResult
where
    F: Fn(usize, usize, &Path) + Send + Sync,
{
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let total = files.len();

    let results: Vec<String> = files
        .par_iter()
        .map(|path| {
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(current, total, path);

            let display_path = path.display();
            match verify_round_trip(path, options) {
                Ok(VerifyOutcome::Identical) => {
                    success_counter.fetch_add(1, Ordering::SeqCst);
                    format!("OK: {display_path}")
                }
                Ok(outcome) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Changed ({outcome:?}): {display_path}")
                }
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Failed {display_path}: {e}")
                }
            }
        })
        .collect();

    BatchVerifyResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        results,
    }
}
