//! Batch round-trip verification command

use std::path::Path;
use std::time::Instant;

use crate::batch::{batch_verify, find_uexp_files};
use crate::cli::progress::{Stage, advance, container_bar, print_done, print_stage};
use crate::options::ContainerOptions;

/// Verify that every asset under `source` re-encodes byte-identically.
pub fn verify(source: &Path, known_exports: &[String], quiet: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    let options = known_exports
        .iter()
        .fold(ContainerOptions::new(), |options, name| options.with_known_export(name.as_str()));

    if !quiet {
        print_stage(1, 2, Stage::Scan, "Scanning for .uexp files...");
    }
    let files = find_uexp_files(source);
    if files.is_empty() {
        println!("No .uexp files found in {}", source.display());
        return Ok(());
    }

    if !quiet {
        print_stage(2, 2, Stage::Verify, &format!("Verifying {} assets...", files.len()));
    }
    let bar = (!quiet).then(|| container_bar(files.len() as u64));
    let result = batch_verify(&files, &options, |_, _, path| {
        if let Some(bar) = &bar {
            advance(bar, path);
        }
    });
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    for line in result.results.iter().filter(|line| !line.starts_with("OK")) {
        println!("  {line}");
    }
    let summary = format!("{} identical, {} failed", result.success_count, result.fail_count);
    if quiet {
        println!("{summary}");
    } else {
        print_done(start.elapsed(), Some(&summary));
    }

    if result.fail_count > 0 {
        anyhow::bail!("{} assets did not round-trip", result.fail_count);
    }
    Ok(())
}
