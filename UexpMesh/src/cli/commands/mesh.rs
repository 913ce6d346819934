//! CLI commands for single mesh assets

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{Stage, print_done, print_stage};
use crate::formats::uexp::{ExportPayload, UexpContainer};
use crate::mesh::MeshAsset;
use crate::options::ImportOptions;

/// Show the structure of a mesh asset.
pub fn info(source: &Path) -> anyhow::Result<()> {
    let container = UexpContainer::load(source)?;
    let uasset = container.uasset();

    println!("Asset: {}", source.display());
    println!("Names: {}", uasset.names.len());
    println!();

    println!("Exports ({}):", uasset.exports.len());
    for (export, payload) in uasset.exports.iter().zip(container.payloads()) {
        let kind = match payload {
            ExportPayload::Opaque(_) => "opaque".to_string(),
            ExportPayload::Mesh { asset, .. } => format!("{} mesh", asset.kind()),
        };
        println!("  {:32} {:>10} bytes  @ {:<10} {kind}", export.name, export.size, export.offset);
    }

    let Ok(mesh) = container.mesh() else {
        println!();
        println!("No mesh export");
        return Ok(());
    };

    println!();
    println!("Materials ({}):", mesh.materials().len());
    for (i, material) in mesh.materials().iter().enumerate() {
        println!("  [{i}] {}", material.slot_name);
    }
    if let Some(skeleton) = mesh.skeleton() {
        println!();
        println!("Skeleton: {} bones", skeleton.bones.len());
    }

    println!();
    println!("LODs ({}):", mesh.lod_count());
    match mesh {
        MeshAsset::Static(mesh) => {
            for (i, lod) in mesh.lods.iter().enumerate() {
                println!(
                    "  LOD{i}: {} sections, {} vertices, {} faces, {} uv maps",
                    lod.sections.len(),
                    lod.vertex_count(),
                    lod.face_count(),
                    lod.uv_count()
                );
            }
        }
        MeshAsset::Skeletal(mesh) => {
            for (i, lod) in mesh.lods.iter().enumerate() {
                println!(
                    "  LOD{i}: {} sections, {} vertices, {} faces, {} uv maps, {} KDI entries",
                    lod.sections.len(),
                    lod.vertex_count(),
                    lod.face_count(),
                    lod.uv_count,
                    lod.kdi_entry_count()
                );
            }
        }
    }

    let author = container.author();
    if !author.is_empty() {
        println!();
        println!("Author: {author}");
    }
    Ok(())
}

/// Import the donor's LODs into the target and save the result.
pub fn import(target: &Path, donor: &Path, output: &Path, only_mesh: bool, keep_kdi: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    print_stage(1, 3, Stage::Load, "Loading target and donor...");
    let mut container = UexpContainer::load(target)?;
    let donor = UexpContainer::load(donor)?;

    print_stage(2, 3, Stage::Import, "Importing LODs...");
    let options = ImportOptions::new().with_only_mesh(only_mesh).with_keep_kdi(keep_kdi);
    container.import_lods(&donor, options)?;

    print_stage(3, 3, Stage::Save, &format!("Saving {}...", output.display()));
    container.save(output)?;
    print_done(start.elapsed(), None);
    Ok(())
}

pub fn remove_kdi(source: &Path, output: &Path) -> anyhow::Result<()> {
    let mut container = UexpContainer::load(source)?;
    container.remove_kdi()?;
    container.save(output)?;
    println!("Removed KDI buffers: {}", output.display());
    Ok(())
}

pub fn remove_lods(source: &Path, output: &Path) -> anyhow::Result<()> {
    let mut container = UexpContainer::load(source)?;
    let before = container.mesh()?.lod_count();
    container.remove_lods()?;
    container.save(output)?;
    println!("Removed {} LODs: {}", before.saturating_sub(1), output.display());
    Ok(())
}

/// Dump every LOD buffer to `destination`.
pub fn dump(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let container = UexpContainer::load(source)?;
    let written = container.dump_buffers(destination)?;
    for path in &written {
        println!("  {}", path.display());
    }
    println!("Dumped {} buffers to {}", written.len(), destination.display());
    Ok(())
}

pub fn embed(source: &Path, author: &str, output: &Path) -> anyhow::Result<()> {
    let mut container = UexpContainer::load(source)?;
    container.embed_author(author);
    container.save(output)?;
    println!("Embedded author tag ({} bytes): {}", container.author_bytes().len(), output.display());
    Ok(())
}
