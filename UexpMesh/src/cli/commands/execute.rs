//! Command execution implementations

use super::Commands;
use super::{mesh, verify};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { source } => mesh::info(source),
            Commands::Import {
                target,
                donor,
                output,
                only_mesh,
                keep_kdi,
            } => mesh::import(target, donor, output, *only_mesh, *keep_kdi),
            Commands::RemoveKdi { source, output } => mesh::remove_kdi(source, output),
            Commands::RemoveLods { source, output } => mesh::remove_lods(source, output),
            Commands::Dump {
                source,
                destination,
            } => mesh::dump(source, destination),
            Commands::Embed {
                source,
                author,
                output,
            } => mesh::embed(source, author, output),
            Commands::Verify {
                source,
                known_exports,
                quiet,
            } => verify::verify(source, known_exports, *quiet),
        }
    }
}
