use clap::Subcommand;
use std::path::PathBuf;

mod execute;
pub mod mesh;
pub mod verify;

#[derive(Subcommand)]
pub enum Commands {
    /// Show exports, materials, bones and LODs of a mesh asset
    Info {
        /// .uexp or .uasset file
        source: PathBuf,
    },

    /// Replace a mesh's LODs with another mesh's
    Import {
        /// Mesh to edit (.uexp or .uasset)
        target: PathBuf,

        /// Mesh whose LODs are imported
        donor: PathBuf,

        /// Output file (.uexp or .uasset); both files are written
        #[arg(short, long)]
        output: PathBuf,

        /// Keep the target's material assignments
        #[arg(long)]
        only_mesh: bool,

        /// Keep and resize the KDI buffers instead of removing them
        #[arg(long)]
        keep_kdi: bool,
    },

    /// Remove the KDI buffers from a skeletal mesh
    RemoveKdi {
        /// .uexp or .uasset file
        source: PathBuf,

        /// Output file (.uexp or .uasset)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Remove every LOD but the first
    RemoveLods {
        /// .uexp or .uasset file
        source: PathBuf,

        /// Output file (.uexp or .uasset)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write each LOD buffer's raw bytes to a directory
    Dump {
        /// .uexp or .uasset file
        source: PathBuf,

        /// Output directory
        destination: PathBuf,
    },

    /// Embed an author tag in the .uexp trailer
    Embed {
        /// .uexp or .uasset file
        source: PathBuf,

        /// Author tag
        author: String,

        /// Output file (.uexp or .uasset)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode and re-encode every asset under a directory and report changes
    Verify {
        /// Directory to scan for .uexp files
        source: PathBuf,

        /// Extra export names to carry as raw bytes
        #[arg(long = "known-export")]
        known_exports: Vec<String>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}
