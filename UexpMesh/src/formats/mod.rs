//! Container file formats
//!
//! - `uasset`: package header, name table and export table
//! - `uexp`: export payloads, author trailer and the loaded container
//! - `io`: little-endian primitive codec shared by every reader and writer

pub mod cipher;
pub mod io;
pub mod uasset;
pub mod uexp;

pub use uasset::{NameTable, Uasset};
pub use uexp::{ContainerState, ExportPayload, UexpContainer};
