//! Strongbox - single-file asset archives.
//!
//! This crate provides a unified interface to the Strongbox crates for code
//! that loads game assets from, or packages them into, PAK0 archives.
//!
//! # Crates
//!
//! - [`strongbox_common`] - Common utilities (binary reading, byte scanning)
//! - [`strongbox_pak`] - PAK0 archive reading and writing
//!
//! # Example
//!
//! ```no_run
//! use strongbox::prelude::*;
//!
//! let key = SecretKey::new("night-shift");
//!
//! // Package a directory of assets
//! PakWriter::new(key.clone()).build_from_directory("assets.pak", "assets/")?;
//!
//! // Load one of them back
//! let reader = PakReader::new(key);
//! if reader.file_exists("assets.pak", "textures/office.png")? {
//!     let png = reader.load("assets.pak", "textures/office.png")?;
//!     println!("office.png: {} bytes", png.len());
//! }
//! # Ok::<(), Error>(())
//! ```

// Re-export all sub-crates
pub use strongbox_common as common;
pub use strongbox_pak as pak;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use strongbox_common::BinaryReader;
    pub use strongbox_pak::{Error, PakEntry, PakReader, PakWriter, SecretKey};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
