//! Common utilities for Strongbox.
//!
//! This crate provides foundational types used by the archive crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`bytes`] - Byte scanning helpers (NUL search, pattern search)

mod error;
mod reader;

pub mod bytes;

pub use error::{Error, Result};
pub use reader::BinaryReader;
