//! Vault file discovery and loading.
//!
//! This module provides the directory walker used by every pipeline and the
//! in-memory representation of a markdown file.

pub mod file;
pub mod walker;

pub use file::{VaultFile, VaultFileError};
pub use walker::{VaultWalker, VaultWalkerError, WalkedFile};
