//! Link resolution and rewriting for markdown vaults.
//!
//! The crate keeps wiki-links, markdown links and embeds consistent while
//! files are renamed ([`rename`]) or a subset of the vault is exported to a
//! new root ([`export`]).

#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod config;
pub mod export;
pub mod frontmatter;
pub mod links;
pub mod pool;
pub mod rename;
pub mod templates;
pub mod vault;

pub use cancel::{CancelToken, Cancelled};
pub use links::{FileMove, Link, LinkType, PathResolver};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
