//! Link model, extraction, resolution and rewriting.

pub mod encoding;
pub mod extractor;
pub mod resolver;
pub mod splice;
pub mod types;
pub mod updater;

pub use extractor::extract_links;
pub use resolver::{PathResolver, ResolveError};
pub use splice::Splicer;
pub use types::{FileMove, Link, LinkType};
pub use updater::{LinkUpdater, PathStyle, UpdateOutcome, should_update, update_references};
