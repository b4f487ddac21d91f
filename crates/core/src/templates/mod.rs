//! Filename templates for generated rename destinations.

pub mod engine;

pub use engine::{RenderContext, TemplateEngine, build_context, render_string, slugify};
