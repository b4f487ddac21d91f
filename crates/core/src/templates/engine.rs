use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Local;
use regex::Regex;

use crate::links::resolver::{extension, join, parent_dir};
use crate::vault::VaultFile;

pub type RenderContext = HashMap<String, String>;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("valid placeholder regex"));

/// Expands `{{...}}` placeholders against a file to produce new file names.
///
/// Variables:
/// - any scalar frontmatter field: `{{title}}`
/// - `{{filename}}`: current name without extension
/// - `{{date}}`: today, `{{modified}}`: last modification date (`%Y-%m-%d`)
/// - `{{dir}}`: current directory, `{{ext}}`: current extension
///
/// Filters chain left to right: `{{title | slugify | upper}}`.
#[derive(Debug, Default, Clone)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Render `template` for `file`. Unknown variables are left as written.
    pub fn process(&self, template: &str, file: &VaultFile) -> String {
        render_string(template, &build_context(file))
    }

    /// Vault-relative destination for `file`. A rendered name without a
    /// directory stays next to the source; the source extension is added when
    /// the result has none.
    pub fn destination(&self, template: &str, file: &VaultFile) -> String {
        let rendered = self.process(template, file);
        let rendered = rendered.trim().trim_start_matches('/');
        let mut path = if rendered.contains('/') {
            rendered.to_string()
        } else {
            join(parent_dir(&file.relative_path), rendered)
        };
        if extension(&path).is_none()
            && let Some(ext) = extension(&file.relative_path)
        {
            path = format!("{path}.{ext}");
        }
        path
    }
}

/// Variables available to a template for one file.
pub fn build_context(file: &VaultFile) -> RenderContext {
    let mut ctx = RenderContext::new();

    if let Some(fm) = &file.frontmatter {
        for key in fm.fields.keys().filter_map(serde_yaml::Value::as_str) {
            if let Some(value) = fm.get_display(key) {
                ctx.insert(key.to_string(), value);
            }
        }
    }

    ctx.insert("filename".into(), file.stem().to_string());
    ctx.insert("dir".into(), parent_dir(&file.relative_path).to_string());
    ctx.insert("ext".into(), extension(&file.relative_path).unwrap_or_default());
    ctx.insert("date".into(), Local::now().format("%Y-%m-%d").to_string());
    ctx.insert("modified".into(), file.modified.format("%Y-%m-%d").to_string());

    ctx
}

/// Render a string template with variable substitution and filters.
pub fn render_string(template: &str, ctx: &RenderContext) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let mut parts = caps[1].split('|').map(str::trim);
            let var_name = parts.next().unwrap_or_default();

            match ctx.get(var_name) {
                Some(value) => parts.fold(value.clone(), |acc, filter| apply_filter(&acc, filter)),
                // Variable not found, keep the placeholder
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn apply_filter(value: &str, filter: &str) -> String {
    match filter {
        "slugify" => slugify(value),
        "lowercase" | "lower" => value.to_lowercase(),
        "uppercase" | "upper" => value.to_uppercase(),
        "trim" => value.trim().to_string(),
        _ => value.to_string(),
    }
}

/// Convert a string to a file-name-safe slug.
///
/// - Converts to lowercase
/// - Replaces spaces and underscores with hyphens
/// - Drops everything except letters, digits, hyphens and dots
/// - Collapses multiple hyphens into one
/// - Trims leading/trailing hyphens
pub fn slugify(s: &str) -> String {
    let mut result = String::with_capacity(s.len());

    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '.' {
            result.push(c);
        } else if (c == ' ' || c == '_' || c == '-') && !result.ends_with('-') {
            result.push('-');
        }
    }

    result.trim_matches('-').to_string()
}
