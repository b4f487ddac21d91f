pub mod backlinks;
pub mod doctor;
pub mod export;
pub mod links;
pub mod output;
pub mod rename;

use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use vaultlink_core::config::loader::{ConfigError, ConfigLoader};
use vaultlink_core::config::types::ResolvedConfig;
use vaultlink_core::links::resolver::clean_path;
use vaultlink_core::links::PathResolver;
use vaultlink_core::vault::{VaultFile, VaultWalker};

/// Load the config, letting `--vault` stand in for a missing config file.
pub fn resolve_config(
    config: Option<&Path>,
    profile: Option<&str>,
    vault: Option<&Path>,
) -> Result<ResolvedConfig, ConfigError> {
    let loaded = ConfigLoader::load(config, profile);
    match (loaded, vault) {
        (Ok(mut rc), Some(root)) => {
            rc.vault_root = root.to_path_buf();
            Ok(rc)
        }
        (Err(ConfigError::NotFound(_)), Some(root)) if config.is_none() => {
            Ok(ResolvedConfig::for_vault(root.to_path_buf()))
        }
        (result, _) => result,
    }
}

pub fn load_config_or_exit(
    config: Option<&Path>,
    profile: Option<&str>,
    vault: Option<&Path>,
) -> ResolvedConfig {
    match resolve_config(config, profile, vault) {
        Ok(rc) => rc,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Every markdown note of the vault plus a resolver over all vault files.
pub fn load_vault(rc: &ResolvedConfig) -> (Vec<VaultFile>, Arc<PathResolver>) {
    let walker = match VaultWalker::with_exclusions(&rc.vault_root, rc.excluded_folders.clone())
        .and_then(|w| w.with_ignore_patterns(&rc.ignore))
    {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error opening vault: {}", e);
            std::process::exit(1);
        }
    };

    let walked = match walker.walk_all() {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error walking vault: {}", e);
            std::process::exit(1);
        }
    };

    let resolver = Arc::new(PathResolver::new(walked.iter().map(|f| f.relative_path.as_str())));
    let mut notes = Vec::new();
    for file in walked.iter().filter(|f| f.is_markdown()) {
        match VaultFile::load(walker.root(), &file.absolute_path) {
            Ok(note) => notes.push(note),
            Err(e) => warn!(file = %file.relative_path, error = %e, "skipping unreadable note"),
        }
    }
    (notes, resolver)
}

/// Vault-relative form of a note argument: strips `./` and the vault root,
/// and adds `.md` when no extension is given.
pub fn normalize_note_path(rc: &ResolvedConfig, note: &str) -> String {
    let path = Path::new(note);
    let relative = path
        .strip_prefix(&rc.vault_root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| note.to_string());
    let relative = relative.replace('\\', "/");
    let mut cleaned = clean_path(&relative).unwrap_or(relative);
    if Path::new(&cleaned).extension().is_none() {
        cleaned.push_str(".md");
    }
    cleaned
}

/// Find a loaded note by its vault-relative path, exiting when absent.
pub fn find_note<'a>(notes: &'a [VaultFile], path: &str) -> &'a VaultFile {
    match notes.iter().find(|n| n.relative_path == path) {
        Some(note) => note,
        None => {
            eprintln!("Note not found in vault: {}", path);
            std::process::exit(1);
        }
    }
}
