use std::path::Path;

use vaultlink_core::config::loader::default_config_path;

use super::resolve_config;

pub fn run(config: Option<&Path>, profile: Option<&str>, vault: Option<&Path>) {
    let looked_for = config.map_or_else(default_config_path, Path::to_path_buf);

    match resolve_config(config, profile, vault) {
        Ok(rc) => {
            crate::logging::init(&rc);
            println!("OK   vlk doctor");
            if looked_for.exists() {
                println!("path: {}", looked_for.display());
            } else {
                println!("path: (none)");
            }
            println!("profile: {}", rc.active_profile);
            println!("vault_root: {}", rc.vault_root.display());
            let excluded: Vec<String> =
                rc.excluded_folders.iter().map(|p| p.display().to_string()).collect();
            println!("excluded_folders: [{}]", excluded.join(", "));
            println!("ignore: [{}]", rc.ignore.join(", "));
            println!("workers: {}", rc.workers);
            println!("search.enabled: {}", rc.search.enabled);
            println!("search.tool: {}", rc.search.tool);
            println!("search.timeout_secs: {}", rc.search.timeout_secs);
            println!("export.max_backlink_depth: {}", rc.export.max_backlink_depth);
            println!("logging.level: {}", rc.logging.level);
            if !rc.vault_root.is_dir() {
                println!("WARN vault_root is not a directory");
            }
        }
        Err(e) => {
            println!("FAIL vlk doctor");
            println!("{e}");
            if config.is_none() {
                println!("looked for: {}", looked_for.display());
            }
            std::process::exit(1);
        }
    }
}
