//! Rename command implementation.

use dialoguer::{theme::ColorfulTheme, Confirm};
use vaultlink_core::config::types::ResolvedConfig;
use vaultlink_core::rename::{RenameError, RenameOptions, RenameProcessor, RenameResult};
use vaultlink_core::templates::TemplateEngine;
use vaultlink_core::vault::VaultFile;
use vaultlink_core::{CancelToken, FileMove};

use super::normalize_note_path;
use super::output::{print_json, print_rename_summary};
use crate::RenameArgs;

pub fn run(rc: &ResolvedConfig, args: RenameArgs) {
    let source = normalize_note_path(rc, &args.source);
    let dest = match (&args.dest, &args.template) {
        (Some(dest), _) => dest.trim_start_matches("./").to_string(),
        (None, Some(template)) => templated_destination(rc, &source, template),
        (None, None) => {
            eprintln!("Error: give a destination path or --template");
            std::process::exit(2);
        }
    };

    let options = RenameOptions {
        dry_run: args.dry_run,
        workers: args.workers.unwrap_or(rc.workers).max(1),
        search: {
            let mut search = rc.search_config();
            search.enabled &= !args.no_search;
            search
        },
        stop_on_error: args.stop_on_error,
        excluded_folders: rc.excluded_folders.clone(),
        ignore: rc.ignore.clone(),
    };
    let mv = FileMove::new(source, dest);

    // Preview and confirm unless the caller already decided
    if !args.dry_run && !args.yes {
        let preview_options = RenameOptions { dry_run: true, ..options.clone() };
        let preview = RenameProcessor::new(&rc.vault_root, preview_options, CancelToken::new());
        let preview = execute(&preview, mv.clone());
        if !args.json {
            print_rename_summary(&preview);
        }
        if !confirm_rename(preview.files_modified) {
            println!("Cancelled.");
            return;
        }
    }

    let processor = RenameProcessor::new(&rc.vault_root, options, CancelToken::new());
    let result = execute(&processor, mv);

    if args.json {
        print_json(&result);
    } else {
        if result.dry_run {
            println!("(dry-run mode - no changes made)");
        }
        print_rename_summary(&result);
    }

    if result.has_errors() {
        std::process::exit(1);
    }
}

fn execute(processor: &RenameProcessor, mv: FileMove) -> RenameResult {
    match processor.rename(mv) {
        Ok(result) => result,
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    }
}

fn templated_destination(rc: &ResolvedConfig, source: &str, template: &str) -> String {
    match VaultFile::load(&rc.vault_root, &rc.vault_root.join(source)) {
        Ok(file) => TemplateEngine::new().destination(template, &file),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_error(e: &RenameError) {
    match e {
        RenameError::SourceNotFound(path) => {
            eprintln!("Error: Source file not found: {}", path.display());
        }
        RenameError::TargetExists(path) => {
            eprintln!("Error: Target file already exists: {}", path.display());
        }
        RenameError::Cancelled(c) => {
            eprintln!("Error: rename stopped: {}", c);
        }
        _ => {
            eprintln!("Error: {}", e);
        }
    }
}

fn confirm_rename(files: usize) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Update links in {} file(s) and rename?", files))
        .default(false)
        .interact()
        .unwrap_or(false)
}
