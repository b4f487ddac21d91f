//! Export command implementation.

use vaultlink_core::config::types::ResolvedConfig;
use vaultlink_core::export::{ExportError, ExportOptions, Exporter, NormalizeMode, StrategyKind};
use vaultlink_core::CancelToken;

use super::output::{print_export_summary, print_json};
use crate::{ExportArgs, ExternalLinks};

pub fn run(rc: &ResolvedConfig, args: ExportArgs) {
    let options = options_from_args(rc, &args);
    let exporter = Exporter::new(&rc.vault_root, options, CancelToken::new());

    let result = match exporter.run() {
        Ok(result) => result,
        Err(e) => {
            print_error(&e);
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&result);
    } else {
        if result.dry_run {
            println!("(dry-run mode - nothing written)");
            for path in &result.exported_files {
                println!("  {}", path);
            }
        }
        print_export_summary(&result);
    }

    if result.has_errors() {
        std::process::exit(1);
    }
}

fn options_from_args(rc: &ResolvedConfig, args: &ExportArgs) -> ExportOptions {
    let external = match args.external {
        ExternalLinks::Keep => None,
        ExternalLinks::Remove => Some(StrategyKind::Remove),
        ExternalLinks::Url => Some(StrategyKind::Url),
    };
    ExportOptions {
        target: args.target.clone(),
        queries: args.query.clone(),
        include_backlinks: args.backlinks,
        max_backlink_depth: args.max_depth.unwrap_or(rc.export.max_backlink_depth),
        external,
        normalize: NormalizeMode::from_flags(args.slugify, args.flatten),
        copy_assets: !args.no_assets,
        asset_extensions: rc.export.asset_extensions.clone(),
        overwrite: args.overwrite,
        dry_run: args.dry_run,
        workers: args.workers.unwrap_or(rc.workers).max(1),
        excluded_folders: rc.excluded_folders.clone(),
        ignore: rc.ignore.clone(),
    }
}

fn print_error(e: &ExportError) {
    match e {
        ExportError::TargetNotEmpty(path) => {
            eprintln!("Error: target directory is not empty: {}", path.display());
            eprintln!("Hint: pass --overwrite to write into it anyway.");
        }
        ExportError::EmptySelection => {
            eprintln!("Error: the queries matched no notes");
        }
        _ => {
            eprintln!("Error: {}", e);
        }
    }
}
