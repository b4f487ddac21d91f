//! Backlinks command implementation.

use std::collections::BTreeSet;

use serde::Serialize;
use tabled::Tabled;
use vaultlink_core::config::types::ResolvedConfig;
use vaultlink_core::export::BacklinksHandler;
use vaultlink_core::CancelToken;

use super::output::{print_json, print_table};
use super::{find_note, load_vault, normalize_note_path};
use crate::BacklinksArgs;

#[derive(Serialize)]
struct BacklinksOutput<'a> {
    note: &'a str,
    backlinks: Vec<&'a str>,
    depth_reached: usize,
    depth_exhausted: bool,
}

#[derive(Tabled)]
struct BacklinkRow<'a> {
    #[tabled(rename = "Note")]
    path: &'a str,
}

pub fn run(rc: &ResolvedConfig, args: BacklinksArgs) {
    let note_path = normalize_note_path(rc, &args.note);
    let (notes, resolver) = load_vault(rc);
    find_note(&notes, &note_path);

    let depth = args.depth.unwrap_or(rc.export.max_backlink_depth);
    let handler = BacklinksHandler::new(resolver).with_max_depth(depth);
    let selection = BTreeSet::from([note_path.clone()]);

    let result = match handler.discover(&notes, &selection, &CancelToken::new()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: backlink discovery stopped: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&BacklinksOutput {
            note: &note_path,
            backlinks: result.backlinks.iter().map(String::as_str).collect(),
            depth_reached: result.depth_reached,
            depth_exhausted: result.depth_exhausted,
        });
        return;
    }

    let rows: Vec<BacklinkRow> = result.backlinks.iter().map(|path| BacklinkRow { path }).collect();
    print_table(&rows, "(no backlinks found)");
    println!();
    println!("-- {} notes within {} hop(s) --", rows.len(), result.depth_reached);
    if result.depth_exhausted {
        eprintln!("warning: depth limit {} reached; pass --depth to look further", depth);
    }
}
