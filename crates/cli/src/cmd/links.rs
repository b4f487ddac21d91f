//! Links command implementation.

use std::collections::BTreeSet;

use vaultlink_core::config::types::ResolvedConfig;
use vaultlink_core::export::LinkAnalyzer;

use super::output::{print_json, print_table, LinkRow};
use super::{find_note, load_vault, normalize_note_path};
use crate::LinksArgs;

pub fn run(rc: &ResolvedConfig, args: LinksArgs) {
    let note_path = normalize_note_path(rc, &args.note);
    let (notes, resolver) = load_vault(rc);
    let note = find_note(&notes, &note_path);

    // Every note counts as selected, so "external" only marks broken or ambiguous links
    let selection: BTreeSet<String> = notes.iter().map(|n| n.relative_path.clone()).collect();
    let mut analyzer = LinkAnalyzer::new(resolver, selection);
    if let Some(extensions) = &rc.export.asset_extensions {
        analyzer = analyzer.with_asset_extensions(extensions);
    }
    let analysis = analyzer.analyze_file(note);

    if args.json {
        print_json(&analysis);
        return;
    }

    let rows: Vec<LinkRow> = analysis.links.iter().map(LinkRow::from).collect();
    print_table(&rows, "(no links found)");
    println!();
    println!(
        "-- {} links: {} internal, {} external, {} asset, {} url ({} ambiguous) --",
        analysis.links.len(),
        analysis.internal,
        analysis.external,
        analysis.asset,
        analysis.url,
        analysis.ambiguous,
    );
}
