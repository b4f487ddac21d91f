use std::fs;
use std::path::Path;

use tempfile::TempDir;
use vaultlink_core::rename::{
    CandidateSource, RenameError, RenameOptions, RenameProcessor, RenameResult, SearchConfig,
};
use vaultlink_core::{CancelToken, FileMove};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

fn options() -> RenameOptions {
    RenameOptions {
        search: SearchConfig { enabled: false, ..SearchConfig::default() },
        ..RenameOptions::default()
    }
}

fn processor(vault: &TempDir, options: RenameOptions) -> RenameProcessor {
    RenameProcessor::new(vault.path(), options, CancelToken::new())
}

fn rename(vault: &TempDir, from: &str, to: &str) -> RenameResult {
    processor(vault, options()).rename(FileMove::new(from, to)).unwrap()
}

#[test]
fn moves_folder_path_wiki_link() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "old/note.md", "# Note\n");
    write(vault.path(), "index.md", "See [[old/note]]");

    let result = rename(&vault, "old/note.md", "new/note.md");

    assert_eq!(read(vault.path(), "index.md"), "See [[new/note]]");
    assert!(vault.path().join("new/note.md").exists());
    assert!(!vault.path().join("old/note.md").exists());
    assert_eq!(result.files_modified, 1);
    assert_eq!(result.links_updated, 1);
    assert_eq!(result.candidate_source, CandidateSource::FullScan);
}

#[test]
fn keeps_percent_encoding_of_markdown_links() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "file with spaces.md", "body\n");
    write(vault.path(), "index.md", "[text](file%20with%20spaces.md)");

    rename(&vault, "file with spaces.md", "renamed file.md");

    assert_eq!(read(vault.path(), "index.md"), "[text](renamed%20file.md)");
}

#[test]
fn rewrites_every_link_form_and_leaves_the_rest() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "projects/plan.md", "plan\n");
    write(vault.path(), "other.md", "other\n");
    write(
        vault.path(),
        "daily/today.md",
        "---\nrelated: \"[[plan]]\"\n---\n\
         - [[plan]]\n\
         - [[plan|the plan]]\n\
         - [[plan#Goals]]\n\
         - ![[plan]]\n\
         - [relative](../projects/plan.md)\n\
         - [other](../other.md)\n\
         - [site](https://example.com/plan.md)\n\
         ```\n[[plan]]\n```\n",
    );

    rename(&vault, "projects/plan.md", "projects/roadmap.md");

    insta::assert_snapshot!(read(vault.path(), "daily/today.md"), @r#"
    ---
    related: "[[plan]]"
    ---
    - [[roadmap]]
    - [[roadmap|the plan]]
    - [[roadmap#Goals]]
    - ![[roadmap]]
    - [relative](../projects/roadmap.md)
    - [other](../other.md)
    - [site](https://example.com/plan.md)
    ```
    [[plan]]
    ```
    "#);
}

#[test]
fn dry_run_reports_without_touching_files() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "a.md", "[[b]] and [[b|bee]]\n");
    write(vault.path(), "b.md", "b\n");

    let opts = RenameOptions { dry_run: true, ..options() };
    let result = processor(&vault, opts).rename(FileMove::new("b.md", "c.md")).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.modified_files, vec!["a.md".to_string()]);
    assert_eq!(result.links_updated, 2);
    assert_eq!(read(vault.path(), "a.md"), "[[b]] and [[b|bee]]\n");
    assert!(vault.path().join("b.md").exists());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["source_path"], "b.md");
    assert_eq!(json["target_path"], "c.md");
    assert_eq!(json["candidate_source"], "full_scan");
    assert_eq!(json["errors"], serde_json::json!([]));
}

#[test]
fn batch_moves_update_each_other() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "a.md", "to [[b]]\n");
    write(vault.path(), "b.md", "to [a](a.md)\n");

    let result = processor(&vault, options())
        .rename_batch(vec![FileMove::new("a.md", "x/a.md"), FileMove::new("b.md", "y/b.md")])
        .unwrap();

    // a.md's wiki-link is name-only, so only b.md's text changes
    assert_eq!(result.modified_files, vec!["b.md".to_string()]);
    assert_eq!(read(vault.path(), "x/a.md"), "to [[b]]\n");
    assert_eq!(read(vault.path(), "y/b.md"), "to [a](../x/a.md)\n");
}

#[test]
fn directory_destination_keeps_the_name() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "note.md", "n\n");
    fs::create_dir_all(vault.path().join("archive")).unwrap();

    let result = processor(&vault, options()).rename(FileMove::new("note.md", "archive")).unwrap();

    assert_eq!(result.target_path, "archive/note.md");
    assert!(vault.path().join("archive/note.md").exists());
}

#[test]
fn rejects_missing_source_and_taken_target() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "a.md", "a\n");
    write(vault.path(), "b.md", "b\n");

    let missing = processor(&vault, options()).rename(FileMove::new("nope.md", "x.md"));
    assert!(matches!(missing, Err(RenameError::SourceNotFound(_))));

    let taken = processor(&vault, options()).rename(FileMove::new("a.md", "b.md"));
    assert!(matches!(taken, Err(RenameError::TargetExists(_))));
}

#[test]
fn cancelled_token_stops_the_rename() {
    let vault = TempDir::new().unwrap();
    write(vault.path(), "a.md", "[[b]]\n");
    write(vault.path(), "b.md", "b\n");

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = RenameProcessor::new(vault.path(), options(), cancel)
        .rename(FileMove::new("b.md", "c.md"));

    assert!(matches!(outcome, Err(RenameError::Cancelled(_))));
    assert!(vault.path().join("b.md").exists());
    assert_eq!(read(vault.path(), "a.md"), "[[b]]\n");
}
