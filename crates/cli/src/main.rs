mod cmd;
mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use vaultlink_core::config::types::ResolvedConfig;

#[derive(Debug, Parser)]
#[command(
    name = "vlk",
    version,
    about = "Rename and export markdown vaults without breaking links"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    profile: Option<String>,

    /// Vault root; overrides the profile and works without a config file
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate configuration and print resolved settings
    Doctor,

    /// Rename or move a note and update every link to it
    Rename(RenameArgs),

    /// Export selected notes to another directory
    Export(ExportArgs),

    /// Show the outgoing links of a note and what they resolve to
    Links(LinksArgs),

    /// Show notes that link to a note, directly or transitively
    Backlinks(BacklinksArgs),
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Note to rename (vault-relative)
    pub source: String,

    /// New path (vault-relative); a directory keeps the file name
    pub dest: Option<String>,

    /// Build the new file name from a template, e.g. "{{title | slugify}}"
    #[arg(long, conflicts_with = "dest")]
    pub template: Option<String>,

    /// Show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    #[arg(long)]
    pub workers: Option<usize>,

    /// Scan every note instead of pre-filtering with the search tool
    #[arg(long)]
    pub no_search: bool,

    /// Abort on the first file that cannot be processed
    #[arg(long)]
    pub stop_on_error: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExternalLinks {
    /// Leave links to notes outside the export as they are
    Keep,
    /// Replace them with their text
    Remove,
    /// Point them at the note's `url` frontmatter field
    Url,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Directory to export into
    pub target: PathBuf,

    /// Selection query (repeatable): path:<glob>, tag:<tag>, field=value, or a glob
    #[arg(long, short = 'q')]
    pub query: Vec<String>,

    /// Also export notes linking into the selection
    #[arg(long)]
    pub backlinks: bool,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long, value_enum, default_value_t = ExternalLinks::Keep)]
    pub external: ExternalLinks,

    /// Slugify file names
    #[arg(long)]
    pub slugify: bool,

    /// Put every note at the export root
    #[arg(long)]
    pub flatten: bool,

    /// Do not copy attachments
    #[arg(long)]
    pub no_assets: bool,

    /// Write into a non-empty target directory
    #[arg(long)]
    pub overwrite: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinksArgs {
    /// Note path (vault-relative)
    pub note: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BacklinksArgs {
    /// Note path (vault-relative)
    pub note: String,

    /// Maximum number of hops (defaults to the configured depth)
    #[arg(long)]
    pub depth: Option<usize>,

    #[arg(long)]
    pub json: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let profile = cli.profile.as_deref();
    let vault = cli.vault.as_deref();

    match cli.command {
        Commands::Doctor => cmd::doctor::run(config, profile, vault),
        Commands::Rename(args) => cmd::rename::run(&setup(config, profile, vault), args),
        Commands::Export(args) => cmd::export::run(&setup(config, profile, vault), args),
        Commands::Links(args) => cmd::links::run(&setup(config, profile, vault), args),
        Commands::Backlinks(args) => cmd::backlinks::run(&setup(config, profile, vault), args),
    }
}

/// Resolve configuration and start logging, exiting on config errors.
fn setup(config: Option<&Path>, profile: Option<&str>, vault: Option<&Path>) -> ResolvedConfig {
    let rc = cmd::load_config_or_exit(config, profile, vault);
    logging::init(&rc);
    rc
}
