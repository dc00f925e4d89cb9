//! Command-line front-end — spec.md §6.
//!
//! Thin clap surface over the library: it parses arguments, resolves a
//! target path, loads [`Config`](crate::config::Config), then hands off to
//! `commands`. Mirrors the teacher's `cli/mod.rs` split (flags on a top-level
//! `Cli` struct, subcommands for the non-search verbs, a bare positional for
//! the common case), trimmed to the five verbs spec.md §6 names.

mod commands;
mod display;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bks")]
#[command(about = "Local semantic code search — hybrid BM25 + multi-vector retrieval")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Search query. A query of the form `<file>#<name>` or `<file>:<line>`
    /// runs `find_similar` against that block instead of a text search
    /// (spec.md §6: "CLI surface").
    query: Option<String>,

    /// Directory to search, defaulting to the current directory.
    path: Option<PathBuf>,

    /// Number of results to return. Falls back to the config layer's
    /// `limit`, then `Config::DEFAULT_LIMIT`, when not given.
    #[arg(short = 'n', long = "n")]
    limit: Option<usize>,

    /// Structured JSON output (fields: file, type, name, line, end_line, score, content).
    #[arg(long)]
    json: bool,

    /// Omit `content` from output (text or JSON).
    #[arg(long)]
    compact: bool,

    /// Print only unique file paths, one per line.
    #[arg(short = 'l', long = "files-only")]
    files_only: bool,

    /// Restrict to one file extension (without the dot).
    #[arg(short = 't', long = "ext")]
    extension: Option<String>,

    /// Additional glob patterns to exclude, may be repeated.
    #[arg(long)]
    exclude: Vec<String>,

    /// Skip `text_chunk`/markdown blocks — code blocks only.
    #[arg(long)]
    code_only: bool,

    /// Restrict results to this subdirectory of the index root (scope filter).
    #[arg(long)]
    scope: Option<PathBuf>,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the index rooted at `<path>`.
    Build {
        path: Option<PathBuf>,
        /// Force a full rebuild even if an index already exists.
        #[arg(long)]
        force: bool,
    },
    /// Print index statistics: file_count, block_count, schema_version, model_identity.
    Status { path: Option<PathBuf> },
    /// Delete the index at `<path>`, or the subtree's blocks if below a parent index.
    Clean { path: Option<PathBuf> },
    /// Enumerate every index at or below `<path>`.
    List { path: Option<PathBuf> },
}

pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    run_with(cli)
}

pub fn run_with(cli: Cli) -> Result<i32> {
    match &cli.command {
        Some(Commands::Build { path, force }) => commands::cmd_build(&cli, resolve(path), *force),
        Some(Commands::Status { path }) => commands::cmd_status(&cli, resolve(path)),
        Some(Commands::Clean { path }) => commands::cmd_clean(&cli, resolve(path)),
        Some(Commands::List { path }) => commands::cmd_list(&cli, resolve(path)),
        None => match &cli.query {
            Some(query) => commands::cmd_search(&cli, query, resolve(&cli.path)),
            None => {
                println!("Usage: bks <query> [path] or bks <build|status|clean|list> [path]");
                println!("Run 'bks --help' for more information.");
                Ok(0)
            }
        },
    }
}

fn resolve(path: &Option<PathBuf>) -> PathBuf {
    path.clone().unwrap_or_else(|| PathBuf::from("."))
}

impl Cli {
    /// `-n` wins when given; otherwise the config layer's `limit`, falling
    /// back to [`blocksearch::config::Config::DEFAULT_LIMIT`].
    pub(crate) fn limit(&self, config: &blocksearch::config::Config) -> usize {
        self.limit.unwrap_or_else(|| config.limit_or_default())
    }

    /// `--quiet` ORs with the config layer's `quiet` default — either one
    /// suppresses progress output.
    pub(crate) fn is_quiet(&self, config: &blocksearch::config::Config) -> bool {
        self.quiet || config.quiet_or_default()
    }

    pub(crate) fn is_json(&self) -> bool {
        self.json
    }

    pub(crate) fn is_compact(&self) -> bool {
        self.compact
    }

    pub(crate) fn is_files_only(&self) -> bool {
        self.files_only
    }

    /// `--code-only` ORs with the config layer's `code_only` default.
    pub(crate) fn is_code_only(&self, config: &blocksearch::config::Config) -> bool {
        self.code_only || config.code_only_or_default()
    }

    pub(crate) fn extension_filter(&self) -> Option<String> {
        self.extension.clone()
    }

    pub(crate) fn exclude_globs(&self) -> Vec<String> {
        self.exclude.clone()
    }

    pub(crate) fn scope_path(&self) -> Option<String> {
        self.scope.as_ref().map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ten_results() {
        let cli = Cli::try_parse_from(["bks", "query text"]).unwrap();
        assert_eq!(cli.limit(&blocksearch::config::Config::default()), 10);
        assert_eq!(cli.query.as_deref(), Some("query text"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn build_subcommand_parses() {
        let cli = Cli::try_parse_from(["bks", "build", "/tmp/proj", "--force"]).unwrap();
        match cli.command {
            Some(Commands::Build { path, force }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/proj")));
                assert!(force);
            }
            _ => panic!("expected Build"),
        }
    }

    #[test]
    fn n_flag_overrides_default_limit() {
        let cli = Cli::try_parse_from(["bks", "-n", "25", "authenticate"]).unwrap();
        assert_eq!(cli.limit(&blocksearch::config::Config::default()), 25);
    }
}
