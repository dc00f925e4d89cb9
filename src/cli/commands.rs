//! Command implementations — spec.md §6, §7.
//!
//! Every command resolves the config layer, then delegates straight to the
//! library types (`Indexer`, `Searcher`, `locator`). Error → exit code
//! mapping follows spec.md §8: structural errors (`IndexMissing`,
//! `ParentIndexExists`, ...) short-circuit with exit 2; `search`'s own
//! "no results" case is exit 1, success is exit 0.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use blocksearch::config::Config;
use blocksearch::embedder::Embedder;
use blocksearch::error::CoreError;
use blocksearch::locator;
use blocksearch::manifest::Manifest;
use blocksearch::progress::{Phase, ProgressSink};
use blocksearch::searcher::{SearchRequest, Searcher};
use blocksearch::store::{QueryOptions, Store};
use blocksearch::walker::WalkConfig;
use blocksearch::{Indexer, INDEX_DIR};

use super::display;
use super::Cli;

/// Env var opting `search` into auto-building a missing index (spec.md §6).
const AUTO_BUILD_ENV: &str = "BKS_AUTO_BUILD";

pub(crate) fn cmd_build(cli: &Cli, path: PathBuf, force: bool) -> Result<i32> {
    let root = canonical_dir(&path)?;
    let config = Config::load(&root);
    let indexer = build_indexer(&root, cli, &config)?;

    if force && locator::has_own_index(&root) {
        std::fs::remove_dir_all(root.join(INDEX_DIR)).context("failed to remove existing index for rebuild")?;
    }

    let quiet = cli.is_quiet(&config);
    let progress = CliProgress::new(quiet);
    let summary = indexer.build(&progress).map_err(map_core_error)?;
    progress.finish();

    if !quiet {
        println!(
            "indexed {} blocks across {} files ({} skipped, {} removed, {} subordinate indexes merged)",
            summary.blocks_indexed,
            summary.files_indexed,
            summary.files_skipped,
            summary.files_removed,
            summary.merged_subordinates
        );
    }
    Ok(0)
}

pub(crate) fn cmd_status(cli: &Cli, path: PathBuf) -> Result<i32> {
    let root = canonical_dir(&path)?;
    let index_root = locator::find_governing_index(&root)
        .ok_or_else(|| anyhow::Error::from(CoreError::IndexMissing(root.clone())))?;

    let manifest = Manifest::load(&index_root.join(INDEX_DIR).join("manifest.json"))
        .context("failed to read manifest")?;
    let store = Store::open(&index_root.join(INDEX_DIR).join("index.db")).context("failed to open store")?;
    let block_count = store.count().context("failed to count blocks")?;

    display::print_status(cli, &index_root, &manifest, block_count);
    Ok(0)
}

pub(crate) fn cmd_clean(cli: &Cli, path: PathBuf) -> Result<i32> {
    let root = canonical_dir(&path)?;
    let config = Config::load(&root);
    let index_root = locator::find_governing_index(&root)
        .ok_or_else(|| anyhow::Error::from(CoreError::IndexMissing(root.clone())))?;

    if index_root == root {
        std::fs::remove_dir_all(root.join(INDEX_DIR)).context("failed to remove index directory")?;
        if !cli.is_quiet(&config) {
            println!("removed index at {}", root.display());
        }
        return Ok(0);
    }

    // `root` is a subtree of a parent-owned index: drop only its blocks
    // (spec.md §6: `clean` below a governing index removes that subtree's
    // blocks only, leaving the rest of the index intact).
    let manifest_path = index_root.join(INDEX_DIR).join("manifest.json");
    let mut manifest = Manifest::load(&manifest_path).context("failed to read manifest")?;
    let store = Store::open(&index_root.join(INDEX_DIR).join("index.db")).context("failed to open store")?;

    let prefix = root
        .strip_prefix(&index_root)
        .unwrap_or(&root)
        .to_string_lossy()
        .replace('\\', "/");

    let affected: Vec<String> = manifest
        .files
        .keys()
        .filter(|p| *p == &prefix || p.starts_with(&format!("{prefix}/")))
        .cloned()
        .collect();

    let now = now_unix_ns();
    let mut removed_blocks = 0usize;
    for relative_path in &affected {
        if let Some(record) = manifest.remove_file(relative_path, now) {
            for id in &record.block_ids {
                store.delete(id)?;
            }
            removed_blocks += record.block_ids.len();
        }
    }
    manifest.save(&manifest_path)?;
    store.flush()?;

    if !cli.is_quiet(&config) {
        println!(
            "removed {} files ({} blocks) under {} from index at {}",
            affected.len(),
            removed_blocks,
            prefix,
            index_root.display()
        );
    }
    Ok(0)
}

pub(crate) fn cmd_list(_cli: &Cli, path: PathBuf) -> Result<i32> {
    let root = canonical_dir(&path)?;
    let mut roots = Vec::new();
    if locator::has_own_index(&root) {
        roots.push(root.clone());
    }
    roots.extend(locator::find_subordinate_indexes(&root));

    if roots.is_empty() {
        println!("no indexes found at or below {}", root.display());
        return Ok(1);
    }
    for r in &roots {
        match Manifest::load(&r.join(INDEX_DIR).join("manifest.json")) {
            Ok(m) => println!("{}  ({} files)", r.display(), m.files.len()),
            Err(_) => println!("{}  (manifest unreadable)", r.display()),
        }
    }
    Ok(0)
}

pub(crate) fn cmd_search(cli: &Cli, query: &str, path: PathBuf) -> Result<i32> {
    let root = canonical_dir(&path)?;
    let config = Config::load(&root);

    let index_root = match locator::find_governing_index(&root) {
        Some(r) => r,
        None => {
            if std::env::var(AUTO_BUILD_ENV).map(|v| v == "1").unwrap_or(false) {
                let indexer = build_indexer(&root, cli, &config)?;
                let progress = CliProgress::new(cli.is_quiet(&config));
                indexer.build(&progress).map_err(map_core_error)?;
                progress.finish();
                root.clone()
            } else {
                return Err(map_core_error(CoreError::IndexMissing(root.clone())));
            }
        }
    };

    // Freshness: every search re-indexes changed files first (spec.md §4.7
    // step 2), scoped at the governing index's own root. Built from the
    // persisted config only; folding in this query's `-t`/`--exclude` would
    // make the walk miss files and the update treat them as removed.
    let indexer = build_indexer_for_freshness(&index_root, &config)?;
    indexer.update(&blocksearch::progress::NoopProgress).map_err(map_core_error)?;

    let store = Store::open(&index_root.join(INDEX_DIR).join("index.db")).context("failed to open store")?;
    let manifest = Manifest::load(&index_root.join(INDEX_DIR).join("manifest.json"))?;

    let model_dir = resolve_model_dir(&config);
    let mut embedder = Embedder::load(
        &model_dir,
        &manifest.model_identity.name,
        manifest.model_identity.dimension,
        blocksearch::DEFAULT_MODEL_MAX_SEQ_LEN,
    )
    .context("failed to load embedder")?;

    let searcher = Searcher::new(&store);

    let scope_prefix = cli.scope_path().or_else(|| {
        if root == index_root {
            None
        } else {
            Some(
                root.strip_prefix(&index_root)
                    .unwrap_or(&root)
                    .to_string_lossy()
                    .replace('\\', "/"),
            )
        }
    });

    let mut results = if let Some((file_ref, block_locator)) = parse_block_reference(query) {
        let matched = locate_block(&store, &file_ref, &block_locator)?;
        searcher.find_similar(&matched, cli.limit(&config)).map_err(map_core_error)?
    } else {
        let request = SearchRequest {
            query: query.to_string(),
            limit: cli.limit(&config),
            scope_prefix,
            kind: None,
        };
        searcher.search(&request, &mut embedder).map_err(map_core_error)?
    };

    if cli.is_code_only(&config) {
        results.retain(|r| !r.block.language.is_prose());
    }
    if let Some(ext) = cli.extension_filter() {
        results.retain(|r| r.block.relative_path.ends_with(&format!(".{ext}")));
    }

    if results.is_empty() {
        if !cli.is_quiet(&config) {
            println!("no results found for {query:?}");
        }
        return Ok(1);
    }

    display::print_results(cli, &results);
    Ok(0)
}

fn build_indexer(root: &Path, cli: &Cli, config: &Config) -> Result<Indexer> {
    let mut walk_config = WalkConfig::default();
    if let Some(ext) = cli
        .extension_filter()
        .or_else(|| config.extensions.as_ref().and_then(|v| v.first().cloned()))
    {
        walk_config.extensions.push(ext);
    }
    walk_config.exclude_globs = config.exclude_globs();
    walk_config.exclude_globs.extend(cli.exclude_globs());

    indexer_from_walk_config(root, walk_config, config)
}

/// Builds the indexer used for the pre-search freshness pass, scoped by
/// persisted `Config` alone, no per-query CLI filters, so the walk it
/// re-indexes against always matches what the manifest was built from.
fn build_indexer_for_freshness(root: &Path, config: &Config) -> Result<Indexer> {
    let mut walk_config = WalkConfig::default();
    if let Some(ext) = config.extensions.as_ref().and_then(|v| v.first().cloned()) {
        walk_config.extensions.push(ext);
    }
    walk_config.exclude_globs = config.exclude_globs();

    indexer_from_walk_config(root, walk_config, config)
}

fn indexer_from_walk_config(root: &Path, walk_config: WalkConfig, config: &Config) -> Result<Indexer> {
    let model_dir = resolve_model_dir(config);
    Indexer::new(
        root,
        walk_config,
        model_dir,
        blocksearch::DEFAULT_MODEL_NAME.to_string(),
        blocksearch::DEFAULT_MODEL_DIM,
        blocksearch::DEFAULT_MODEL_MAX_SEQ_LEN,
    )
    .map_err(map_core_error)
}

fn resolve_model_dir(config: &Config) -> PathBuf {
    config.model_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("bks/models")
            .join(blocksearch::DEFAULT_MODEL_NAME)
    })
}

fn canonical_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(map_core_error(CoreError::PathNotFound(path.to_path_buf())));
    }
    if !path.is_dir() {
        return Err(map_core_error(CoreError::PathNotADirectory(path.to_path_buf())));
    }
    Ok(dunce::canonicalize(path)?)
}

fn map_core_error(err: CoreError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

fn now_unix_ns() -> i128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

/// Distinguishes `find_similar` queries (`file#name` or `file:line`) from
/// ordinary text queries (spec.md §6).
enum BlockLocator {
    ByName(String),
    ByLine(u32),
}

fn parse_block_reference(query: &str) -> Option<(String, BlockLocator)> {
    if let Some((file, name)) = query.split_once('#') {
        if !file.is_empty() && !name.is_empty() {
            return Some((file.to_string(), BlockLocator::ByName(name.to_string())));
        }
    }
    if let Some((file, line)) = query.rsplit_once(':') {
        if let Ok(line) = line.parse::<u32>() {
            if !file.is_empty() {
                return Some((file.to_string(), BlockLocator::ByLine(line)));
            }
        }
    }
    None
}

fn locate_block(store: &Store, relative_path: &str, block_locator: &BlockLocator) -> Result<blocksearch::Block> {
    let candidates = store.list_blocks(&QueryOptions {
        scope_prefix: Some(relative_path.to_string()),
        limit: 0,
        ..Default::default()
    })?;
    let mut in_file = candidates.into_iter().filter(|h| h.block.relative_path == relative_path);

    let found = match block_locator {
        BlockLocator::ByName(name) => in_file.find(|h| &h.block.name == name),
        BlockLocator::ByLine(line) => in_file.find(|h| h.block.start_line <= *line && *line <= h.block.end_line),
    };

    found
        .map(|h| h.block)
        .ok_or_else(|| anyhow::anyhow!("no block found at {relative_path} matching the given reference"))
}

/// Wraps an `indicatif::ProgressBar`, hidden under `--quiet` (spec.md §6).
/// Grounded on the teacher's `cli/pipeline.rs` writer-stage bar: a 40-char
/// template, falling back to the default style if the template string ever
/// fails to parse.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        let bar = if quiet { ProgressBar::hidden() } else { ProgressBar::new(0) };
        if !quiet {
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {msg}")
                    .unwrap_or_else(|e| {
                        tracing::warn!("progress template error: {e}, using default");
                        ProgressStyle::default_bar()
                    }),
            );
        }
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for CliProgress {
    fn on_progress(&self, phase: Phase, current: usize, total: usize) {
        self.bar.set_length(total.max(1) as u64);
        self.bar.set_position(current.min(total) as u64);
        self.bar.set_message(phase.label());
    }
}
