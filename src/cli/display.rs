//! Result formatting — spec.md §6's JSON field set (`file`, `type`, `name`,
//! `line`, `end_line`, `score`, `content`), text and `--json` modes, plus
//! `--compact` (omit `content`) and `-l`/`--files-only` (unique paths only).
//! Grounded on the teacher's `cli/display.rs` text/JSON split, trimmed of its
//! reference/audit-mode machinery this spec doesn't have.

use std::path::Path;

use serde_json::json;

use blocksearch::manifest::Manifest;
use blocksearch::searcher::SearchResult;

use super::Cli;

pub(crate) fn print_results(cli: &Cli, results: &[SearchResult]) {
    if cli.is_files_only() {
        print_files_only(results);
        return;
    }
    if cli.is_json() {
        print_json(cli, results);
    } else {
        print_text(cli, results);
    }
}

fn print_files_only(results: &[SearchResult]) {
    let mut seen = std::collections::HashSet::new();
    for result in results {
        if seen.insert(result.block.relative_path.clone()) {
            println!("{}", result.block.relative_path);
        }
    }
}

fn print_text(cli: &Cli, results: &[SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        let block = &result.block;
        println!(
            "{}. {} [{}] {}:{}-{}  (score {:.4})",
            i + 1,
            block.name,
            block.kind,
            block.relative_path,
            block.start_line,
            block.end_line,
            result.score,
        );
        if !cli.is_compact() {
            for line in block.content.lines() {
                println!("    {line}");
            }
            println!();
        }
    }
}

fn print_json(cli: &Cli, results: &[SearchResult]) {
    let items: Vec<_> = results
        .iter()
        .map(|result| {
            let block = &result.block;
            let mut entry = json!({
                "file": block.relative_path,
                "type": block.kind.as_str(),
                "name": block.name,
                "line": block.start_line,
                "end_line": block.end_line,
                "score": result.score,
            });
            if !cli.is_compact() {
                entry["content"] = json!(block.content);
            }
            entry
        })
        .collect();
    match serde_json::to_string_pretty(&items) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize results: {e}"),
    }
}

pub(crate) fn print_status(cli: &Cli, index_root: &Path, manifest: &Manifest, block_count: u64) {
    if cli.is_json() {
        let payload = json!({
            "index_root": index_root,
            "file_count": manifest.files.len(),
            "block_count": block_count,
            "schema_version": manifest.schema_version,
            "model_name": manifest.model_identity.name,
            "model_dimension": manifest.model_identity.dimension,
            "created_at_unix_ns": manifest.created_at_unix_ns,
            "updated_at_unix_ns": manifest.updated_at_unix_ns,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize status: {e}"),
        }
        return;
    }

    println!("index: {}", index_root.display());
    println!("files: {}", manifest.files.len());
    println!("blocks: {block_count}");
    println!("schema version: {}", manifest.schema_version);
    println!(
        "model: {} ({}-dim)",
        manifest.model_identity.name, manifest.model_identity.dimension
    );
}
