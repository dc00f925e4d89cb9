use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

/// Hard-error exit code (spec.md §8: 0 results found, 1 no results, 2 error).
const EXIT_ERROR: i32 = 2;

fn main() {
    // Parse CLI first to check the verbose flag, so logging is configured
    // before anything else runs.
    let parsed = cli::Cli::parse();

    // Log to stderr to keep stdout clean for structured (`--json`) output.
    let filter = if parsed.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,ort=error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli::run_with(parsed) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}
