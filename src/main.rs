//! sqlite-ingest CLI entry point.

mod cli;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use sqlite_ingest::convert::{ExitCode, FileConverter, RunContext, UrlConverter};
use sqlite_ingest::sqlite::Destination;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let destination = Destination::open(&args.output)
        .with_context(|| format!("Failed to open output database: {}", args.output.display()))?;
    let mut ctx = if args.no_source_info {
        RunContext::new(&destination)
    } else {
        RunContext::with_source_info_table(&destination)
            .context("Failed to prepare the source info table")?
    };

    let options = args.convert_options();
    let exit_code = match &args.command {
        Command::File {
            paths, recursive, ..
        } => {
            let converter = FileConverter::new(options);
            for path in expand_paths(paths, *recursive) {
                converter.convert(&mut ctx, &path);
            }
            ctx.counter().exit_code()
        }
        Command::Url { url, .. } => match UrlConverter::new(options)
            .and_then(|converter| converter.convert(&mut ctx, url))
        {
            Ok(_) => ctx.counter().exit_code(),
            Err(fatal) => {
                error!("{fatal}");
                fatal.exit_code
            }
        },
    };

    for record in ctx.source_infos() {
        debug!(record = %serde_json::to_string(record)?, "source info");
    }
    eprintln!("{}", ctx.counter());
    eprintln!("database path: {}", args.output.display());

    drop(ctx);
    drop(destination);
    if exit_code != ExitCode::Success {
        warn!("exit status {}", exit_code.code());
    }
    process::exit(exit_code.code());
}

/// Files to convert, in the order given. Directories are walked (sorted by name) when
/// `recursive` is set, and otherwise passed through for the converter to skip.
fn expand_paths(paths: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in paths {
        if recursive && path.is_dir() {
            out.extend(walk_files(path));
        } else {
            out.push(path.clone());
        }
    }
    out
}

fn walk_files(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skip unreadable entry under '{}': {e}", dir.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
}
