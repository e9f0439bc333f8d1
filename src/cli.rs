//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use sqlite_ingest::convert::ConvertOptions;
use sqlite_ingest::ingestion::TableFormat;
use sqlite_ingest::processing::DupColumnPolicy;

/// Convert tables found in files and URLs into a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "sqlite-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Output SQLite database
    #[arg(short = 'o', long = "output", value_name = "DB", default_value = "out.sqlite")]
    pub output: PathBuf,

    /// Comma-separated columns to index in every created table that has them
    #[arg(long = "index", value_name = "COLS", value_delimiter = ',', global = true)]
    pub index: Vec<String>,

    /// Fail tables with duplicate column names instead of renaming the duplicates
    #[arg(long = "strict-columns", global = true)]
    pub strict_columns: bool,

    /// Do not record provenance in the `_source_info_` table
    #[arg(long = "no-source-info")]
    pub no_source_info: bool,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert local files
    File {
        /// Files (or, with --recursive, directories) to convert
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Descend into directories
        #[arg(short = 'r', long = "recursive")]
        recursive: bool,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Convert a URL
    Url {
        #[arg(value_name = "URL")]
        url: String,

        /// Proxy used for both http and https requests
        #[arg(long = "proxy", value_name = "PROXY")]
        proxy: Option<String>,

        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(ClapArgs, Debug)]
pub struct SourceArgs {
    /// Source format; inferred from the extension or content type if not specified
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<TableFormat>,

    /// Character encoding of text sources
    #[arg(long = "encoding", value_name = "ENCODING", default_value = "utf-8")]
    pub encoding: String,
}

impl Args {
    pub fn convert_options(&self) -> ConvertOptions {
        let (source, proxy) = match &self.command {
            Command::File { source, .. } => (source, None),
            Command::Url { source, proxy, .. } => (source, proxy.clone()),
        };
        ConvertOptions {
            format: source.format,
            encoding: source.encoding.clone(),
            index_list: self
                .index
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            dup_col_policy: if self.strict_columns {
                DupColumnPolicy::Error
            } else {
                DupColumnPolicy::Rename
            },
            proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_command_options() {
        let args = Args::parse_from([
            "sqlite-ingest",
            "-o",
            "db.sqlite",
            "file",
            "--index",
            "id, name",
            "--format",
            "ndjson",
            "-r",
            "data",
        ]);
        let options = args.convert_options();
        assert_eq!(options.index_list, vec!["id", "name"]);
        assert_eq!(options.format, Some(TableFormat::JsonLines));
        assert_eq!(options.encoding, "utf-8");
        assert_eq!(options.dup_col_policy, DupColumnPolicy::Rename);
        assert!(matches!(args.command, Command::File { recursive: true, .. }));
    }

    #[test]
    fn url_command_options() {
        let args = Args::parse_from([
            "sqlite-ingest",
            "url",
            "--proxy",
            "http://proxy:3128",
            "--strict-columns",
            "https://example.com/data.json",
        ]);
        let options = args.convert_options();
        assert_eq!(options.proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(options.dup_col_policy, DupColumnPolicy::Error);
        assert_eq!(args.output, PathBuf::from("out.sqlite"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let parsed = Args::try_parse_from(["sqlite-ingest", "file", "--format", "yaml", "a.yaml"]);
        assert!(parsed.is_err());
    }
}
