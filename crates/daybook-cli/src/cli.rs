use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Write one line a day and keep it in sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Sync server base URL (falls back to `DAYBOOK_SERVER_URL`)
    #[arg(long, global = true, value_name = "URL")]
    pub server_url: Option<String>,

    /// Quick capture for today: daybook "what happened"
    #[arg(trailing_var_arg = true)]
    pub message: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write or replace the entry for a date
    Write {
        /// `today`, `yesterday` or YYYY-MM-DD
        date: String,
        /// Entry text (stdin or $EDITOR when omitted)
        message: Vec<String>,
    },
    /// Show the entry for a date with on-this-day memories
    Show {
        /// `today`, `yesterday` or YYYY-MM-DD
        #[arg(default_value = "today")]
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the entry for a date
    #[command(alias = "rm")]
    Delete {
        /// `today`, `yesterday` or YYYY-MM-DD
        date: String,
    },
    /// List recent entries, newest date first
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export entries
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import entries from a JSON export
    Import {
        /// JSON file produced by `daybook export`
        file: PathBuf,
    },
    /// Run one sync round against the server
    Sync,
    /// Keep syncing in the background until interrupted
    Watch,
    /// Show sync status for the local journal
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for daybook_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
