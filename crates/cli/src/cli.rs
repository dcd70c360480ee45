//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gamevault_core::{Category, Format, GameStatus, Platform};

#[derive(Parser)]
#[command(
    name = "gamevault",
    version,
    about = "Local-first game catalog: track, search, import and export your collection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Read configuration from this file instead of the default location.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Override the directory holding the collection.
    #[arg(long = "data-dir", value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List games in the collection.
    List {
        /// Only show games with this status.
        #[arg(long, value_parser = parse_status)]
        status: Option<GameStatus>,
    },
    /// Add a game.
    Add(AddArgs),
    /// Change a game's status, stamping start/completion dates.
    Status {
        /// Id of the game.
        id: String,
        /// New status.
        #[arg(value_parser = parse_status)]
        status: GameStatus,
    },
    /// Remove a game.
    Remove {
        /// Id of the game.
        id: String,
    },
    /// Import games from a file.
    Import {
        /// File to read.
        file: PathBuf,
        /// Format of the file (json, csv, steam, backup).
        #[arg(long, short)]
        format: Format,
    },
    /// Export the collection to a file.
    Export(ExportArgs),
    /// Search the collection; the query is remembered in history.
    Search {
        /// Free-text query.
        query: String,
        /// Only match games with this status.
        #[arg(long, value_parser = parse_status)]
        status: Option<GameStatus>,
        /// Only match games in this category.
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
    },
    /// Show autocomplete suggestions for a partial query.
    Suggest {
        /// Partial query; shorter than two characters shows recent searches.
        #[arg(default_value = "")]
        query: String,
    },
    /// Show or edit search history.
    History {
        /// Forget every past search.
        #[arg(long, conflicts_with = "remove")]
        clear: bool,
        /// Forget one past search.
        #[arg(long, value_name = "QUERY")]
        remove: Option<String>,
    },
    /// Print collection statistics as JSON.
    Stats,
}

#[derive(Args)]
pub struct AddArgs {
    /// Title of the game.
    #[arg(long)]
    pub title: String,
    /// Category; repeat or comma-separate for several.
    #[arg(long = "category", required = true, value_delimiter = ',', value_parser = parse_category)]
    pub categories: Vec<Category>,
    /// Platform; repeat or comma-separate for several.
    #[arg(long = "platform", required = true, value_delimiter = ',', value_parser = parse_platform)]
    pub platforms: Vec<Platform>,
    /// Initial status.
    #[arg(long, value_parser = parse_status, default_value = "Backlog")]
    pub status: GameStatus,
    /// Rating from 1 to 10.
    #[arg(long)]
    pub rating: Option<u8>,
    /// Hours played so far.
    #[arg(long)]
    pub hours: Option<f64>,
    #[arg(long)]
    pub developer: Option<String>,
    #[arg(long)]
    pub publisher: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output format (json, csv, steam, backup).
    #[arg(long, short)]
    pub format: Format,
    /// Directory to write into.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,
    /// Base file name; the date and extension are appended.
    #[arg(long)]
    pub name: Option<String>,
    /// Leave out developer, publisher, dates, playtime and cover.
    #[arg(long = "no-metadata")]
    pub no_metadata: bool,
    /// Leave out notes and description.
    #[arg(long = "no-notes")]
    pub no_notes: bool,
    /// Leave out ratings.
    #[arg(long = "no-ratings")]
    pub no_ratings: bool,
}

fn parse_status(value: &str) -> Result<GameStatus, String> {
    GameStatus::from_label(value).ok_or_else(|| expected(value, GameStatus::ALL))
}

fn parse_category(value: &str) -> Result<Category, String> {
    Category::from_label(value).ok_or_else(|| expected(value, Category::ALL))
}

fn parse_platform(value: &str) -> Result<Platform, String> {
    Platform::from_label(value).ok_or_else(|| expected(value, Platform::ALL))
}

fn expected<T: std::fmt::Display>(value: &str, choices: &[T]) -> String {
    let choices: Vec<String> = choices.iter().map(ToString::to_string).collect();
    format!("unknown value `{value}`, expected one of: {}", choices.join(", "))
}
