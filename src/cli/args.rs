//! CLI argument definitions using clap
//!
//! Global options select the configuration file and may override the
//! backing file paths. Each subcommand maps to one store operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tardigrade - a flat-file record store, one JSON record per line
#[derive(Parser, Debug)]
#[command(name = "tardigrade")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (optional; defaults apply if absent)
    #[arg(long, global = true, default_value = "./tardigrade.json")]
    pub config: PathBuf,

    /// Fixed-schema database file (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Flexible-schema database file (overrides config)
    #[arg(long, global = true)]
    pub flex_db: Option<PathBuf>,

    /// Log INFO events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database file
    Create {
        /// Act on the flexible-schema file
        #[arg(long)]
        flex: bool,
    },

    /// Delete the database file
    Delete {
        #[arg(long)]
        flex: bool,
    },

    /// Copy the database file
    Copy {
        /// Destination path
        #[arg(long)]
        to: PathBuf,
        #[arg(long)]
        flex: bool,
    },

    /// Remove every record, keeping the file
    Empty {
        #[arg(long)]
        flex: bool,
    },

    /// Append a fixed-schema record
    Add { key: String, data: String },

    /// Select a record by id
    Get {
        id: u64,
        /// raw | json | id | key | value
        #[arg(long, default_value = "raw")]
        format: String,
    },

    /// Replace the key and data of a record
    Modify { id: u64, key: String, data: String },

    /// Delete a record
    Remove { id: u64 },

    /// Count lines in the database file
    Count {
        #[arg(long)]
        flex: bool,
    },

    /// First record
    First {
        #[arg(long, default_value = "raw")]
        format: String,
        #[arg(long)]
        flex: bool,
    },

    /// Last record
    Last {
        #[arg(long, default_value = "raw")]
        format: String,
        #[arg(long)]
        flex: bool,
    },

    /// First N records as a JSON array
    FirstN {
        n: usize,
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long)]
        flex: bool,
    },

    /// Last N records as a JSON array
    LastN {
        n: usize,
        #[arg(long, default_value = "json")]
        format: String,
        #[arg(long)]
        flex: bool,
    },

    /// Records matching every keyword (comma or space separated)
    Search {
        query: String,
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Append a flexible record from name/value pairs
    FlexAdd {
        key: String,
        /// name value [name value ...]
        pairs: Vec<String>,
    },

    /// Select a flexible record by id
    FlexGet {
        id: u64,
        /// raw | json | id | key | fields
        #[arg(long, default_value = "raw")]
        format: String,
    },

    /// Value of one attribute
    FlexField { id: u64, name: String },

    /// Attribute names of a record
    FlexFields { id: u64 },

    /// Replace the key and attributes of a flexible record
    FlexModify {
        id: u64,
        key: String,
        pairs: Vec<String>,
    },

    /// Delete a flexible record
    FlexRemove { id: u64 },

    /// Flexible records matching every keyword
    FlexSearch {
        query: String,
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Obscure a value before storing it
    Encrypt {
        text: String,
        #[arg(long)]
        key: String,
    },

    /// Recover an obscured value
    Decrypt {
        text: String,
        #[arg(long)]
        key: String,
    },

    /// Print the release version
    Version,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
