use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "jot")]
#[command(about = "Notes and checklists that sync with your notes server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the local note collection
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a note, or a checklist when items are given
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note body
        body: Vec<String>,
        /// Checklist item (repeatable)
        #[arg(long = "item", value_name = "TEXT")]
        items: Vec<String>,
        /// Tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Share the note with every user
        #[arg(long)]
        shared: bool,
    },
    /// List notes, newest first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only notes with this tag
        #[arg(long)]
        tag: Option<String>,
        /// Include deleted notes and notes owned by other users
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Toggle a checklist item
    Check {
        /// Note ID or unique ID prefix
        note: String,
        /// Item number (1-based) or item ID prefix
        item: String,
    },
    /// Run one sync cycle now
    Sync,
    /// Keep syncing in the background until interrupted
    Watch,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set the notes server URL
    SetServer {
        /// Server URL, e.g. https://notes.example.com
        url: String,
    },
    /// Set the username notes are created for
    SetUsername {
        name: String,
    },
}
