use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "epitrack",
    version,
    about = "Select, play and track episodic media from disk"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct SelectArgs {
    /// Show name, matched case-insensitively against directories under the source roots.
    pub show: String,

    /// Episode specifier: s01e02, s01e02-s01e08, s01e05-, s02, s02-s03, s02-,
    /// s, all, pilot, latest, prev, cur, next, or next-/cur-/prev-.
    #[arg(default_value = "next")]
    pub spec: String,

    /// Media source root directory; repeatable. Falls back to EPITRACK_SOURCE.
    #[arg(long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Progress namespace, e.g. a user name. Falls back to EPITRACK_USER.
    #[arg(long)]
    pub tag: Option<String>,

    /// Do not persist the watch pointer after the action.
    #[arg(long)]
    pub no_track: bool,

    /// Mirror watch marks to the remote history service.
    #[arg(long)]
    pub remote: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play the selected episode file(s) and update the watch pointer
    Play(SelectArgs),
    /// Print the selected episode file(s)
    List(SelectArgs),
    /// Print how many files the selection matches
    Count(SelectArgs),
    /// Mark the selection watched (or unwatched) without playing
    Mark {
        #[command(flatten)]
        select: SelectArgs,
        /// Mark as unwatched instead of watched.
        #[arg(long)]
        unseen: bool,
    },
    /// Drain queued remote watch-history updates
    Sync,
}
