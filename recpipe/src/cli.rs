use std::path::PathBuf;

use clap::{Parser, Subcommand};
use recpipe::PipelineKind;

#[derive(Parser, Debug)]
#[command(
    name = "recpipe",
    version,
    about = "Post-process finished recordings: commercials, screenshots, remux, transcode"
)]
pub struct Args {
    /// JSON configuration file. Missing fields take their defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write daily-rolling log files into this directory.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log filter directive overriding `RUST_LOG` (e.g. `recpipe=debug`).
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one pipeline against one recording.
    Run {
        /// commercial, screenshot, remux or transcode
        #[arg(short, long)]
        pipeline: PipelineKind,

        /// JSON description of the recording.
        #[arg(short, long)]
        recording: PathBuf,
    },

    /// Delete the segments of old recordings.
    Cleanup {
        /// JSON array of recordings.
        #[arg(long)]
        catalog: PathBuf,

        /// Sweep once and exit instead of running on a schedule.
        #[arg(long)]
        once: bool,
    },
}
