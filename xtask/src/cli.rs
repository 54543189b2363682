use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
pub struct Cli {
    #[clap(subcommand)]
    pub task: Task,
}

#[derive(Debug, Subcommand)]
pub enum Task {
    /// Pack a directory of support sources into a bundle file.
    Pack(Pack),
}

#[derive(Debug, Args)]
pub struct Pack {
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
    /// Where to write the bundle.
    #[arg(short, long, value_name = "FILE", default_value = "assets/support.json")]
    pub output: PathBuf,
}
