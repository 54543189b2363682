use std::path::PathBuf;

use clap::Parser;

/// Drive an in-memory guest filesystem from a script or an interactive prompt.
#[derive(Debug, Parser)]
pub struct Cli {
    /// A script of console commands, one per line. Starts a prompt when omitted.
    pub input: Option<PathBuf>,
    /// Additional support bundles to load after the built-in one.
    #[arg(short, long, value_name = "FILE")]
    pub bundle: Vec<PathBuf>,
    /// Home (and initial working) directory of the guest.
    #[arg(long, value_name = "DIR")]
    pub home: Option<String>,
    /// Copy a real directory into a scratch session directory and start there.
    #[arg(short, long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,
}
