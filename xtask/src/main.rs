mod cli;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use playfs_bundle::Bundle;

use crate::cli::{Cli, Pack, Task};

fn main() -> Result<()> {
    let args = Cli::parse();

    match args.task {
        Task::Pack(pack) => {
            self::pack(&pack)?;
        }
    }

    Ok(())
}

fn pack(pack: &Pack) -> Result<()> {
    let bundle = Bundle::from_dir(&pack.dir)
        .with_context(|| format!("error reading {}", pack.dir.display()))?;
    let encoded = bundle.encode().context("error encoding bundle")?;
    fs::write(&pack.output, format!("{encoded}\n"))
        .with_context(|| format!("error writing {}", pack.output.display()))?;
    println!(
        "packed {} files into {}",
        bundle.len(),
        pack.output.display()
    );
    Ok(())
}
