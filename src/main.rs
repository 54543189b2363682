mod cli;
mod console;

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use playfs_vfs::{
    stdio::{Sink, Stream},
    Bundle, Fs, Layout, Session,
};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::{cli::Cli, console::Console};

/// Support files every guest starts with.
const SUPPORT_BUNDLE: &str = include_str!("../assets/support.json");

fn main() -> Result<()> {
    // Logging setup
    let fmt_layer = fmt::layer().with_writer(std::io::stderr);
    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()
        .context("error reading logging directives")?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let args = Cli::parse();
    let mut fs = build_fs(&args)?;

    let session = match &args.workdir {
        Some(dir) => {
            let bundle = Bundle::from_dir(dir)
                .with_context(|| format!("error reading work directory {}", dir.display()))?;
            Some(Session::begin(&mut fs, bundle.iter()).context("error starting session")?)
        }
        None => None,
    };

    let mut console = Console::new(fs);
    let result = match &args.input {
        Some(input) => {
            let script = fs::read_to_string(input).context("error reading input file")?;
            run_script(&mut console, &script)
        }
        None => start_repl(&mut console),
    };

    let mut fs = console.into_inner();
    if let Some(session) = session {
        session.end(&mut fs).context("error ending session")?;
    }
    fs.flush_stdio();

    result
}

fn build_fs(args: &Cli) -> Result<Fs> {
    let mut layout = Layout::default();
    if let Some(home) = &args.home {
        layout = layout.with_home(home.as_str());
    }
    let sink: Box<dyn Sink> = Box::new(|stream: Stream, line: &str| match stream {
        Stream::Stdout => println!("{line}"),
        Stream::Stderr => eprintln!("{line}"),
    });
    let mut fs = Fs::new(layout)
        .context("error creating filesystem")?
        .with_sink(sink);

    let support = Bundle::decode(SUPPORT_BUNDLE).context("error decoding built-in bundle")?;
    fs.load_bundle(&support)
        .context("error loading built-in bundle")?;
    for path in &args.bundle {
        let text = fs::read_to_string(path)
            .with_context(|| format!("error reading bundle {}", path.display()))?;
        let bundle = Bundle::decode(&text)
            .with_context(|| format!("error decoding bundle {}", path.display()))?;
        fs.load_bundle(&bundle)
            .with_context(|| format!("error loading bundle {}", path.display()))?;
    }

    Ok(fs)
}

fn run_script(console: &mut Console, script: &str) -> Result<()> {
    for (i, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match console.execute(line) {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(err) => {
                report(&err);
                bail!("script failed at line {}", i + 1);
            }
        }
    }
    Ok(())
}

fn start_repl(console: &mut Console) -> Result<()> {
    let mut line_editor = Reedline::create();

    loop {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(console.fs().cwd().to_owned()),
            DefaultPromptSegment::Empty,
        );
        match line_editor.read_line(&prompt)? {
            Signal::Success(input) => match console.execute(&input) {
                Ok(Some(output)) => println!("{output}"),
                Ok(None) => {}
                Err(err) => report(&err),
            },
            Signal::CtrlD => break,
            Signal::CtrlC => continue,
        }
    }

    Ok(())
}

fn report(err: &anyhow::Error) {
    // clap renders its own `error:` prefix and usage
    if let Some(err) = err.downcast_ref::<clap::Error>() {
        eprint!("{err}");
    } else {
        eprintln!("error: {err:#}");
    }
}
