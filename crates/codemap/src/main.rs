//! codemap - Structural queries over a pre-generated project index
//!
//! "Ask the index, not the source tree."
//!
//! Loads PROJECT_INDEX.json from the project root (or `-i <path>`) and
//! answers call-graph, import and layout questions about the codebase.

use std::io;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use codemap::cli::{self, Invocation};
use codemap::output::{self, PipeSafe, Streams};
use codemap::{Config, QueryContext};

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match cli::parse_from(std::env::args_os()) {
        Ok(Invocation::Run(cli)) => cli,
        Ok(Invocation::UnknownCommand(name)) => {
            cli::write_unknown_command(&name, &mut io::stderr())?;
            return Ok(());
        }
        Err(err) => err.exit(),
    };

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let mut ctx = QueryContext::new(Config::load_or_default());

    let mut out = PipeSafe(io::stdout().lock());
    let mut err = io::stderr();
    let mut input = io::stdin().lock();
    let mut streams = Streams {
        out: &mut out,
        err: &mut err,
        input: &mut input,
        interactive: output::stdio_is_interactive(),
    };

    cli::dispatch(&cli, &mut ctx, &cwd, &mut streams)
}
