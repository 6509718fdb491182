//! CLI definitions and command dispatch

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;

use crate::commands;
use crate::output::{self, FlowSettings, OutputBuffer, Streams};
use crate::store::QueryContext;

/// codemap - Structural queries over a project index
///
/// Answers "who calls this", "what imports that" and "what is in here"
/// from PROJECT_INDEX.json without re-reading the source.
#[derive(Parser, Debug)]
#[command(name = "codemap")]
#[command(version)]
#[command(about = "Query a pre-generated project index: callers, imports, dead code, summaries")]
#[command(after_help = "\
EXAMPLES:
    codemap stats                   Index totals and age
    codemap tree --max-depth 2      Directory layout of indexed files
    codemap callers handle_request  Who calls handle_request
    codemap trace main save_user    Shortest call chain between two symbols
    codemap dead -l 50              Symbols nothing calls
    codemap importers react         Files importing a module
    codemap summarize src/api       What lives in a directory

Large outputs prompt before printing at a terminal; use --force to skip
the prompt or --json for machine-readable output.")]
pub struct Cli {
    /// Index document (default: PROJECT_INDEX.json in the project root)
    #[arg(short, long, global = true)]
    pub index: Option<PathBuf>,

    /// Print everything without the line-limit prompt
    #[arg(long, global = true)]
    pub force: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Index totals, language mix and age
    Stats,

    /// Directory tree of indexed files
    Tree {
        /// Deepest directory level to expand
        #[arg(long, default_value = "3")]
        max_depth: usize,

        /// Include files, not just directories
        #[arg(long)]
        files: bool,
    },

    /// Find symbols and files by name
    Search {
        term: Option<String>,

        /// Treat the term as a regular expression
        #[arg(long)]
        regex: bool,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Symbols that call a function
    Callers {
        function: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Symbols a function calls
    Callees {
        function: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Shortest call chain between two functions
    Trace {
        from: Option<String>,
        to: Option<String>,
    },

    /// Symbols with no known callers
    Dead {
        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Modules a file imports
    Imports { file: Option<String> },

    /// Files importing a module
    Importers {
        module: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Code-size and call-graph metrics
    Metrics,

    /// Summarize a file or directory
    Summarize { path: Option<String> },

    /// Everything the index knows about one or more terms
    Investigate {
        terms: Vec<String>,

        /// Maximum results per section
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Context for debugging a function or file
    Debug { target: Option<String> },

    /// Cleanup candidates: dead symbols and unreferenced files
    Sanitize {
        /// Maximum results per section
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Include test files
        #[arg(long)]
        tests: bool,
    },

    /// Documentation preview for a file, or docs lines mentioning a term
    Docs {
        target: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Project overview
    Report {
        /// Restrict the report to files under this path
        #[arg(long)]
        focus: Option<String>,
    },
}

impl Commands {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Tree { .. } => "tree",
            Self::Search { .. } => "search",
            Self::Callers { .. } => "callers",
            Self::Callees { .. } => "callees",
            Self::Trace { .. } => "trace",
            Self::Dead { .. } => "dead",
            Self::Imports { .. } => "imports",
            Self::Importers { .. } => "importers",
            Self::Metrics => "metrics",
            Self::Summarize { .. } => "summarize",
            Self::Investigate { .. } => "investigate",
            Self::Debug { .. } => "debug",
            Self::Sanitize { .. } => "sanitize",
            Self::Docs { .. } => "docs",
            Self::Report { .. } => "report",
        }
    }
}

/// Result of argument parsing
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// A subcommand clap doesn't know; not an error
    UnknownCommand(String),
}

/// Parse arguments, turning an unrecognized subcommand into
/// [`Invocation::UnknownCommand`]. Every other clap error is returned as-is.
pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Invocation::Run(cli)),
        Err(err) if err.kind() == ErrorKind::InvalidSubcommand => {
            let name = match err.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(name)) => name.clone(),
                _ => String::new(),
            };
            Ok(Invocation::UnknownCommand(name))
        }
        Err(err) => Err(err),
    }
}

/// Notice plus usage for an unknown subcommand
pub fn write_unknown_command(name: &str, err: &mut dyn Write) -> std::io::Result<()> {
    writeln!(err, "Unknown command '{}'", name)?;
    writeln!(err)?;
    write!(err, "{}", Cli::command().render_help())
}

/// Run one parsed command against the index.
///
/// Text output is held in an [`OutputBuffer`] for the duration of the
/// handler and released through the flow controller afterwards. JSON goes
/// straight to `streams.out`.
pub fn dispatch(cli: &Cli, ctx: &mut QueryContext, cwd: &Path, streams: &mut Streams<'_>) -> Result<()> {
    let (index_path, root) = ctx.resolve(cli.index.as_deref(), cwd);
    let project = ctx.open(&index_path, &root)?;
    debug!(command = cli.command.name(), json = cli.json, "dispatching");

    if cli.json {
        let result = commands::run(&cli.command, &project, true, &mut *streams.out, &mut *streams.err);
        streams.out.flush()?;
        return result;
    }

    let settings = FlowSettings {
        line_limit: ctx.config().line_limit,
        head_lines: ctx.config().head_lines,
    };
    let mut buffer = OutputBuffer::new(cli.command.name(), cli.force);

    match commands::run(&cli.command, &project, false, &mut buffer, &mut *streams.err) {
        Ok(()) => {
            output::flush(buffer, settings, streams)?;
            Ok(())
        }
        Err(err) => {
            // Partial output is released as-is, never held behind a prompt
            streams.out.write_all(buffer.contents().as_bytes())?;
            streams.out.flush()?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let Invocation::Run(cli) = parse_from(["codemap", "callers", "foo", "--json", "-i", "x.json"]).unwrap()
        else {
            panic!("expected a command");
        };
        assert!(cli.json);
        assert_eq!(cli.index, Some(PathBuf::from("x.json")));
        assert!(matches!(
            cli.command,
            Commands::Callers { ref function, limit: 20 } if function.as_deref() == Some("foo")
        ));
    }

    #[test]
    fn test_positionals_are_optional() {
        let Invocation::Run(cli) = parse_from(["codemap", "trace", "a"]).unwrap() else {
            panic!("expected a command");
        };
        match cli.command {
            Commands::Trace { from, to } => {
                assert_eq!(from.as_deref(), Some("a"));
                assert_eq!(to, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_tree_defaults() {
        let Invocation::Run(cli) = parse_from(["codemap", "tree"]).unwrap() else {
            panic!("expected a command");
        };
        assert!(matches!(cli.command, Commands::Tree { max_depth: 3, files: false }));
        assert_eq!(cli.command.name(), "tree");
    }

    #[test]
    fn test_unknown_command_is_not_an_error() {
        match parse_from(["codemap", "frobnicate"]).unwrap() {
            Invocation::UnknownCommand(name) => assert_eq!(name, "frobnicate"),
            other => panic!("unexpected {:?}", other),
        }

        let mut err = Vec::new();
        write_unknown_command("frobnicate", &mut err).unwrap();
        let text = String::from_utf8(err).unwrap();
        assert!(text.starts_with("Unknown command 'frobnicate'"));
        assert!(text.contains("callers"));
    }

    #[test]
    fn test_bad_flag_is_still_an_error() {
        assert!(parse_from(["codemap", "dead", "--bogus"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
