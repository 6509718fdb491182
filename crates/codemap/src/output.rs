//! Output buffering and flow control
//!
//! Command output is collected in an [`OutputBuffer`] and released once the
//! command finishes. Small outputs go straight through; large ones warn when
//! piped, or ask the user at a terminal whether to print all of it, the head,
//! or nothing.

use std::io::{self, BufRead, Write};

use tracing::debug;

/// Invalid answers tolerated before the prompt gives up and cancels
const PROMPT_ATTEMPTS: usize = 3;

/// Lines written by one command, held until the command finishes
#[derive(Debug, Default)]
pub struct OutputBuffer {
    command: String,
    force_flush: bool,
    lines: Vec<String>,
}

impl OutputBuffer {
    pub fn new(command: &str, force_flush: bool) -> Self {
        Self {
            command: command.to_string(),
            force_flush,
            lines: Vec::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn force_flush(&self) -> bool {
        self.force_flush
    }

    /// Lines held, counting an unterminated trailing line
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Everything written, byte for byte
    pub fn contents(&self) -> String {
        self.lines.concat()
    }

    /// Append text; a write without a trailing newline keeps the line open
    /// so the next write continues it.
    pub fn push_str(&mut self, mut text: &str) {
        while !text.is_empty() {
            let (piece, rest) = match text.find('\n') {
                Some(i) => text.split_at(i + 1),
                None => (text, ""),
            };
            match self.lines.last_mut() {
                Some(last) if !last.ends_with('\n') => last.push_str(piece),
                _ => self.lines.push(piece.to_string()),
            }
            text = rest;
        }
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// How a finished buffer will be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Under the limit or forced: write it all
    Immediate,
    /// Over the limit without a terminal: warn on stderr, then write it all
    WarnedImmediate,
    /// Over the limit at a terminal: ask
    UserChoice,
}

/// Pure decision for a buffer of `line_count` lines
pub fn decide(line_count: usize, line_limit: usize, force: bool, interactive: bool) -> Disposition {
    if force || line_count < line_limit {
        Disposition::Immediate
    } else if !interactive {
        Disposition::WarnedImmediate
    } else {
        Disposition::UserChoice
    }
}

/// Answer to the large-output prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Full,
    Head,
    Cancel,
}

impl Choice {
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(Self::Full),
            "h" | "head" => Some(Self::Head),
            "n" | "no" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// What happened to a flushed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Immediate,
    Warned,
    Chosen(Choice),
}

/// Limits applied when flushing
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub line_limit: usize,
    pub head_lines: usize,
}

/// The process streams a command's output ends up on
pub struct Streams<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub input: &'a mut dyn BufRead,
    /// stdin and stdout are both terminals
    pub interactive: bool,
}

/// True when both stdin and stdout are attached to a terminal
pub fn stdio_is_interactive() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Release `buffer` according to its size, the settings and the terminal.
///
/// Consumes the buffer: each command's output is flushed exactly once.
pub fn flush(buffer: OutputBuffer, settings: FlowSettings, streams: &mut Streams<'_>) -> io::Result<Outcome> {
    let lines = buffer.line_count();
    let disposition = decide(lines, settings.line_limit, buffer.force_flush(), streams.interactive);
    debug!(command = buffer.command(), lines, ?disposition, "flushing output");

    match disposition {
        Disposition::Immediate => {
            write_all(streams.out, &buffer.contents())?;
            Ok(Outcome::Immediate)
        }
        Disposition::WarnedImmediate => {
            writeln!(
                streams.err,
                "Warning: output is {} lines (limit {}); use --force or --json to silence this warning",
                lines, settings.line_limit
            )?;
            write_all(streams.out, &buffer.contents())?;
            Ok(Outcome::Warned)
        }
        Disposition::UserChoice => {
            let choice = prompt(lines, settings, streams)?;
            match choice {
                Choice::Full => write_all(streams.out, &buffer.contents())?,
                Choice::Head => write_head(&buffer, settings.head_lines, streams.out)?,
                Choice::Cancel => {
                    writeln!(streams.err, "Cancelled. Tip: {}", cancel_hint(buffer.command()))?;
                }
            }
            Ok(Outcome::Chosen(choice))
        }
    }
}

fn prompt(lines: usize, settings: FlowSettings, streams: &mut Streams<'_>) -> io::Result<Choice> {
    for _ in 0..PROMPT_ATTEMPTS {
        write!(
            streams.err,
            "Output is {} lines. Show all [y], first {} [h], or cancel [n]? ",
            lines, settings.head_lines
        )?;
        streams.err.flush()?;

        let mut answer = String::new();
        if streams.input.read_line(&mut answer)? == 0 {
            writeln!(streams.err)?;
            return Ok(Choice::Cancel);
        }
        if let Some(choice) = Choice::parse(&answer) {
            return Ok(choice);
        }
        writeln!(streams.err, "Please answer y, h or n.")?;
    }
    Ok(Choice::Cancel)
}

fn write_head(buffer: &OutputBuffer, head_lines: usize, out: &mut dyn Write) -> io::Result<()> {
    let shown = &buffer.lines()[..head_lines.min(buffer.line_count())];
    let mut text = shown.concat();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&format!(
        "... {} more lines omitted (use --force to see everything)\n",
        buffer.line_count() - shown.len()
    ));
    write_all(out, &text)
}

fn write_all(out: &mut dyn Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Suggestion printed when the user cancels a large output
pub fn cancel_hint(command: &str) -> &'static str {
    match command {
        "tree" => "try --max-depth 2",
        "search" | "callers" | "callees" | "dead" | "importers" | "investigate" | "sanitize"
        | "docs" => "use -l to limit results or --json for full output",
        "summarize" => "summarize a narrower path",
        "report" => "narrow it with --focus <path>",
        _ => "re-run with --force to skip this prompt",
    }
}

/// Writer that treats a closed reader (EPIPE) as success.
///
/// `codemap dead | head` must not fail when `head` exits early.
pub struct PipeSafe<W>(pub W);

impl<W: Write> Write for PipeSafe<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.write(buf) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(buf.len()),
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.flush() {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }
}
