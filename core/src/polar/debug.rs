//! Hooks answering the engine's `Debug` events.

use std::io::{self, BufRead, Write};

/// Receives the engine's debug message and returns the operator's command.
pub trait DebugHook: Send {
    fn on_debug(&mut self, message: &str) -> io::Result<String>;
}

/// Prints the message to stdout and reads one command line from stdin.
#[derive(Debug, Default)]
pub struct StdinDebugger;

impl DebugHook for StdinDebugger {
    fn on_debug(&mut self, message: &str) -> io::Result<String> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        prompt(message, &mut stdin.lock(), &mut stdout.lock())
    }
}

/// Never blocks; answers every prompt with `continue`.
#[derive(Debug, Default)]
pub struct ContinueDebugger;

impl DebugHook for ContinueDebugger {
    fn on_debug(&mut self, _message: &str) -> io::Result<String> {
        Ok("continue".to_string())
    }
}

/// Show `message` (if any), print `> ` and read one line, without its
/// line ending. End of input reads as an empty command.
pub fn prompt(message: &str, input: &mut dyn BufRead, output: &mut dyn Write) -> io::Result<String> {
    if !message.is_empty() {
        writeln!(output, "{}", message)?;
    }
    write!(output, "> ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
