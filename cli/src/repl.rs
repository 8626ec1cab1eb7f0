//! Query evaluation and result printing for the `polar-host` binary.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use polar_host_core::polar::debug::prompt;
use polar_host_core::polar::DebugHook;
use polar_host_core::{Bindings, HostValue, Polar, PolarError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Polar(#[from] PolarError),

    #[error("terminal i/o failed: {0}")]
    Terminal(#[from] io::Error),
}


// ---------------------------------------------------------------------------
// Input shared by the query prompt and debug prompts
// ---------------------------------------------------------------------------

/// A line reader shared by the query prompt and `debug(...)` prompts. The
/// reader is locked for one line at a time, never across a query.
#[derive(Clone)]
pub struct SharedInput(Arc<Mutex<Box<dyn BufRead + Send>>>);

impl SharedInput {
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        SharedInput(Arc::new(Mutex::new(Box::new(reader))))
    }

    /// Next line without its line ending; `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut reader = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Answers `debug(...)` prompts with the next line of the REPL's input.
pub struct InputDebugger<W> {
    input: SharedInput,
    output: W,
}

impl<W: Write + Send> InputDebugger<W> {
    pub fn new(input: SharedInput, output: W) -> Self {
        InputDebugger { input, output }
    }
}

impl<W: Write + Send> DebugHook for InputDebugger<W> {
    fn on_debug(&mut self, message: &str) -> io::Result<String> {
        let mut reader = self.input.0.lock().unwrap_or_else(PoisonError::into_inner);
        prompt(message, &mut **reader, &mut self.output)
    }
}


// ---------------------------------------------------------------------------
// Formatting and the query loop
// ---------------------------------------------------------------------------

/// Render one value the way it would be written in a rule.
pub fn format_value(value: &HostValue) -> String {
    match value {
        HostValue::Integer(i) => i.to_string(),
        HostValue::Float(x) => x.to_string(),
        HostValue::Boolean(b) => b.to_string(),
        HostValue::String(s) => format!("{:?}", s),
        HostValue::List(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        HostValue::Dictionary(fields) => format!("{{{}}}", format_fields(fields)),
        HostValue::Instance(instance) => format!("{:?}", instance),
        HostValue::Predicate(p) => {
            let args: Vec<String> = p.args.iter().map(format_value).collect();
            format!("{}({})", p.name, args.join(", "))
        }
        HostValue::Variable(v) => v.0.clone(),
    }
}

fn format_fields(fields: &Bindings) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}: {}", k, format_value(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per solution; `False` when there are none.
pub fn run_query<W: Write>(polar: &mut Polar, source: &str, out: &mut W) -> Result<usize, CliError> {
    let mut count = 0;
    for result in polar.query_str(source)? {
        let bindings = result?;
        count += 1;
        writeln!(out, "Result: {{{}}}", format_fields(&bindings))?;
    }
    if count == 0 {
        writeln!(out, "False")?;
    }
    Ok(count)
}

/// Read queries line by line until end of input. Query errors are printed
/// and the loop carries on; terminal errors end it.
pub fn repl<W: Write>(polar: &mut Polar, input: &SharedInput, out: &mut W) -> Result<(), CliError> {
    loop {
        write!(out, "query> ")?;
        out.flush()?;
        let line = match input.read_line()? {
            Some(line) => line,
            None => break,
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        match run_query(polar, query, out) {
            Ok(_) => {}
            Err(CliError::Polar(e)) => writeln!(out, "{}", e)?,
            Err(e) => return Err(e),
        }
    }
    writeln!(out)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use polar_host_core::{ClassRegistry, Instance, Record};

    fn loaded(source: &str) -> Polar {
        let mut polar = Polar::new(ClassRegistry::shared());
        polar.load_str(source);
        polar
    }

    fn input(text: &'static str) -> SharedInput {
        SharedInput::new(text.as_bytes())
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn format_nested_values() {
        let mut dict = Bindings::new();
        dict.insert("a".into(), HostValue::from(vec![1i64, 2]));
        dict.insert("b".into(), HostValue::from("s"));
        assert_eq!(format_value(&HostValue::Dictionary(dict)), r#"{a: [1, 2], b: "s"}"#);
    }

    #[test]
    fn format_instance_uses_debug() {
        let value = HostValue::Instance(Instance::new(Record::new("A", &[])));
        assert!(format_value(&value).contains("\"A\""));
    }

    #[test]
    fn query_prints_each_result() {
        let mut polar = loaded("f(1); f(2);");
        let mut out = Vec::new();
        let count = run_query(&mut polar, "f(x)", &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(output(out), "Result: {x: 1}\nResult: {x: 2}\n");
    }

    #[test]
    fn failed_query_prints_false() {
        let mut polar = loaded("f(1);");
        let mut out = Vec::new();
        assert_eq!(run_query(&mut polar, "f(3)", &mut out).unwrap(), 0);
        assert_eq!(output(out), "False\n");
    }

    #[test]
    fn write_failure_is_a_terminal_error() {
        let mut polar = loaded("f(1);");
        let err = run_query(&mut polar, "f(1)", &mut FailingWriter).unwrap_err();
        assert!(matches!(err, CliError::Terminal(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn repl_keeps_going_after_errors() {
        let mut polar = loaded("f(1);");
        let mut out = Vec::new();
        repl(&mut polar, &input("f(x) f\n\nf(1)\n"), &mut out).unwrap();
        let text = output(out);
        assert!(text.contains("parse error"));
        assert!(text.contains("Result: {}"));
        assert!(text.ends_with("query> \n"));
    }

    #[test]
    fn debug_prompt_reads_from_the_repl_input() {
        let mut polar = loaded("f(x) := debug(\"paused\"), x = 1;");
        let shared = input("f(1)\ncontinue\nf(1)\n");
        polar.set_debug_hook(Box::new(InputDebugger::new(shared.clone(), io::sink())));

        let mut out = Vec::new();
        repl(&mut polar, &shared, &mut out).unwrap();
        let text = output(out);
        assert_eq!(text.matches("Result: {}").count(), 2);
        assert!(!text.contains("continue"));
    }

    #[test]
    fn input_debugger_shows_the_message() {
        let shared = input("step\n");
        let mut hook = InputDebugger::new(shared.clone(), Vec::new());
        assert_eq!(hook.on_debug("at f").unwrap(), "step");
        assert_eq!(output(hook.output), "at f\n> ");
        assert_eq!(shared.read_line().unwrap(), None);
    }
}
