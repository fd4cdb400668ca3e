/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Kind of message a command reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warn,
    Error,
}

impl Level {
    fn to_stderr(self) -> bool {
        matches!(self, Level::Warn | Level::Error)
    }
}

/// Trait for formatting CLI output
///
/// Commands call the level helpers; implementations only decide how one
/// message is rendered, or whether it is shown at all.
pub trait OutputFormatter {
    /// Rendered line for `message`, `None` to drop it
    fn render(&self, level: Level, message: &str) -> Option<String>;

    fn print_json(&self, value: &serde_json::Value);

    fn emit(&self, level: Level, message: &str) {
        let Some(line) = self.render(level, message) else {
            return;
        };
        if level.to_stderr() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    fn success(&self, message: &str) {
        self.emit(Level::Success, message);
    }
    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }
    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }
    fn error(&self, message: &str) {
        self.emit(Level::Error, message);
    }
}

/// Terminal output with status marks; `quiet` keeps only warnings and errors
pub struct HumanFormatter {
    pub quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn render(&self, level: Level, message: &str) -> Option<String> {
        match level {
            Level::Success if !self.quiet => Some(format!("\u{2713} {message}")),
            Level::Info if !self.quiet => Some(format!("  {message}")),
            Level::Success | Level::Info => None,
            Level::Warn => Some(format!("\u{26a0} {message}")),
            Level::Error => Some(format!("\u{2717} Error: {message}")),
        }
    }

    // Commands print their own human rendering of structured results
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// One JSON document per line; informational chatter is dropped
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn render(&self, level: Level, message: &str) -> Option<String> {
        let value = match level {
            Level::Info => return None,
            Level::Success => serde_json::json!({ "ok": true, "message": message }),
            Level::Warn => serde_json::json!({ "ok": true, "warning": message }),
            Level::Error => serde_json::json!({ "ok": false, "error": message }),
        };
        Some(value.to_string())
    }

    fn print_json(&self, value: &serde_json::Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => self.error(&format!("Failed to render output: {e}")),
        }
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

/// `1 file`, `2 files`
pub fn plural(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", if count == 1 { "" } else { "s" })
}
