//! System Log Source
//!
//! Device-wide log tail attached to every report, next to the in-process
//! app log. The platform decides how to read it; the default shells out to
//! `logcat`.

use std::process::Command;

/// Substituted with the requested line count in command arguments
const LINE_COUNT_PLACEHOLDER: &str = "{n}";

pub trait SystemLogSource: Send + Sync {
    /// Last `n` lines of the system log, newest last. Never fails; problems
    /// are reported inline as text.
    fn last_lines(&self, n: usize) -> String;
}

// ============================================================================
// COMMAND
// ============================================================================

/// Runs a log-dump command and keeps the tail of its output
#[derive(Debug, Clone)]
pub struct CommandLogSource {
    program: String,
    args: Vec<String>,
}

impl CommandLogSource {
    /// `{n}` in `args` is replaced with the requested line count
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `logcat -d -t <n>`
    pub fn logcat() -> Self {
        Self::new("logcat", ["-d", "-t", LINE_COUNT_PLACEHOLDER])
    }

    fn run(&self, n: usize) -> Result<String, String> {
        let count = n.to_string();
        let args: Vec<String> = self.args.iter().map(|a| a.replace(LINE_COUNT_PLACEHOLDER, &count)).collect();

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            return Err(format!("{} exited with {}", self.program, output.status));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for CommandLogSource {
    fn default() -> Self {
        Self::logcat()
    }
}

impl SystemLogSource for CommandLogSource {
    fn last_lines(&self, n: usize) -> String {
        match self.run(n) {
            Ok(text) => tail(&text, n),
            Err(e) => {
                log::warn!("System log unavailable: {}", e);
                format!("[system log unavailable: {}]", e)
            }
        }
    }
}

// ============================================================================
// STATIC
// ============================================================================

/// Fixed text, for tests and platforms without a readable system log
#[derive(Debug, Clone, Default)]
pub struct StaticLogSource {
    text: String,
}

impl StaticLogSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl SystemLogSource for StaticLogSource {
    fn last_lines(&self, n: usize) -> String {
        tail(&self.text, n)
    }
}

/// Last `n` lines of `text`, joined with `\n`
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
