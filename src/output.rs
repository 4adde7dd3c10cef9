// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::model::BuildRun;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a line of build log output. JSON mode emits it as an event.
    pub fn log_line(&self, line: &str) {
        match self.mode {
            OutputMode::Json => self.event("log", line, false),
            _ => println!("{line}"),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.event("success", message, false),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.event("warning", message, true),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.event("error", message, true),
        }
    }

    /// Print build records: a table, one id per line in quiet mode, or JSON lines.
    pub fn builds(&self, runs: &[BuildRun]) {
        match self.mode {
            OutputMode::Normal => {
                if runs.is_empty() {
                    println!("No builds");
                    return;
                }
                for run in runs {
                    println!("{}", build_row(run));
                }
            }
            OutputMode::Quiet => {
                for run in runs {
                    println!("{} {}", run.id, run.status);
                }
            }
            OutputMode::Json => {
                for run in runs {
                    print_json(run);
                }
            }
        }
    }

    fn event(&self, event: &str, message: &str, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.duration(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }
}

fn print_json(value: &impl Serialize) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

/// One human-readable line per build.
pub fn build_row(run: &BuildRun) -> String {
    let target = match run.preview {
        Some(preview) => format!("{} (preview {})", run.target, preview),
        None => run.target.to_string(),
    };
    let detail = match (run.reason, run.stage) {
        (Some(reason), _) => reason.to_string(),
        (None, Some(stage)) if !run.is_terminal() => stage.to_string(),
        _ => String::new(),
    };
    format!(
        "{:<32}  {:<28}  {:<9}  {:<24}  {}",
        run.id.as_str(),
        target,
        run.status.to_string(),
        detail,
        run.queued_at.format("%Y-%m-%d %H:%M:%S")
    )
    .trim_end()
    .to_string()
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
