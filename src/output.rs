// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::execution::{Execution, ExecutionStatus};

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
                println!("{message}");
            }
            OutputMode::Json => self.emit_stdout(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {message}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit_stderr(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.emit_stderr(&JsonEvent {
                event: "error",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print the final state of an execution.
    pub fn execution(&self, execution: &Execution) {
        match self.mode {
            OutputMode::Normal => {
                for line in execution_lines(execution) {
                    println!("{line}");
                }
            }
            OutputMode::Quiet => {
                println!("{} {}", execution.id(), execution.status());
            }
            OutputMode::Json => self.emit_stdout(&ExecutionEvent {
                event: "execution",
                duration_secs: self.duration(),
                execution,
            }),
        }
    }

    fn emit_stdout(&self, event: &impl Serialize) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }

    fn emit_stderr(&self, event: &impl Serialize) {
        if let Ok(json) = serde_json::to_string(event) {
            eprintln!("{json}");
        }
    }
}

/// Human-readable summary of an execution, one line per entry.
pub fn execution_lines(execution: &Execution) -> Vec<String> {
    let pipeline = execution.pipeline();
    let mut lines = vec![format!(
        "{} {} -> {} [{}]",
        pipeline.application(),
        pipeline.version(),
        pipeline.environment(),
        pipeline.strategy()
    )];

    for result in execution.step_results() {
        let mark = if result.success { "✓" } else { "✗" };
        let detail = result
            .error
            .as_deref()
            .or(result.summary.as_deref())
            .unwrap_or_default();
        lines.push(format!(
            "  {mark} {:<16} {:<24} {detail}",
            result.phase.as_str(),
            result.step
        ));
    }

    for result in execution.rollback_results() {
        let mark = if result.success { "↺" } else { "!" };
        let detail = result.error.as_deref().unwrap_or("compensated");
        lines.push(format!("  {mark} {:<16} {:<24} {detail}", "rollback", result.step));
    }

    if let Some(risk) = execution.risk_assessment() {
        lines.push(format!("  risk: {} ({:.2})", risk.level, risk.score));
    }

    let status = execution.status();
    match (status, execution.error_message()) {
        (ExecutionStatus::Completed, _) | (_, None) => lines.push(format!("Status: {status}")),
        (_, Some(reason)) => lines.push(format!("Status: {status} ({reason})")),
    }
    lines
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct ExecutionEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
    execution: &'a Execution,
}
