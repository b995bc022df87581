//! Local process executor
//!
//! Runs a code fragment with the matching interpreter in a child process and
//! captures stdout and stderr. There is no sandbox, timeout or resource limit:
//! the code runs with the same privileges as the console.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use super::Executor;

/// Executor that spawns an interpreter per fragment
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

/// Interpreter program and arguments for a fence language
///
/// Returns `None` for languages without a known interpreter.
pub fn interpreter(language: &str, code: &str) -> Option<(&'static str, Vec<String>)> {
    let code = code.to_string();
    match language {
        "python" | "python3" | "py" => Some(("python3", vec!["-u".to_string(), "-c".to_string(), code])),
        "sh" | "bash" | "shell" => Some(("/bin/sh", vec!["-c".to_string(), code])),
        "javascript" | "js" | "node" => Some(("node", vec!["-e".to_string(), code])),
        _ => None,
    }
}

/// Merge a finished process's streams into one block of text
fn captured_text(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    if text.is_empty() && !output.status.success() {
        text = format!("Process exited with {}\n", output.status);
    }
    text
}

impl Executor for ProcessExecutor {
    async fn execute(&self, language: &str, code: &str) -> String {
        let Some((program, args)) = interpreter(language, code) else {
            warn!(language, "No interpreter for language");
            return format!(
                "Unsupported language: {}. Supported: python, sh, javascript\n",
                language
            );
        };

        info!(language, program, code_len = code.len(), "Executing code");
        let start = std::time::Instant::now();

        // kill_on_drop: an interrupted session must not leave the child behind
        let result = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(output) => {
                info!(
                    exit_code = output.status.code().unwrap_or(-1),
                    duration_ms,
                    "Execution complete"
                );
                captured_text(&output)
            }
            Err(e) => {
                warn!(program, error = %e, "Failed to spawn interpreter");
                format!("Failed to run {}: {}\n", program, e)
            }
        }
    }
}
