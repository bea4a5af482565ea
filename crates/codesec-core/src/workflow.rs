//! GitHub Actions plumbing: inputs, step outputs and workflow log commands.
//!
//! The runner passes action inputs as `INPUT_*` environment variables and
//! collects step outputs from the file named by `GITHUB_OUTPUT`. Log lines
//! prefixed with `::` are workflow commands interpreted by the runner.

use crate::error::{CodesecError, Result};
use std::fs::OpenOptions;
use std::io::Write;

/// Read an action input, `None` when unset or empty.
pub fn get_input(name: &str) -> Option<String> {
    let key = format!("INPUT_{}", name.to_uppercase().replace('-', "_"));
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read an action input, falling back to a default when unset.
pub fn get_input_or(name: &str, default: &str) -> String {
    get_input(name).unwrap_or_else(|| default.to_string())
}

/// Read a required environment variable.
pub fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CodesecError::MissingInput(name.to_string()))
}

/// Read an optional environment variable, empty counts as unset.
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Whether the runner was started with debug logging enabled.
pub fn is_debug() -> bool {
    std::env::var("RUNNER_DEBUG").map(|v| v == "1").unwrap_or(false)
}

/// Append a step output to the file named by `GITHUB_OUTPUT`.
pub fn set_output(key: &str, value: &str) -> Result<()> {
    let path = required_env("GITHUB_OUTPUT")?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}={}", key, value)?;
    Ok(())
}

/// Plain informational log line.
pub fn info(message: &str) {
    println!("{}", message);
}

/// Debug log line, shown by the runner only when debug logging is on.
pub fn debug(message: &str) {
    println!("::debug::{}", escape_data(message));
}

/// Error annotation; surfaces in the run summary without failing the step.
pub fn error(message: &str) {
    println!("::error::{}", escape_data(message));
}

/// Open a collapsible log group.
pub fn start_group(title: &str) {
    println!("::group::{}", escape_data(title));
}

/// Close the current log group.
pub fn end_group() {
    println!("::endgroup::");
}

/// Escape the data portion of a workflow command.
fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
