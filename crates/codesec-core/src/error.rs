use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scan/compare/report pipeline.
#[derive(Debug, Error)]
pub enum CodesecError {
    /// The external scanner CLI exited non-zero or could not be spawned.
    #[error("scanner invocation failed{}: {stderr}", exit_suffix(.exit_code))]
    ToolExecution {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// A result file on disk was not valid SARIF/JSON, or a patch summary
    /// did not match its expected shape.
    #[error("malformed report {}: {reason}", path.display())]
    MalformedReport { path: PathBuf, reason: String },

    /// A required input or environment variable was absent.
    #[error("missing required input or environment variable `{0}`")]
    MissingInput(String),

    /// A git branch, commit or push operation failed.
    #[error("git {op} failed: {detail}")]
    GitOperation { op: String, detail: String },

    /// The GitHub REST API rejected a request.
    #[error("GitHub API request failed: {0}")]
    Api(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CodesecError> = std::result::Result<T, E>;

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {})", code),
        None => String::new(),
    }
}

impl CodesecError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CodesecError::MalformedReport {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn git(op: impl Into<String>, detail: impl Into<String>) -> Self {
        CodesecError::GitOperation {
            op: op.into(),
            detail: detail.into(),
        }
    }
}
