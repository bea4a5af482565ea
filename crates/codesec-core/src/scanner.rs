//! Invocation of the external scanner CLI.
//!
//! The scanner is a black box with a command-line contract: `sca`/`sast`
//! scan sub-commands, a `compare` sub-mode for diffing two reports and a
//! `patch` sub-mode that generates fix patches. This module only builds
//! argument lists, spawns the process and surfaces its exit status.

use crate::error::{CodesecError, Result};
use crate::workflow;
use std::path::PathBuf;
use tokio::process::Command;

pub const SCA_REPORT: &str = "sca.sarif";
pub const SAST_REPORT: &str = "sast.sarif";
pub const PATCH_REPORT: &str = "patchSummary.md";

/// Handle on the external scanner binary.
#[derive(Debug, Clone)]
pub struct ScannerCli {
    binary: PathBuf,
}

impl ScannerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Run the scanner with the given arguments and return its stdout.
    ///
    /// Non-zero exit or spawn failure becomes `ToolExecution`, carrying the
    /// captured stdout and stderr so the CI log shows what the tool said.
    /// No retries: transient scanner failures are surfaced, not masked.
    pub async fn call(&self, args: &[String]) -> Result<String> {
        workflow::debug(&format!("invoking {} {}", self.binary.display(), args.join(" ")));
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| CodesecError::ToolExecution {
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn {}: {}", self.binary.display(), e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(CodesecError::ToolExecution {
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }
        Ok(stdout)
    }
}

/// Arguments for a dependency (SCA) scan of the current directory.
pub fn sca_scan_args(report: &str, eval_indirect: bool) -> Vec<String> {
    let mut args = vec![
        "sca".to_string(),
        "scan".to_string(),
        ".".to_string(),
        "-o".to_string(),
        report.to_string(),
        "-f".to_string(),
        "sarif".to_string(),
    ];
    if !eval_indirect {
        args.push("--eval-direct-only".to_string());
    }
    args
}

/// Arguments to refresh the dependency keyring before an SCA scan.
pub fn sca_keyring_args() -> Vec<String> {
    vec!["sca".to_string(), "keyring".to_string(), "pull".to_string()]
}

/// Arguments for a code (SAST) scan over compiled classes.
pub fn sast_scan_args(report: &str, classes: &str, sources: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "sast".to_string(),
        "scan".to_string(),
        "--verbose".to_string(),
        "--classes".to_string(),
        classes.to_string(),
    ];
    if let Some(sources) = sources {
        args.push("--sources".to_string());
        args.push(sources.to_string());
    }
    args.push("-o".to_string());
    args.push(report.to_string());
    args
}

/// Arguments for the compare sub-mode.
///
/// Requests both a GitHub-flavored markdown rendition (`<tool>.md`) and the
/// structured diff (`<tool>-compare.sarif`); `link` is the templated source
/// link the tool embeds, with `$FILENAME`/`$LINENUMBER` placeholders.
pub fn compare_args(tool: &str, old_report: &str, new_report: &str, link: &str) -> Vec<String> {
    let mut args = vec![
        tool.to_string(),
        "compare".to_string(),
        "--old".to_string(),
        old_report.to_string(),
        "--new".to_string(),
        new_report.to_string(),
        "-o".to_string(),
        format!("{}-compare.sarif", tool),
        "--markdown".to_string(),
        format!("{}.md", tool),
        "--markdown-variant".to_string(),
        "GitHub".to_string(),
        "--link".to_string(),
        link.to_string(),
        "--deployment".to_string(),
        "ci".to_string(),
    ];
    if workflow::is_debug() {
        args.push("--debug".to_string());
    }
    args
}

/// Arguments for the patch sub-mode generating a fix for one suggestion.
pub fn patch_args(sbom: &str, fix_id: &str) -> Vec<String> {
    vec![
        "sca".to_string(),
        "patch".to_string(),
        ".".to_string(),
        "--sbom".to_string(),
        sbom.to_string(),
        "--fix-id".to_string(),
        fix_id.to_string(),
        "-o".to_string(),
        PATCH_REPORT.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sca_scan_args_toggle_indirect() {
        let args = sca_scan_args(SCA_REPORT, true);
        assert_eq!(args, vec!["sca", "scan", ".", "-o", "sca.sarif", "-f", "sarif"]);

        let args = sca_scan_args(SCA_REPORT, false);
        assert_eq!(args.last().map(String::as_str), Some("--eval-direct-only"));
    }

    #[test]
    fn test_sast_scan_args_optional_sources() {
        let args = sast_scan_args(SAST_REPORT, "build/libs/app.jar", None);
        assert_eq!(
            args,
            vec!["sast", "scan", "--verbose", "--classes", "build/libs/app.jar", "-o", "sast.sarif"]
        );

        let args = sast_scan_args(SAST_REPORT, "app.jar", Some("src/main/java"));
        assert!(args.windows(2).any(|w| w == ["--sources", "src/main/java"]));
    }

    #[test]
    fn test_compare_args_request_both_outputs() {
        let args = compare_args(
            "sca",
            "results-old/sca.sarif",
            "results-new/sca.sarif",
            "https://github.com/acme/app/blob/abc123/$FILENAME#L$LINENUMBER",
        );
        assert!(args.windows(2).any(|w| w == ["-o", "sca-compare.sarif"]));
        assert!(args.windows(2).any(|w| w == ["--markdown", "sca.md"]));
        assert!(args.windows(2).any(|w| w == ["--old", "results-old/sca.sarif"]));
        assert!(args.windows(2).any(|w| w == ["--deployment", "ci"]));
    }

    #[test]
    fn test_patch_args() {
        let args = patch_args("sca.json", "F1");
        assert_eq!(
            args,
            vec!["sca", "patch", ".", "--sbom", "sca.json", "--fix-id", "F1", "-o", "patchSummary.md"]
        );
    }

    #[tokio::test]
    async fn test_call_surfaces_nonzero_exit() {
        let cli = ScannerCli::new("sh");
        let err = cli
            .call(&["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()])
            .await
            .unwrap_err();
        match err {
            CodesecError::ToolExecution { exit_code, stdout, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_call_returns_stdout_on_success() {
        let cli = ScannerCli::new("sh");
        let out = cli
            .call(&["-c".to_string(), "printf hello".to_string()])
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_call_spawn_failure() {
        let cli = ScannerCli::new("/nonexistent/scanner-binary");
        let err = cli.call(&["sca".to_string()]).await.unwrap_err();
        assert!(matches!(err, CodesecError::ToolExecution { exit_code: None, .. }));
    }
}
