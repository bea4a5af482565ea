//! The two mutually exclusive phases of the action.
//!
//! Analysis runs the scanners against the checked-out tree and uploads the
//! reports; display downloads the two bundles produced by the base and
//! head analysis jobs, diffs them and reports new findings on the PR.

use crate::display;
use crate::inputs::Inputs;
use anyhow::{Context, Result};
use codesec_core::artifacts::ArtifactStore;
use codesec_core::scanner::{self, SCA_REPORT, SAST_REPORT};
use codesec_core::workflow;
use codesec_core::{compare, fix, CodesecError, GitHubClient, RepoContext, ScannerCli, ToolKind};
use std::path::{Path, PathBuf};

/// Parse the comma-separated `tools` input, case-insensitively.
/// Unrecognized names are logged and skipped rather than failing the run.
pub fn parse_tools(tools: &str) -> Vec<ToolKind> {
    tools
        .split(',')
        .filter(|t| !t.trim().is_empty())
        .filter_map(|t| match ToolKind::parse(t) {
            Some(kind) => Some(kind),
            None => {
                workflow::error(&format!("Unknown tool `{}`, skipping", t.trim()));
                None
            }
        })
        .collect()
}

/// Tools whose scan report is present in both downloaded bundles.
/// A report missing on either side silently skips that tool.
pub fn tools_with_both_reports(old_dir: &Path, new_dir: &Path) -> Vec<ToolKind> {
    [ToolKind::Sca, ToolKind::Sast]
        .into_iter()
        .filter(|kind| {
            old_dir.join(kind.report_file()).exists() && new_dir.join(kind.report_file()).exists()
        })
        .collect()
}

/// Analysis phase: scan the current tree and upload the reports.
pub async fn run_analysis(
    inputs: &Inputs,
    ctx: &RepoContext,
    store: &dyn ArtifactStore,
    target: &str,
) -> Result<()> {
    display::banner(&format!("Analyzing {}", target));
    let cli = ScannerCli::new(&inputs.scanner_path);
    let tools = parse_tools(&inputs.tools);
    let mut to_upload: Vec<PathBuf> = Vec::new();

    for kind in &tools {
        match kind {
            ToolKind::Sca => {
                cli.call(&scanner::sca_keyring_args())
                    .await
                    .context("dependency keyring fetch failed")?;
                let output = cli
                    .call(&scanner::sca_scan_args(SCA_REPORT, inputs.eval_indirect))
                    .await?;
                workflow::info(&output);
                codesec_core::sarif::print_results("sca", Path::new(SCA_REPORT))?;
                to_upload.push(PathBuf::from(SCA_REPORT));
            }
            ToolKind::Sast => {
                let classes = inputs
                    .classes
                    .as_deref()
                    .ok_or_else(|| CodesecError::MissingInput("jar".to_string()))?;
                let output = cli
                    .call(&scanner::sast_scan_args(
                        SAST_REPORT,
                        classes,
                        inputs.sources.as_deref(),
                    ))
                    .await?;
                workflow::info(&output);
                codesec_core::sarif::print_results("sast", Path::new(SAST_REPORT))?;
                to_upload.push(PathBuf::from(SAST_REPORT));
            }
        }
    }

    store.upload(&format!("results-{}", target), &to_upload)?;

    if let Some(suggestions) = &inputs.fix_suggestions {
        match &inputs.token {
            Some(token) => {
                let client = GitHubClient::new(token, &ctx.api_url)?;
                let processed =
                    fix::create_fix_prs(&cli, &client, ctx, Path::new(suggestions)).await?;
                display::outcome(&format!("Processed {} fix suggestion(s)", processed));
            }
            None => workflow::info("No token supplied, skipping fix suggestion PRs"),
        }
    }

    workflow::set_output(&format!("{}-completed", target), "true")?;
    display::outcome(&format!("Analysis of {} completed", target));
    Ok(())
}

/// Display phase: diff the two bundles and publish or resolve the comment.
pub async fn run_display(
    inputs: &Inputs,
    ctx: &RepoContext,
    store: &dyn ArtifactStore,
) -> Result<()> {
    display::banner("Displaying results");
    let old_dir = Path::new("results-old");
    let new_dir = Path::new("results-new");
    store.download("results-old", old_dir)?;
    store.download("results-new", new_dir)?;

    let cli = ScannerCli::new(&inputs.scanner_path);
    let mut reports = Vec::new();
    for kind in tools_with_both_reports(old_dir, new_dir) {
        let report = compare::compare_tool_results(
            &cli,
            ctx,
            kind,
            &old_dir.join(kind.report_file()),
            &new_dir.join(kind.report_file()),
        )
        .await?;
        reports.push((kind, report));
    }

    let body = compare::build_comment_body(&reports, inputs.footer.as_deref());
    match (&body, &inputs.token) {
        (Some(body), Some(token)) => {
            workflow::info("Posting comment to GitHub PR as there were new issues introduced:");
            workflow::info(body);
            let client = GitHubClient::new(token, &ctx.api_url)?;
            if let Some(url) = client.post_comment_if_in_pr(ctx, body).await? {
                workflow::set_output("posted-comment", &url)?;
            }
        }
        (Some(_), None) => {
            workflow::info("New issues found but no token supplied, not commenting");
        }
        (None, Some(token)) => {
            let client = GitHubClient::new(token, &ctx.api_url)?;
            client.resolve_existing_comment_if_found(ctx).await?;
        }
        (None, None) => {}
    }

    workflow::set_output("display-completed", "true")?;
    display::outcome("Display completed");
    Ok(())
}
