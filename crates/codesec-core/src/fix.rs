//! Auto-fix orchestration: one branch and one PR per fix suggestion.
//!
//! The scanner's `patch` sub-mode rewrites the working tree and emits
//! `patchSummary.md`, a small fixed-shape document: the first line is a
//! markdown heading with the patch title, and a
//! `## Files that have been modified:` section lists the touched paths as
//! bullets. Each fix gets a deterministic branch regenerated from scratch
//! and force-pushed; an already-open PR for that branch only has its title
//! refreshed.

use crate::error::{CodesecError, Result};
use crate::git::Git;
use crate::github::{GitHubClient, RepoContext};
use crate::scanner::{self, ScannerCli};
use crate::workflow;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

const MODIFIED_FILES_HEADING: &str = "## Files that have been modified:";

/// Machine-readable fix suggestions emitted by the scanner (LWJSON).
#[derive(Debug, Clone, Deserialize)]
pub struct FixSuggestionDoc {
    #[serde(rename = "FixSuggestions", default)]
    pub fix_suggestions: Vec<FixSuggestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixSuggestion {
    #[serde(rename = "FixId")]
    pub fix_id: String,
}

impl FixSuggestionDoc {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CodesecError::malformed(path, e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| CodesecError::malformed(path, e.to_string()))
    }
}

/// Parsed `patchSummary.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    /// First line of the document, heading markers stripped.
    pub title: String,
    /// Paths listed under the modified-files section.
    pub files: Vec<String>,
    /// The full document, used verbatim as the PR body.
    pub body: String,
}

impl PatchSummary {
    /// Parse the patch-summary mini-format, rejecting unexpected shapes.
    pub fn parse(path: &Path, raw: &str) -> Result<PatchSummary> {
        let mut lines = raw.lines();
        let title = lines
            .next()
            .map(|l| l.trim_start_matches('#').trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CodesecError::malformed(path, "missing title line"))?;

        let mut files = Vec::new();
        let mut in_section = false;
        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed == MODIFIED_FILES_HEADING {
                in_section = true;
                continue;
            }
            if in_section {
                if trimmed.starts_with("##") {
                    break;
                }
                if let Some(entry) = trimmed.strip_prefix('-').or_else(|| trimmed.strip_prefix('*')) {
                    let entry = entry.trim();
                    if !entry.is_empty() {
                        files.push(entry.to_string());
                    }
                }
            }
        }
        if !in_section {
            return Err(CodesecError::malformed(
                path,
                format!("missing `{}` section", MODIFIED_FILES_HEADING),
            ));
        }
        if files.is_empty() {
            return Err(CodesecError::malformed(path, "modified-files section is empty"));
        }
        Ok(PatchSummary {
            title: title.to_string(),
            files,
            body: raw.to_string(),
        })
    }
}

/// Deterministic branch name for one fix: `codesec/<tool>/<branch>/<slug>`.
pub fn fix_branch_name(tool: &str, current_branch: &str, title: &str) -> String {
    format!("codesec/{}/{}/{}", tool, current_branch, slugify_title(title))
}

/// Collapse runs of non-alphanumerics to `_`, trim trailing separators and
/// punctuation. Deterministic so re-runs land on the same branch.
fn slugify_title(title: &str) -> String {
    let separators = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    let slug = separators.replace_all(title.trim(), "_");
    slug.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Create or refresh fix branches and PRs for every suggestion in the
/// document. A failure on one fix id is logged and the rest continue; the
/// number of successfully processed fixes is returned.
pub async fn create_fix_prs(
    cli: &ScannerCli,
    client: &GitHubClient,
    ctx: &RepoContext,
    suggestions_file: &Path,
) -> Result<usize> {
    let doc = FixSuggestionDoc::load(suggestions_file)?;
    if doc.fix_suggestions.is_empty() {
        workflow::info("No fix suggestions to process");
        return Ok(0);
    }

    let git = Git::new(".");
    git.configure_identity("CodeSec Bot", "codesec-eng@lacework.com").await?;

    let mut processed = 0;
    for suggestion in &doc.fix_suggestions {
        match pr_for_fix_suggestion(cli, client, ctx, &git, suggestions_file, &suggestion.fix_id)
            .await
        {
            Ok(()) => processed += 1,
            Err(e) => workflow::error(&format!(
                "Failed to create fix PR for {}: {}",
                suggestion.fix_id, e
            )),
        }
    }
    Ok(processed)
}

/// Drive one fix suggestion through patch, branch, commit, push and PR.
pub async fn pr_for_fix_suggestion(
    cli: &ScannerCli,
    client: &GitHubClient,
    ctx: &RepoContext,
    git: &Git,
    suggestions_file: &Path,
    fix_id: &str,
) -> Result<()> {
    let current_branch = ctx.current_branch()?;

    let sbom = suggestions_file.to_string_lossy();
    let patch_output = cli.call(&scanner::patch_args(&sbom, fix_id)).await?;
    workflow::info(&patch_output);

    let patch_path = Path::new(scanner::PATCH_REPORT);
    let raw = std::fs::read_to_string(patch_path)
        .map_err(|e| CodesecError::malformed(patch_path, e.to_string()))?;
    let summary = PatchSummary::parse(patch_path, &raw)?;
    let new_branch = fix_branch_name("sca", &current_branch, &summary.title);

    git.checkout_fresh_branch(&new_branch).await?;
    // The original branch is restored on every exit path from here on.
    let result = commit_and_open_pr(client, ctx, git, &current_branch, &new_branch, &summary).await;
    let restored = git.checkout(&current_branch).await;
    result.and(restored)
}

async fn commit_and_open_pr(
    client: &GitHubClient,
    ctx: &RepoContext,
    git: &Git,
    base_branch: &str,
    new_branch: &str,
    summary: &PatchSummary,
) -> Result<()> {
    git.add(&summary.files).await?;
    git.commit(&format!("Fix for: {}.", new_branch)).await?;
    git.push_force(new_branch).await?;

    let open_prs = client.open_prs_for_branch(ctx, new_branch).await?;
    if open_prs.is_empty() {
        let pr = client
            .create_pr(ctx, new_branch, base_branch, &summary.title, &summary.body)
            .await?;
        workflow::info(&format!("Opened fix PR #{} for {}", pr.number, new_branch));
    } else {
        for pr in &open_prs {
            client.update_pr_title(ctx, pr.number, &summary.title).await?;
            workflow::info(&format!("Refreshed title of fix PR #{}", pr.number));
        }
    }
    Ok(())
}
