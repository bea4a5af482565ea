//! Diffing two scan reports and rendering the new findings for humans.
//!
//! The heavy comparison semantics live in the scanner CLI's `compare`
//! sub-mode; this module shells out to it, then either forwards the
//! tool-rendered markdown fragment verbatim or, on the legacy path,
//! walks the structured diff and builds one `Issue` per added finding
//! and location.

use crate::error::Result;
use crate::github::RepoContext;
use crate::sarif::{self, Finding, Location, Run, SarifLog, NO_INFORMATION};
use crate::scanner::{self, ScannerCli};
use crate::workflow;
use std::collections::HashMap;
use std::path::Path;

/// A UI-ready record for one new finding at one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// One line, beginning with a clickable source link.
    pub summary: String,
    /// Optional multi-line elaboration, e.g. an example taint flow.
    pub details: Option<String>,
}

/// Per-tool comparison output.
#[derive(Debug, Clone)]
pub enum ToolReport {
    /// Markdown fragment rendered by the scanner CLI itself.
    Rendered(String),
    /// Structured diff rendered locally (legacy scanner versions).
    Issues(Vec<Issue>),
}

impl ToolReport {
    /// Whether this report carries anything worth telling the user about.
    pub fn has_content(&self) -> bool {
        match self {
            ToolReport::Rendered(fragment) => !fragment.trim().is_empty(),
            ToolReport::Issues(issues) => !issues.is_empty(),
        }
    }
}

/// The closed set of tool families with distinct rendering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Software composition analysis: findings keyed by rule catalog.
    Sca,
    /// Static application security testing: findings carry inline messages
    /// and example data flows.
    Sast,
}

impl ToolKind {
    pub fn parse(name: &str) -> Option<ToolKind> {
        match name.trim().to_lowercase().as_str() {
            "sca" => Some(ToolKind::Sca),
            "sast" => Some(ToolKind::Sast),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Sca => "sca",
            ToolKind::Sast => "sast",
        }
    }

    /// Name of the scan report file inside an artifact bundle.
    pub fn report_file(&self) -> &'static str {
        match self {
            ToolKind::Sca => scanner::SCA_REPORT,
            ToolKind::Sast => scanner::SAST_REPORT,
        }
    }

    fn message_for(&self, finding: &Finding, rules: &HashMap<String, String>) -> String {
        match self {
            ToolKind::Sast => finding
                .message
                .markdown
                .clone()
                .or_else(|| finding.message.text.clone())
                .unwrap_or_else(|| NO_INFORMATION.to_string()),
            ToolKind::Sca => finding
                .rule_id
                .as_ref()
                .and_then(|id| rules.get(id).cloned())
                .unwrap_or_else(|| NO_INFORMATION.to_string()),
        }
    }

    fn details_for(&self, ctx: &RepoContext, finding: &Finding) -> Option<String> {
        match self {
            ToolKind::Sast => render_example_flow(ctx, finding),
            ToolKind::Sca => Some(format!(
                "{}\n",
                finding.message.text.as_deref().unwrap_or(NO_INFORMATION)
            )),
        }
    }
}

/// Run the compare sub-mode for one tool and collect its output.
///
/// Prefers the fragment the tool rendered itself; falls back to rendering
/// the structured diff locally when only `<tool>-compare.sarif` appeared.
pub async fn compare_tool_results(
    cli: &ScannerCli,
    ctx: &RepoContext,
    kind: ToolKind,
    old_report: &Path,
    new_report: &Path,
) -> Result<ToolReport> {
    workflow::start_group(&format!("Comparing {} results", kind.name().to_uppercase()));
    let result = run_compare(cli, ctx, kind, old_report, new_report).await;
    workflow::end_group();
    result
}

async fn run_compare(
    cli: &ScannerCli,
    ctx: &RepoContext,
    kind: ToolKind,
    old_report: &Path,
    new_report: &Path,
) -> Result<ToolReport> {
    let markdown_file = format!("{}.md", kind.name());
    let sarif_file = format!("{}-compare.sarif", kind.name());
    // A leftover output from an earlier step must not be mistaken for this
    // run's result.
    remove_if_present(&[Path::new(&markdown_file), Path::new(&sarif_file)])?;

    let args = scanner::compare_args(
        kind.name(),
        &old_report.to_string_lossy(),
        &new_report.to_string_lossy(),
        &ctx.link_template(),
    );
    workflow::info(&cli.call(&args).await?);

    if Path::new(&markdown_file).exists() {
        let fragment = std::fs::read_to_string(&markdown_file)?;
        return Ok(ToolReport::Rendered(fragment));
    }

    if !Path::new(&sarif_file).exists() {
        // Tool produced neither output: nothing changed.
        workflow::info(&format!("No changes in {} issues", kind.name().to_uppercase()));
        return Ok(ToolReport::Rendered(String::new()));
    }

    let log = SarifLog::load(Path::new(&sarif_file))?;
    let issues = issues_from_diff(ctx, kind, &log);
    if issues.is_empty() {
        workflow::info(&format!("No changes in {} issues", kind.name().to_uppercase()));
    } else {
        // Logged as a build-log error, but the step still succeeds under
        // the current leniency policy. Callers decide what to do with the
        // returned issues.
        workflow::error(&format!(
            "{} new {} issues were introduced, see above in the logs for details",
            issues.len(),
            kind.name().to_uppercase()
        ));
    }
    Ok(ToolReport::Issues(issues))
}

/// Delete the given files when they exist; a missing file is fine.
fn remove_if_present(paths: &[&Path]) -> Result<()> {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Walk a structured diff and build issues for every `added` finding.
pub fn issues_from_diff(ctx: &RepoContext, kind: ToolKind, log: &SarifLog) -> Vec<Issue> {
    let mut issues = Vec::new();
    for run in &log.runs {
        if run.results.is_empty() {
            continue;
        }
        workflow::info(&format!(
            "There were changes in {} results from {}",
            run.results.len(),
            run.tool.driver.name
        ));
        issues.extend(issues_from_run(ctx, kind, run));
    }
    issues
}

fn issues_from_run(ctx: &RepoContext, kind: ToolKind, run: &Run) -> Vec<Issue> {
    let rules = match kind {
        ToolKind::Sca => sarif::rule_descriptions(run),
        ToolKind::Sast => HashMap::new(),
    };

    let mut issues = Vec::new();
    for finding in &run.results {
        if finding.status() != Some("added") {
            continue;
        }
        let message = kind.message_for(finding, &rules);
        let details = kind.details_for(ctx, finding);
        if finding.locations.is_empty() {
            issues.push(Issue {
                summary: format!("Unknown location: {}", message),
                details,
            });
            continue;
        }
        for location in &finding.locations {
            issues.push(Issue {
                summary: format!("{}: {}", render_location(ctx, location), message),
                details: details.clone(),
            });
        }
    }
    issues
}

/// `[file:start(-end)](…/blob/<sha>/<path>#Lstart(-Lend))`, or the literal
/// `Unknown location` when the location has no usable file and line.
pub fn render_location(ctx: &RepoContext, location: &Location) -> String {
    let physical = location.physical_location.as_ref();
    let uri = physical
        .and_then(|p| p.artifact_location.as_ref())
        .and_then(|a| a.uri.as_deref());
    let region = physical.and_then(|p| p.region.as_ref());
    let start_line = region.and_then(|r| r.start_line);

    let (Some(uri), Some(start_line)) = (uri, start_line) else {
        return "Unknown location".to_string();
    };

    let file = strip_file_scheme(uri);
    let name = file.rsplit('/').next().unwrap_or(file);
    let end_line = region.and_then(|r| r.end_line);
    let text = match end_line {
        Some(end) => format!("{}:{}-{}", name, start_line, end),
        None => format!("{}:{}", name, start_line),
    };
    format!("[{}]({})", text, ctx.blob_url(file, start_line, end_line))
}

/// Drop a `file://`-style scheme prefix, however many slashes it carries.
fn strip_file_scheme(uri: &str) -> &str {
    match uri.strip_prefix("file:") {
        Some(rest) => rest.trim_start_matches('/'),
        None => uri,
    }
}

/// Render the first recorded example data-flow path of a SAST finding.
fn render_example_flow(ctx: &RepoContext, finding: &Finding) -> Option<String> {
    let flow = finding
        .code_flows
        .first()
        .and_then(|cf| cf.thread_flows.first())?;
    let mut details = String::from("Example problematic flow of data:\n\n");
    for flow_location in &flow.locations {
        let location = flow_location.location.as_ref();
        match location {
            Some(loc) => {
                details.push_str(&format!("  * {}", render_location(ctx, loc)));
                if let Some(step) = loc.message.as_ref().and_then(|m| m.text.as_deref()) {
                    details.push_str(&format!(": {}", step));
                }
            }
            None => details.push_str("  * Unknown location"),
        }
        details.push('\n');
    }
    Some(details)
}

/// Assemble the combined PR comment body from every tool's report.
///
/// Returns `None` when no tool has anything to report, in which case any
/// stale comment should be resolved instead.
pub fn build_comment_body(
    reports: &[(ToolKind, ToolReport)],
    footer: Option<&str>,
) -> Option<String> {
    if !reports.iter().any(|(_, r)| r.has_content()) {
        return None;
    }
    let mut body = String::from("CodeSec analysis found potential new issues in this PR.");
    for (kind, report) in reports {
        if !report.has_content() {
            continue;
        }
        match report {
            ToolReport::Rendered(fragment) => {
                body.push_str("\n\n");
                body.push_str(fragment.trim_end());
            }
            ToolReport::Issues(issues) => {
                body.push_str(&format!(
                    "\n\n<details><summary>{} found {} potential new issues</summary>\n\n",
                    kind.name(),
                    issues.len()
                ));
                for issue in issues {
                    body.push_str(&format!("* {}\n", issue.summary));
                    if let Some(details) = &issue.details {
                        let indented = details.replace('\n', "\n  ");
                        body.push_str(&format!(
                            "  <details><summary>More details</summary>\n  {}\n  </details>\n",
                            indented
                        ));
                    }
                }
                body.push_str("\n</details>");
            }
        }
    }
    if let Some(footer) = footer {
        body.push_str("\n\n");
        body.push_str(footer);
    }
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::RepoContext;

    fn ctx() -> RepoContext {
        RepoContext {
            server_url: "https://github.com".to_string(),
            api_url: "https://api.github.com".to_string(),
            owner: "acme".to_string(),
            repo: "app".to_string(),
            sha: "abc123".to_string(),
            pr_number: Some(7),
            head_ref: None,
            ref_name: Some("main".to_string()),
        }
    }

    fn diff_log(json: &str) -> SarifLog {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_no_added_findings_yields_no_issues() {
        let log = diff_log(
            r#"{"runs": [{
                "tool": {"driver": {"name": "sca"}},
                "results": [
                    {"ruleId": "CVE-1", "message": {"text": "gone"}, "properties": {"status": "removed"}},
                    {"ruleId": "CVE-2", "message": {"text": "still here"}}
                ]
            }]}"#,
        );
        assert!(issues_from_diff(&ctx(), ToolKind::Sca, &log).is_empty());
    }

    #[test]
    fn test_one_issue_per_location() {
        let log = diff_log(
            r#"{"runs": [{
                "tool": {"driver": {"name": "sast"}},
                "results": [{
                    "message": {"text": "tainted input"},
                    "properties": {"status": "added"},
                    "locations": [
                        {"physicalLocation": {"artifactLocation": {"uri": "src/a.py"}, "region": {"startLine": 1}}},
                        {"physicalLocation": {"artifactLocation": {"uri": "src/b.py"}, "region": {"startLine": 2}}}
                    ]
                }]
            }]}"#,
        );
        let issues = issues_from_diff(&ctx(), ToolKind::Sast, &log);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].summary.contains("a.py:1"));
        assert!(issues[1].summary.contains("b.py:2"));
    }

    #[test]
    fn test_finding_without_location_gets_synthetic_issue() {
        let log = diff_log(
            r#"{"runs": [{
                "tool": {"driver": {"name": "sast"}},
                "results": [{"message": {}, "properties": {"status": "added"}}]
            }]}"#,
        );
        let issues = issues_from_diff(&ctx(), ToolKind::Sast, &log);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].summary,
            format!("Unknown location: {}", NO_INFORMATION)
        );
    }

    #[test]
    fn test_sast_message_prefers_markdown() {
        let finding: Finding = serde_json::from_str(
            r#"{"message": {"text": "plain", "markdown": "**rich**"}}"#,
        )
        .unwrap();
        assert_eq!(
            ToolKind::Sast.message_for(&finding, &HashMap::new()),
            "**rich**"
        );
    }

    #[test]
    fn test_sca_unknown_rule_gets_placeholder() {
        let log = diff_log(
            r#"{"runs": [{
                "tool": {"driver": {"name": "sca", "rules": [
                    {"id": "CVE-1", "shortDescription": {"text": "Known vuln"}}
                ]}},
                "results": [
                    {"ruleId": "CVE-1", "message": {"text": "upgrade foo"}, "properties": {"status": "added"},
                     "locations": [{"physicalLocation": {"artifactLocation": {"uri": "pom.xml"}, "region": {"startLine": 3}}}]},
                    {"ruleId": "CVE-UNKNOWN", "message": {"text": "upgrade bar"}, "properties": {"status": "added"},
                     "locations": [{"physicalLocation": {"artifactLocation": {"uri": "pom.xml"}, "region": {"startLine": 9}}}]}
                ]
            }]}"#,
        );
        let issues = issues_from_diff(&ctx(), ToolKind::Sca, &log);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].summary.ends_with("Known vuln"));
        assert!(issues[1].summary.ends_with(NO_INFORMATION));
        // SCA details carry the finding's own message text.
        assert_eq!(issues[0].details.as_deref(), Some("upgrade foo\n"));
    }

    #[test]
    fn test_render_location_strips_file_scheme() {
        let location: Location = serde_json::from_str(
            r#"{"physicalLocation": {
                "artifactLocation": {"uri": "file:///work/src/a.py"},
                "region": {"startLine": 10, "endLine": 12}
            }}"#,
        )
        .unwrap();
        assert_eq!(
            render_location(&ctx(), &location),
            "[a.py:10-12](https://github.com/acme/app/blob/abc123/work/src/a.py#L10-L12)"
        );
    }

    #[test]
    fn test_render_location_without_line_is_unknown() {
        let location: Location = serde_json::from_str(
            r#"{"physicalLocation": {"artifactLocation": {"uri": "src/a.py"}}}"#,
        )
        .unwrap();
        assert_eq!(render_location(&ctx(), &location), "Unknown location");
    }

    #[test]
    fn test_sast_example_flow_rendering() {
        let finding: Finding = serde_json::from_str(
            r#"{
                "message": {"text": "sql injection"},
                "codeFlows": [{"threadFlows": [{"locations": [
                    {"location": {
                        "physicalLocation": {"artifactLocation": {"uri": "src/db.py"}, "region": {"startLine": 4}},
                        "message": {"text": "user input enters here"}
                    }},
                    {"location": {
                        "physicalLocation": {"artifactLocation": {"uri": "src/db.py"}, "region": {"startLine": 19}},
                        "message": {"text": "query executed"}
                    }}
                ]}]}]
            }"#,
        )
        .unwrap();
        let details = ToolKind::Sast.details_for(&ctx(), &finding).unwrap();
        assert!(details.starts_with("Example problematic flow of data:\n\n"));
        assert!(details.contains("db.py:4"));
        assert!(details.contains(": user input enters here\n"));
        assert!(details.contains(": query executed\n"));
    }

    #[test]
    fn test_sast_without_flow_has_no_details() {
        let finding = Finding::default();
        assert_eq!(ToolKind::Sast.details_for(&ctx(), &finding), None);
    }

    // End-to-end scenario: the old report's finding is unchanged, the new
    // report adds one finding at src/a.py:10-12. Exactly one bullet.
    #[test]
    fn test_comment_body_single_new_finding() {
        let log = diff_log(
            r#"{"runs": [{
                "tool": {"driver": {"name": "sast"}},
                "results": [
                    {"ruleId": "R1", "message": {"text": "old issue"}},
                    {"ruleId": "R2", "message": {"text": "fresh issue"}, "properties": {"status": "added"},
                     "locations": [{"physicalLocation": {
                        "artifactLocation": {"uri": "src/a.py"},
                        "region": {"startLine": 10, "endLine": 12}
                     }}]}
                ]
            }]}"#,
        );
        let issues = issues_from_diff(&ctx(), ToolKind::Sast, &log);
        let body =
            build_comment_body(&[(ToolKind::Sast, ToolReport::Issues(issues))], None).unwrap();
        assert_eq!(body.matches("* [").count(), 1);
        assert!(body.contains("a.py:10-12"));
        assert!(body.contains("sast found 1 potential new issues"));
    }

    #[test]
    fn test_comment_body_none_when_nothing_to_report() {
        let reports = vec![
            (ToolKind::Sca, ToolReport::Issues(Vec::new())),
            (ToolKind::Sast, ToolReport::Rendered("  \n".to_string())),
        ];
        assert!(build_comment_body(&reports, None).is_none());
    }

    #[test]
    fn test_comment_body_appends_footer_and_fragment() {
        let reports = vec![(
            ToolKind::Sca,
            ToolReport::Rendered("### sca\n\n* something new\n".to_string()),
        )];
        let body = build_comment_body(&reports, Some("_scanned by codesec_")).unwrap();
        assert!(body.contains("### sca"));
        assert!(body.ends_with("_scanned by codesec_"));
    }

    #[test]
    fn test_remove_if_present_clears_stale_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let stale_md = dir.path().join("sca.md");
        let fresh_sarif = dir.path().join("sca-compare.sarif");
        let never_existed = dir.path().join("sast.md");
        std::fs::write(&stale_md, "## stale fragment from an earlier step\n").unwrap();
        std::fs::write(&fresh_sarif, "{}").unwrap();

        remove_if_present(&[&stale_md, &fresh_sarif, &never_existed]).unwrap();
        assert!(!stale_md.exists());
        assert!(!fresh_sarif.exists());
        assert!(!never_existed.exists());
    }

    #[test]
    fn test_tool_kind_parse_case_insensitive() {
        assert_eq!(ToolKind::parse(" SCA "), Some(ToolKind::Sca));
        assert_eq!(ToolKind::parse("Sast"), Some(ToolKind::Sast));
        assert_eq!(ToolKind::parse("iac"), None);
    }
}
