//! SARIF 2.1.0 data model — the subset the scanner CLI emits.
//!
//! Only the fields the comparison and reporting pipeline reads are modeled;
//! everything else in a report is ignored on deserialization. The
//! comparison sub-mode annotates findings with a `status` property
//! (`added`/`removed`) in the result's property bag.

use crate::error::{CodesecError, Result};
use crate::workflow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A complete SARIF log: one or more analysis runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SarifLog {
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// A single analysis run tied to one tool driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub tool: Tool,
    #[serde(default)]
    pub results: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub driver: Driver,
}

/// Tool driver metadata, including the rule catalog when the tool ships one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<MessageText>,
}

/// A message carrying plain text and optionally a markdown rendition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// One reported issue instance within a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default)]
    pub message: MessageText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_flows: Vec<CodeFlow>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Finding {
    /// Comparison-derived status (`added`/`removed`), when present.
    pub fn status(&self) -> Option<&str> {
        self.properties.get("status").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_location: Option<PhysicalLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u64>,
}

/// An example data-flow path explaining a taint-style finding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFlow {
    #[serde(default)]
    pub thread_flows: Vec<ThreadFlow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadFlow {
    #[serde(default)]
    pub locations: Vec<FlowLocation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl SarifLog {
    /// Read and parse a SARIF file from disk.
    pub fn load(path: &Path) -> Result<SarifLog> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CodesecError::malformed(path, e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| CodesecError::malformed(path, e.to_string()))
    }
}

/// Build the rule-id to short-description map from a run's rule catalog.
/// Rules without a short description get the placeholder text so lookups
/// never fall through to an error.
pub fn rule_descriptions(run: &Run) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for rule in &run.tool.driver.rules {
        let description = rule
            .short_description
            .as_ref()
            .and_then(|d| d.text.clone())
            .unwrap_or_else(|| NO_INFORMATION.to_string());
        map.insert(rule.id.clone(), description);
    }
    map
}

/// Placeholder used whenever a finding or rule carries no usable text.
pub const NO_INFORMATION: &str = "No information available on alert";

/// Log a human-readable summary of a single scan's results.
///
/// Operator visibility only; callers never branch on this.
pub fn print_results(tool: &str, sarif_file: &Path) -> Result<()> {
    workflow::start_group(&format!("Results for {}", tool.to_uppercase()));
    let log = SarifLog::load(sarif_file);
    let log = match log {
        Ok(log) => log,
        Err(e) => {
            workflow::end_group();
            return Err(e);
        }
    };

    let mut found_something = false;
    for run in &log.runs {
        if !run.results.is_empty() {
            found_something = true;
            workflow::info(&format!(
                "Found {} results using {}",
                run.results.len(),
                run.tool.driver.name
            ));
            for finding in &run.results {
                match serde_json::to_string_pretty(finding) {
                    Ok(pretty) => workflow::info(&pretty),
                    Err(e) => workflow::debug(&format!("could not serialize finding: {}", e)),
                }
            }
        }
    }
    if !found_something {
        workflow::info(&format!("No {} issues were found", tool.to_uppercase()));
    }
    workflow::end_group();
    Ok(())
}
