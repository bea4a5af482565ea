//! Process-wide telemetry, collected into an explicit context object and
//! flushed exactly once at exit.
//!
//! Delivery is best-effort: a missing endpoint or a failed POST is logged
//! at debug level and never affects the primary outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One recorded phase with its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: String,
    pub tools: Vec<String>,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accumulated record for one action invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Telemetry {
    pub version: String,
    pub repository: String,
    pub started_at: DateTime<Utc>,
    pub phases: Vec<PhaseRecord>,
}

impl Telemetry {
    pub fn new(repository: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            repository: repository.to_string(),
            started_at: Utc::now(),
            phases: Vec::new(),
        }
    }

    /// Record a completed phase. `error` carries the message when the phase
    /// was caught at the top level.
    pub fn record_phase(
        &mut self,
        phase: &str,
        tools: &[String],
        started: DateTime<Utc>,
        error: Option<String>,
    ) {
        self.phases.push(PhaseRecord {
            phase: phase.to_string(),
            tools: tools.to_vec(),
            duration_ms: (Utc::now() - started).num_milliseconds(),
            error,
        });
    }

    /// Ship the record, consuming the collector so it cannot flush twice.
    ///
    /// Posts to `CODESEC_TELEMETRY_URL` when configured; any failure is
    /// swallowed after a debug log.
    pub async fn flush(self) {
        let payload = match serde_json::to_string(&self) {
            Ok(p) => p,
            Err(e) => {
                crate::workflow::debug(&format!("telemetry serialization failed: {}", e));
                return;
            }
        };
        crate::workflow::debug(&format!("telemetry: {}", payload));

        let Some(endpoint) = crate::workflow::optional_env("CODESEC_TELEMETRY_URL") else {
            return;
        };
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
        {
            Ok(c) => c,
            Err(e) => {
                crate::workflow::debug(&format!("telemetry client build failed: {}", e));
                return;
            }
        };
        if let Err(e) = client
            .post(&endpoint)
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await
        {
            crate::workflow::debug(&format!("telemetry delivery failed: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_records_accumulate() {
        let mut telemetry = Telemetry::new("acme/app");
        let started = Utc::now();
        telemetry.record_phase("analysis", &["sca".to_string()], started, None);
        telemetry.record_phase(
            "display",
            &["sca".to_string(), "sast".to_string()],
            started,
            Some("scanner invocation failed".to_string()),
        );

        assert_eq!(telemetry.phases.len(), 2);
        assert_eq!(telemetry.phases[0].phase, "analysis");
        assert!(telemetry.phases[0].error.is_none());
        assert_eq!(
            telemetry.phases[1].error.as_deref(),
            Some("scanner invocation failed")
        );
        assert!(telemetry.phases[1].duration_ms >= 0);
    }

    #[test]
    fn test_serialized_record_omits_absent_error() {
        let mut telemetry = Telemetry::new("acme/app");
        telemetry.record_phase("display", &[], Utc::now(), None);
        let json = serde_json::to_value(&telemetry).unwrap();
        assert_eq!(json["repository"], "acme/app");
        assert!(json["phases"][0].get("error").is_none());
    }
}
