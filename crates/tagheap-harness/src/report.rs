//! Report generation.

use serde::Serialize;

use crate::error::HarnessError;
use crate::runner::VerificationResult;

/// Machine-readable summary of a harness run.
#[derive(Debug, Clone, Serialize)]
pub struct ConformanceReport {
    /// Campaign label from the runner.
    pub campaign: String,
    /// Workload family from the fixture.
    pub family: String,
    /// Cases replayed.
    pub total: usize,
    /// Cases with no violation.
    pub passed: usize,
    /// Cases that hit a violation.
    pub failed: usize,
    /// Per-case outcomes.
    pub results: Vec<VerificationResult>,
}

impl ConformanceReport {
    /// Builds a report from per-case results.
    #[must_use]
    pub fn new(
        campaign: impl Into<String>,
        family: impl Into<String>,
        results: Vec<VerificationResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            campaign: campaign.into(),
            family: family.into(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    /// True when no case failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Renders a human-readable summary, one line per case.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "campaign {} / family {}: {}/{} cases passed\n",
            self.campaign, self.family, self.passed, self.total
        );
        for result in &self.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "  [{status}] {} ({} ops)",
                result.case_name, result.ops_executed
            ));
            if let Some(failure) = &result.failure {
                out.push_str(&format!(": {failure}"));
            }
            out.push('\n');
        }
        out
    }
}
