//! Report generation for suite results.

use libio_runtime::MetricsSnapshot;
use serde::{Deserialize, Serialize};

use crate::verify::VerificationSummary;

/// Suite results plus the stream counters observed during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub title: String,
    pub seed: u64,
    pub timestamp: String,
    pub summary: VerificationSummary,
    #[serde(skip_deserializing)]
    pub metrics: Option<MetricsSnapshot>,
}

impl ConformanceReport {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Seed: {:#x}\n", self.seed));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Total: {}\n", self.summary.total));
        out.push_str(&format!("- Passed: {}\n", self.summary.passed));
        out.push_str(&format!("- Failed: {}\n\n", self.summary.failed));

        out.push_str("| Case | Interface | Status |\n");
        out.push_str("|------|-----------|--------|\n");
        for r in &self.summary.results {
            let status = if r.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                r.case_name, r.reference, status
            ));
        }

        let failures: Vec<_> = self.summary.results.iter().filter(|r| !r.passed).collect();
        if !failures.is_empty() {
            out.push_str("\n## Failures\n");
            for r in failures {
                out.push_str(&format!("\n### {}\n\n```\n", r.case_name));
                match &r.diff {
                    Some(diff) => out.push_str(diff),
                    None => out.push_str(&r.actual),
                }
                out.push_str("\n```\n");
            }
        }

        if let Some(m) = &self.metrics {
            out.push_str(&format!("\n## Counters\n\n```\n{m}\n```\n"));
        }
        out
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
