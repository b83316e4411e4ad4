//! Run report persisted after a successful deployment sequence.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageReport {
    pub index: usize,
    pub tag: String,
    pub address: String,
    /// Liveness attempt on which the instance became ready.
    pub readiness_attempts: u32,
    /// Probes that passed, in execution order. Empty for the first stage.
    pub probes: Vec<String>,
    /// Tag of the version stopped at the end of this stage.
    pub retired: Option<String>,
    pub duration_ms: u64,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub schema_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    /// Version left serving traffic.
    pub final_tag: String,
}

impl RunReport {
    pub const SCHEMA_VERSION: &'static str = "zdt.run_report.v1";

    pub fn probes_run(&self) -> usize {
        self.stages.iter().map(|s| s.probes.len()).sum()
    }

    pub fn retired_tags(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|s| s.retired.as_deref())
            .collect()
    }
}

/// Write the run report as pretty JSON.
pub fn write_run_report_json(path: &Path, report: &RunReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
