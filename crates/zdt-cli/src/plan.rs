//! Run plan: the version sequence and readiness policy for one `zdt run`.
//!
//! ```json
//! {
//!   "versions": [{"tag": "v1", "port": 8081}, {"tag": "v2", "port": 8082}],
//!   "readiness": {"max_attempts": 5, "interval_secs": 5}
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use zdt_core::{ReadinessPolicy, VersionSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    #[serde(default)]
    pub versions: Vec<VersionSpec>,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
}

impl RunPlan {
    /// Load a plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run plan {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid run plan {}", path.display()))
    }

    /// Apply command-line overrides. Versions given on the command line
    /// replace the plan's sequence entirely.
    pub fn with_overrides(
        mut self,
        versions: Vec<VersionSpec>,
        attempts: Option<u32>,
        interval_secs: Option<u64>,
    ) -> Self {
        if !versions.is_empty() {
            self.versions = versions;
        }
        if let Some(n) = attempts {
            self.readiness.max_attempts = n;
        }
        if let Some(secs) = interval_secs {
            self.readiness.interval = Duration::from_secs(secs);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_plan(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("plan.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_full_plan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plan(
            &dir,
            r#"{
                "versions": [{"tag": "v1", "port": 8081}, {"tag": "v2", "port": 8082}],
                "readiness": {"max_attempts": 3, "interval_secs": 1}
            }"#,
        );

        let plan = RunPlan::load(&path).unwrap();
        assert_eq!(
            plan.versions,
            vec![VersionSpec::new("v1", 8081), VersionSpec::new("v2", 8082)]
        );
        assert_eq!(plan.readiness, ReadinessPolicy::new(3, Duration::from_secs(1)));
    }

    #[test]
    fn test_missing_readiness_uses_default_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plan(&dir, r#"{"versions": [{"tag": "v1", "port": 8081}]}"#);

        let plan = RunPlan::load(&path).unwrap();
        assert_eq!(plan.readiness, ReadinessPolicy::default());
    }

    #[test]
    fn test_invalid_plan_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plan(&dir, r#"{"versions": [{"tag": "v1"}]}"#);

        let err = RunPlan::load(&path).unwrap_err();
        assert!(format!("{}", err).contains("plan.json"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RunPlan::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_command_line_versions_replace_plan() {
        let plan = RunPlan {
            versions: vec![VersionSpec::new("v1", 8081)],
            readiness: ReadinessPolicy::default(),
        }
        .with_overrides(vec![VersionSpec::new("v9", 9000)], Some(2), None);

        assert_eq!(plan.versions, vec![VersionSpec::new("v9", 9000)]);
        assert_eq!(plan.readiness.max_attempts, 2);
        assert_eq!(plan.readiness.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_no_overrides_keeps_plan() {
        let original = RunPlan {
            versions: vec![VersionSpec::new("v1", 8081)],
            readiness: ReadinessPolicy::default(),
        };
        assert_eq!(original.clone().with_overrides(vec![], None, None), original);
    }
}
