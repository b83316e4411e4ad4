//! Version descriptors from the run plan.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::HarnessError;

/// One entry of the deployment sequence: which build to start and on which host port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionSpec {
    /// Version label, also the image tag (e.g. "v2").
    pub tag: String,
    /// Host port the instance is published on.
    pub port: u16,
}

impl VersionSpec {
    pub fn new(tag: impl Into<String>, port: u16) -> Self {
        Self {
            tag: tag.into(),
            port,
        }
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tag, self.port)
    }
}

/// Parses `TAG:PORT`, e.g. `v3:8083`.
impl FromStr for VersionSpec {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, port) = s.rsplit_once(':').ok_or_else(|| {
            HarnessError::Configuration(format!("expected TAG:PORT, got '{}'", s))
        })?;
        if tag.is_empty() {
            return Err(HarnessError::Configuration(format!(
                "empty version tag in '{}'",
                s
            )));
        }
        let port = port.parse::<u16>().map_err(|e| {
            HarnessError::Configuration(format!("invalid port in '{}': {}", s, e))
        })?;
        Ok(Self::new(tag, port))
    }
}

/// Check a deployment sequence before anything is started.
///
/// Consecutive versions are live at the same time, so they must not share a
/// host port.
pub fn validate_sequence(versions: &[VersionSpec]) -> Result<(), HarnessError> {
    if versions.is_empty() {
        return Err(HarnessError::Configuration(
            "deployment sequence is empty".to_string(),
        ));
    }
    if let Some(v) = versions.iter().find(|v| v.tag.trim().is_empty()) {
        return Err(HarnessError::Configuration(format!(
            "version on port {} has an empty tag",
            v.port
        )));
    }
    for pair in versions.windows(2) {
        if pair[0].port == pair[1].port {
            return Err(HarnessError::Configuration(format!(
                "{} and {} would both be live on port {}",
                pair[0].tag, pair[1].tag, pair[0].port
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_and_port() {
        let v: VersionSpec = "v3:8083".parse().expect("parse");
        assert_eq!(v, VersionSpec::new("v3", 8083));
        assert_eq!(v.to_string(), "v3:8083");
    }

    #[test]
    fn parse_rejects_missing_port() {
        assert!("v3".parse::<VersionSpec>().is_err());
        assert!("v3:http".parse::<VersionSpec>().is_err());
        assert!(":8080".parse::<VersionSpec>().is_err());
    }

    #[test]
    fn sequence_rejects_empty() {
        let err = validate_sequence(&[]).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn sequence_rejects_shared_port_between_neighbours() {
        let versions = vec![VersionSpec::new("v1", 8081), VersionSpec::new("v2", 8081)];
        let err = validate_sequence(&versions).unwrap_err();
        assert!(err.to_string().contains("8081"));
    }

    #[test]
    fn sequence_allows_port_reuse_after_retirement() {
        let versions = vec![
            VersionSpec::new("v1", 8081),
            VersionSpec::new("v2", 8082),
            VersionSpec::new("v3", 8081),
        ];
        assert!(validate_sequence(&versions).is_ok());
    }
}
