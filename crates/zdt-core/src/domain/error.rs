//! Error taxonomy for the harness.
//!
//! Client calls fail with [`ClientError`]. Everything the orchestrator can hit
//! is a [`HarnessError`], and a failed run surfaces as a [`StageFailure`] that
//! says which stage, step and probe broke.

use crate::domain::asset::Asset;

/// Failure of a single call against one asset service instance.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, reset, ...).
    #[error("transport error calling {endpoint}: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The service answered with a status the contract does not allow.
    #[error("{endpoint} returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the asset schema.
    #[error("failed to decode response from {endpoint}: {detail}")]
    Decode { endpoint: String, detail: String },
}

/// A broken cross-version invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("asset {asset_id} read via {via} was {actual}, expected {expected}")]
    Mismatch {
        asset_id: String,
        via: String,
        expected: Asset,
        actual: Asset,
    },

    #[error("asset {asset_id} not found via {via}")]
    Missing { asset_id: String, via: String },

    #[error("asset {asset_id} still readable via {via} after delete")]
    NotDeleted { asset_id: String, via: String },

    #[error("unexpected service error: {detail}")]
    ServiceError { detail: String },
}

/// Errors produced by the harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("deployment error: {0}")]
    Deployment(String),

    #[error("{address} not ready after {attempts} attempt(s): {last_error}")]
    ReadinessTimeout {
        address: String,
        attempts: u32,
        last_error: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<ClientError> for HarnessError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::UnexpectedStatus { .. } => {
                HarnessError::InvariantViolation(Violation::ServiceError {
                    detail: err.to_string(),
                })
            }
            ClientError::Transport { .. } | ClientError::Decode { .. } => {
                HarnessError::Protocol(err.to_string())
            }
        }
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Position in the per-stage state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStep {
    Start,
    Deploying,
    AwaitingReady,
    BaselineVerified,
    SuiteVerified,
    OldRetired,
    Promoted,
}

impl StageStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStep::Start => "start",
            StageStep::Deploying => "deploying",
            StageStep::AwaitingReady => "awaiting_ready",
            StageStep::BaselineVerified => "baseline_verified",
            StageStep::SuiteVerified => "suite_verified",
            StageStep::OldRetired => "old_retired",
            StageStep::Promoted => "promoted",
        }
    }
}

impl std::fmt::Display for StageStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first failure of a run, annotated with where it happened.
#[derive(Debug)]
pub struct StageFailure {
    /// Zero-based position in the version sequence.
    pub stage: usize,
    /// Tag of the version being deployed in that stage.
    pub tag: String,
    /// Step that was being executed.
    pub step: StageStep,
    /// Probe that failed, when the failure came from the suite.
    pub probe: Option<String>,
    /// Instance started for this stage that nothing tracks any more.
    pub left_running: Option<LeftRunning>,
    pub source: HarnessError,
}

/// Runtime reference to an instance a failed stage abandoned, for manual cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftRunning {
    pub handle: String,
    pub address: String,
}

impl StageFailure {
    pub fn new(stage: usize, tag: impl Into<String>, step: StageStep, source: HarnessError) -> Self {
        Self {
            stage,
            tag: tag.into(),
            step,
            probe: None,
            left_running: None,
            source,
        }
    }

    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = Some(probe.into());
        self
    }

    pub fn with_left_running(mut self, handle: &str, address: &str) -> Self {
        self.left_running = Some(LeftRunning {
            handle: handle.to_string(),
            address: address.to_string(),
        });
        self
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage {} ({}) failed at {}", self.stage, self.tag, self.step)?;
        if let Some(probe) = &self.probe {
            write!(f, " in probe '{}'", probe)?;
        }
        write!(f, ": {}", self.source)?;
        if let Some(left) = &self.left_running {
            write!(f, " ({} left running at {}, handle {})", self.tag, left.address, left.handle)?;
        }
        Ok(())
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_maps_to_invariant_violation() {
        let err: HarnessError = ClientError::UnexpectedStatus {
            endpoint: "GET /api/asset/A".to_string(),
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            HarnessError::InvariantViolation(Violation::ServiceError { .. })
        ));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn transport_and_decode_map_to_protocol() {
        let err: HarnessError = ClientError::Transport {
            endpoint: "GET /health".to_string(),
            detail: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, HarnessError::Protocol(_)));

        let err: HarnessError = ClientError::Decode {
            endpoint: "POST /api/asset".to_string(),
            detail: "missing field `source`".to_string(),
        }
        .into();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn mismatch_names_asset_and_reader() {
        let v = Violation::Mismatch {
            asset_id: "A".to_string(),
            via: "v2".to_string(),
            expected: Asset::new("A", "n", "s1"),
            actual: Asset::new("A", "n", ""),
        };
        let msg = v.to_string();
        assert!(msg.contains("asset A"));
        assert!(msg.contains("via v2"));
        assert!(msg.contains("s1"));
    }

    #[test]
    fn stage_failure_display_includes_probe() {
        let failure = StageFailure::new(
            2,
            "v3",
            StageStep::SuiteVerified,
            HarnessError::from(Violation::Missing {
                asset_id: "A".to_string(),
                via: "v3".to_string(),
            }),
        )
        .with_probe("rereadable");
        let msg = failure.to_string();
        assert!(msg.starts_with("stage 2 (v3) failed at suite_verified in probe 'rereadable'"));
        assert!(msg.contains("asset A not found via v3"));
        assert!(!msg.contains("left running"));
    }

    #[test]
    fn stage_failure_display_names_abandoned_instance() {
        let failure = StageFailure::new(
            1,
            "v2",
            StageStep::AwaitingReady,
            HarnessError::Deployment("gone".to_string()),
        )
        .with_left_running("mem-2", "127.0.0.1:8082");
        assert_eq!(
            failure.left_running.as_ref().map(|l| l.handle.as_str()),
            Some("mem-2")
        );
        assert!(failure
            .to_string()
            .ends_with("(v2 left running at 127.0.0.1:8082, handle mem-2)"));
    }
}
