//! Deployment orchestrator: drives a version sequence one stage at a time.
//!
//! Per stage:
//!
//! ```text
//! Start -> Deploying -> AwaitingReady -> BaselineVerified
//!       -> SuiteVerified -> OldRetired -> Promoted
//! ```
//!
//! The first stage has nothing to compare against and skips the suite and
//! the retirement. Any error ends the run immediately. On a failed check the
//! previous version is left running, since it is the last known-good one.

use chrono::Utc;
use std::time::Instant;
use tracing::Instrument;

use crate::baseline::verify_crud;
use crate::client::Connector;
use crate::deployer::{RuntimeDeployer, VersionInstance};
use crate::domain::version::validate_sequence;
use crate::domain::{HarnessError, StageFailure, StageStep, VersionSpec};
use crate::obs::{
    emit_instance_retired, emit_probe_passed, emit_run_failed, emit_run_finished,
    emit_stage_started, emit_stage_step, stage_span,
};
use crate::probes::ProbeSuite;
use crate::readiness::{wait_ready, ReadinessPolicy};
use crate::reporting::{RunReport, StageReport};

/// Session state for one deployment run.
pub struct DeploymentOrchestrator<D, C> {
    deployer: D,
    connector: C,
    suite: ProbeSuite,
    policy: ReadinessPolicy,
    current: Option<VersionInstance>,
    stage: usize,
}

impl<D, C> DeploymentOrchestrator<D, C>
where
    D: RuntimeDeployer,
    C: Connector,
{
    pub fn new(deployer: D, connector: C, suite: ProbeSuite) -> Self {
        Self {
            deployer,
            connector,
            suite,
            policy: ReadinessPolicy::default(),
            current: None,
            stage: 0,
        }
    }

    /// Override the readiness policy (builder pattern).
    pub fn with_readiness(mut self, policy: ReadinessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The version presumed authoritative right now.
    pub fn current(&self) -> Option<&VersionInstance> {
        self.current.as_ref()
    }

    pub fn suite(&self) -> &ProbeSuite {
        &self.suite
    }

    /// Shared setup (network, backing store) through the deployer.
    pub async fn prepare(&self) -> crate::domain::Result<()> {
        self.deployer.prepare().await
    }

    /// Deploy every version in order, verifying each transition.
    pub async fn run(&mut self, versions: &[VersionSpec]) -> Result<RunReport, StageFailure> {
        let started_at = Utc::now();
        let started = Instant::now();

        if let Err(e) = validate_sequence(versions) {
            let tag = versions.first().map(|v| v.tag.as_str()).unwrap_or("-");
            let failure = StageFailure::new(self.stage, tag, StageStep::Start, e);
            emit_run_failed(&failure, self.current_tag());
            return Err(failure);
        }

        let mut stages = Vec::with_capacity(versions.len());
        for version in versions {
            let span = stage_span(self.stage, &version.tag);
            match self.deploy_stage(version).instrument(span).await {
                Ok(report) => stages.push(report),
                Err(failure) => {
                    emit_run_failed(&failure, self.current_tag());
                    return Err(failure);
                }
            }
        }

        let final_tag = self.current_tag().unwrap_or_default().to_string();
        let duration_ms = started.elapsed().as_millis() as u64;
        emit_run_finished(stages.len(), &final_tag, duration_ms);

        Ok(RunReport {
            schema_version: RunReport::SCHEMA_VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
            stages,
            final_tag,
        })
    }

    /// Execute one stage of the state machine for `version`.
    ///
    /// `current` is only replaced once every check for the stage has passed
    /// and the outgoing version has actually stopped.
    pub async fn deploy_stage(&mut self, version: &VersionSpec) -> Result<StageReport, StageFailure> {
        let index = self.stage;
        let tag = version.tag.as_str();
        let fail = |step: StageStep, e: HarnessError| StageFailure::new(index, tag, step, e);
        let started = Instant::now();

        emit_stage_started(index, tag, version.port);

        // Deploying
        let deployed = self
            .deployer
            .start(version)
            .await
            .map_err(|e| fail(StageStep::Deploying, e))?;
        let client = self.connector.connect(&deployed.address).map_err(|e| {
            fail(StageStep::Deploying, e)
                .with_left_running(deployed.handle.id(), &deployed.address)
        })?;
        let incoming = VersionInstance::new(tag, deployed.address, client, deployed.handle);
        emit_stage_step(index, tag, StageStep::Deploying);

        // From here on a failure drops `incoming` while its instance keeps running.
        let abandon = |step: StageStep, e: HarnessError| {
            fail(step, e).with_left_running(incoming.handle().id(), incoming.address())
        };

        // AwaitingReady
        let readiness_attempts = wait_ready(incoming.client(), &self.policy)
            .await
            .map_err(|e| abandon(StageStep::AwaitingReady, e))?;
        emit_stage_step(index, tag, StageStep::AwaitingReady);

        // BaselineVerified
        verify_crud(&incoming)
            .await
            .map_err(|e| abandon(StageStep::BaselineVerified, e))?;
        emit_stage_step(index, tag, StageStep::BaselineVerified);

        let mut probes = Vec::new();
        let mut retired = None;

        if let Some(outgoing) = self.current.as_ref() {
            // SuiteVerified
            for probe in self.suite.iter_mut() {
                let name = probe.name();
                probe
                    .check(outgoing, &incoming)
                    .await
                    .map_err(|e| abandon(StageStep::SuiteVerified, e).with_probe(name))?;
                emit_probe_passed(index, name, outgoing.tag(), tag);
                probes.push(name.to_string());
            }
            emit_stage_step(index, tag, StageStep::SuiteVerified);

            // OldRetired
            self.deployer
                .stop(outgoing.handle())
                .await
                .map_err(|e| abandon(StageStep::OldRetired, e))?;
            emit_instance_retired(index, outgoing.tag(), tag);
            retired = Some(outgoing.tag().to_string());
            emit_stage_step(index, tag, StageStep::OldRetired);
        }

        // Promoted
        let address = incoming.address().to_string();
        self.current = Some(incoming);
        self.stage += 1;
        emit_stage_step(index, tag, StageStep::Promoted);

        Ok(StageReport {
            index,
            tag: tag.to_string(),
            address,
            readiness_attempts,
            probes,
            retired,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Stop the promoted version, ending the session.
    ///
    /// If the stop fails the version stays current.
    pub async fn shutdown(&mut self) -> crate::domain::Result<Option<String>> {
        if let Some(instance) = self.current.as_ref() {
            self.deployer.stop(instance.handle()).await?;
        }
        Ok(self.current.take().map(|instance| instance.tag().to_string()))
    }

    fn current_tag(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.tag())
    }
}

/// One-shot entry point: run `versions` with a fresh orchestrator.
///
/// The last promoted version is left running.
pub async fn run_migration<D, C>(
    deployer: D,
    connector: C,
    versions: &[VersionSpec],
    suite: ProbeSuite,
    policy: ReadinessPolicy,
) -> Result<RunReport, StageFailure>
where
    D: RuntimeDeployer,
    C: Connector,
{
    DeploymentOrchestrator::new(deployer, connector, suite)
        .with_readiness(policy)
        .run(versions)
        .await
}
