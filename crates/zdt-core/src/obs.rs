//! Structured lifecycle events for deployment runs.
//!
//! Every stage transition, probe result and teardown decision is emitted as
//! an `info!` event with a stable `event` field so runs can be followed in
//! aggregated logs (`--json`).

use tracing::{info, warn};

use crate::domain::{StageFailure, StageStep};

/// Stage-scoped span. Attach it with `Instrument::instrument` so it stays
/// correct across `.await` points.
///
/// ```ignore
/// orchestrator.deploy_stage(&v2).instrument(stage_span(1, "v2")).await
/// // everything logged inside carries stage = 1, tag = "v2"
/// ```
pub fn stage_span(stage: usize, tag: &str) -> tracing::Span {
    tracing::info_span!("zdt.stage", stage = stage, tag = %tag)
}

pub fn emit_stage_started(stage: usize, tag: &str, port: u16) {
    info!(event = "stage.started", stage = stage, tag = %tag, port = port);
}

pub fn emit_stage_step(stage: usize, tag: &str, step: StageStep) {
    info!(event = "stage.step", stage = stage, tag = %tag, step = %step);
}

pub fn emit_probe_passed(stage: usize, probe: &str, old_tag: &str, new_tag: &str) {
    info!(
        event = "probe.passed",
        stage = stage,
        probe = %probe,
        old = %old_tag,
        new = %new_tag,
    );
}

/// Emit event: the previous version was stopped after its successor was verified.
pub fn emit_instance_retired(stage: usize, retired_tag: &str, successor_tag: &str) {
    info!(
        event = "instance.retired",
        stage = stage,
        retired = %retired_tag,
        successor = %successor_tag,
    );
}

pub fn emit_run_finished(stages: usize, final_tag: &str, duration_ms: u64) {
    info!(
        event = "run.finished",
        stages = stages,
        final_tag = %final_tag,
        duration_ms = duration_ms,
    );
}

/// Emit event: run aborted (warning level). The previous version stays live.
///
/// `left_handle`/`left_address` name an incoming instance that is still
/// running untracked and needs manual cleanup.
pub fn emit_run_failed(failure: &StageFailure, live_tag: Option<&str>) {
    let left = failure.left_running.as_ref();
    warn!(
        event = "run.failed",
        stage = failure.stage,
        tag = %failure.tag,
        step = %failure.step,
        probe = failure.probe.as_deref().unwrap_or("-"),
        live = live_tag.unwrap_or("-"),
        left_handle = left.map(|l| l.handle.as_str()).unwrap_or("-"),
        left_address = left.map(|l| l.address.as_str()).unwrap_or("-"),
        error = %failure.source,
    );
}
