//! Lifecycle events emitted during a run.

use std::time::Duration;

use tracing_test::traced_test;
use zdt_core::fakes::{MemoryCluster, VersionBehavior};
use zdt_core::{run_migration, ProbeSuite, ReadinessPolicy, VersionSpec};

fn plan() -> Vec<VersionSpec> {
    vec![VersionSpec::new("v1", 8081), VersionSpec::new("v2", 8082)]
}

fn policy() -> ReadinessPolicy {
    ReadinessPolicy::new(3, Duration::from_secs(1))
}

/// Lines carrying `event="<name>"`.
fn named<'a>(lines: &[&'a str], name: &str) -> Vec<&'a str> {
    let needle = format!("event=\"{}\"", name);
    lines
        .iter()
        .copied()
        .filter(|line| line.contains(&needle))
        .collect()
}

fn expect_count(lines: &[&str], name: &str, expected: usize) -> Result<(), String> {
    match named(lines, name).len() {
        n if n == expected => Ok(()),
        n => Err(format!("expected {} {} event(s), got {}", expected, name, n)),
    }
}

#[tokio::test]
#[traced_test]
async fn successful_run_emits_lifecycle_events() {
    let cluster = MemoryCluster::new();
    run_migration(
        cluster.deployer(),
        cluster.connector(),
        &plan(),
        ProbeSuite::standard(),
        policy(),
    )
    .await
    .expect("run");

    assert!(logs_contain("event=\"run.finished\""));
    assert!(logs_contain("final_tag=v2"));
    assert!(!logs_contain("event=\"run.failed\""));

    logs_assert(|lines: &[&str]| {
        expect_count(lines, "stage.started", 2)?;
        expect_count(lines, "probe.passed", 4)?;
        expect_count(lines, "instance.retired", 1)?;
        let retired = named(lines, "instance.retired");
        if retired[0].contains("retired=v1") && retired[0].contains("successor=v2") {
            Ok(())
        } else {
            Err(format!("unexpected retirement line: {}", retired[0]))
        }
    });
}

#[tokio::test]
#[traced_test]
async fn failed_run_names_the_live_version() {
    let cluster = MemoryCluster::new();
    cluster.set_behavior("v2", VersionBehavior::blank_foreign_source());
    run_migration(
        cluster.deployer(),
        cluster.connector(),
        &plan(),
        ProbeSuite::standard(),
        policy(),
    )
    .await
    .expect_err("run");

    assert!(!logs_contain("event=\"instance.retired\""));

    logs_assert(|lines: &[&str]| {
        expect_count(lines, "run.failed", 1)?;
        let failed = named(lines, "run.failed")[0];
        for field in [
            "WARN",
            "step=suite_verified",
            "probe=\"create_old_read_new\"",
            "live=\"v1\"",
            "left_address=\"127.0.0.1:8082\"",
        ] {
            if !failed.contains(field) {
                return Err(format!("run.failed line lacks {}: {}", field, failed));
            }
        }
        Ok(())
    });
}
