//! ZDT Core Library
//!
//! Harness for verifying zero-downtime schema migrations: deploys successive
//! versions of a service against a shared store and checks that every pair of
//! adjacent versions can read and write each other's data.

pub mod baseline;
pub mod client;
pub mod deployer;
pub mod domain;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod probes;
pub mod readiness;
pub mod reporting;
pub mod telemetry;

pub use baseline::verify_crud;
pub use client::{AssetApi, Connector, HttpAssetClient, HttpConnector};
pub use deployer::{DeployedInstance, InstanceHandle, RuntimeDeployer, VersionInstance};
pub use domain::{
    Asset, ClientError, HarnessError, LeftRunning, Result, StageFailure, StageStep, VersionSpec,
    Violation,
};
pub use orchestrator::{run_migration, DeploymentOrchestrator};
pub use probes::{
    CompatibilityProbe, CreateNewReadOld, CreateOldReadNew, ProbeSuite, Rereadable, Rewritable,
};
pub use readiness::{poll_until, wait_ready, ReadinessPolicy};
pub use reporting::{write_run_report_json, RunReport, StageReport};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
