//! ZDT Runtime: Docker-backed deployment for migration runs
//!
//! Provides the [`DockerDeployer`], which starts each service version as a
//! container on a shared network, and provisions the backing store those
//! versions share.

pub mod config;
pub mod deployer;
pub mod docker;
pub mod error;

pub use config::RuntimeConfig;
pub use deployer::DockerDeployer;
pub use docker::{is_docker_available, ContainerState, DockerCli};
pub use error::RuntimeError;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
