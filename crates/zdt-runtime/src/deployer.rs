//! [`RuntimeDeployer`] backed by the local docker daemon.

use async_trait::async_trait;
use tracing::{info, warn};
use zdt_core::{poll_until, DeployedInstance, HarnessError, InstanceHandle, RuntimeDeployer, VersionSpec};

use crate::config::RuntimeConfig;
use crate::docker::DockerCli;
use crate::error::RuntimeError;

/// Runs each version as a container on a shared network next to one
/// backing store container.
#[derive(Debug, Clone)]
pub struct DockerDeployer {
    cli: DockerCli,
    config: RuntimeConfig,
}

impl DockerDeployer {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            cli: DockerCli::new(),
            config,
        }
    }

    /// Create deployer from environment variables
    pub fn from_env() -> Self {
        Self::new(RuntimeConfig::from_env())
    }

    pub fn with_cli(mut self, cli: DockerCli) -> Self {
        self.cli = cli;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    async fn ensure_network(&self) -> Result<(), RuntimeError> {
        let network = &self.config.network;
        if self.cli.network_exists(network).await? {
            info!(network = %network, "network exists, skip creation");
            return Ok(());
        }
        info!(network = %network, "creating network");
        self.cli.create_network(network).await
    }

    async fn ensure_store(&self) -> Result<(), RuntimeError> {
        let name = &self.config.store_container;
        match self.cli.container_state(name).await? {
            Some(state) if state.running => {
                info!(container = %name, "backing store already running, skip deployment");
                Ok(())
            }
            Some(state) => {
                warn!(container = %name, status = %state.status, "backing store stopped, restarting");
                self.cli.start(name).await
            }
            None => {
                let image = &self.config.store_image;
                if !self.cli.image_exists(image).await? {
                    info!(image = %image, "pulling backing store image");
                    self.cli.pull(image).await?;
                }
                info!(container = %name, "starting backing store");
                self.cli.run(&self.config.store_run_args()).await.map(|_| ())
            }
        }
    }

    async fn wait_for_store(&self) -> Result<(), RuntimeError> {
        let cli = &self.cli;
        let args = self.config.store_ping_args();
        let args = &args;
        poll_until(
            &self.config.store_readiness,
            &self.config.store_container,
            move || async move { cli.run(args).await.map(|_| ()) },
        )
        .await
        .map(|_| ())
        .map_err(|e| RuntimeError::StoreNotReady {
            container: self.config.store_container.clone(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl RuntimeDeployer for DockerDeployer {
    async fn prepare(&self) -> Result<(), HarnessError> {
        self.ensure_network().await?;
        self.ensure_store().await?;
        self.wait_for_store().await?;
        Ok(())
    }

    async fn start(&self, version: &VersionSpec) -> Result<DeployedInstance, HarnessError> {
        let image = self.config.image_ref(version);
        let id = self.cli.run(&self.config.app_run_args(version)).await?;
        info!(image = %image, port = version.port, container = %short_id(&id), "version started");
        Ok(DeployedInstance {
            handle: InstanceHandle::new(id),
            address: format!("localhost:{}", version.port),
        })
    }

    async fn stop(&self, handle: &InstanceHandle) -> Result<(), HarnessError> {
        self.cli.stop(handle.id()).await?;
        self.cli.remove(handle.id()).await?;
        info!(container = %short_id(handle.id()), "container stopped and removed");
        Ok(())
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_deployer() -> DockerDeployer {
        DockerDeployer::new(RuntimeConfig::default())
            .with_cli(DockerCli::with_binary("zdt-no-such-docker-binary"))
    }

    #[test]
    fn test_short_id_truncates_container_ids() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn test_start_without_docker_is_deployment_error() {
        let err = unreachable_deployer()
            .start(&VersionSpec::new("v1", 8081))
            .await
            .unwrap_err();
        match err {
            HarnessError::Deployment(msg) => assert!(msg.contains("docker is not installed")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prepare_without_docker_fails_fast() {
        let err = unreachable_deployer().prepare().await.unwrap_err();
        assert!(matches!(err, HarnessError::Deployment(_)));
    }

    #[tokio::test]
    async fn test_stop_without_docker_is_deployment_error() {
        let err = unreachable_deployer()
            .stop(&InstanceHandle::new("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Deployment(_)));
    }
}
