//! Runtime deployer seam and the live instances it produces.
//!
//! The harness never talks to a container runtime directly. It asks a
//! [`RuntimeDeployer`] to start a version and gets back an opaque
//! [`InstanceHandle`]; the only thing the handle is good for is being handed
//! back to [`RuntimeDeployer::stop`]. The handle is only borrowed there, so a
//! failed stop leaves the caller still holding the instance.

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::AssetApi;
use crate::domain::{Result, VersionSpec};

/// Opaque runtime reference for a started instance (e.g. a container id).
///
/// Not `Clone`: the owning [`VersionInstance`] is the only record of it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle(String);

impl InstanceHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a deployer returns from `start`.
#[derive(Debug)]
pub struct DeployedInstance {
    pub handle: InstanceHandle,
    /// `host:port` the instance is reachable on.
    pub address: String,
}

/// Starts and stops versioned instances of the service under test.
#[async_trait]
pub trait RuntimeDeployer: Send + Sync {
    /// Idempotent shared setup: network, backing store.
    async fn prepare(&self) -> Result<()>;

    /// Start `version`, bound to the shared network and its host port.
    async fn start(&self, version: &VersionSpec) -> Result<DeployedInstance>;

    /// Stop and remove an instance.
    async fn stop(&self, handle: &InstanceHandle) -> Result<()>;
}

/// One running build of the service, with a client bound to it.
pub struct VersionInstance {
    tag: String,
    address: String,
    client: Arc<dyn AssetApi>,
    handle: InstanceHandle,
}

impl VersionInstance {
    pub fn new(
        tag: impl Into<String>,
        address: impl Into<String>,
        client: Arc<dyn AssetApi>,
        handle: InstanceHandle,
    ) -> Self {
        Self {
            tag: tag.into(),
            address: address.into(),
            client,
            handle,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client(&self) -> &dyn AssetApi {
        self.client.as_ref()
    }

    pub fn handle(&self) -> &InstanceHandle {
        &self.handle
    }
}

impl std::fmt::Debug for VersionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionInstance")
            .field("tag", &self.tag)
            .field("address", &self.address)
            .field("handle", &self.handle)
            .finish()
    }
}
