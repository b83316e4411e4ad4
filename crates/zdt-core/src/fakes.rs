//! In-memory fakes for the deployer and the asset service (testing only)
//!
//! A [`MemoryCluster`] plays the role of the container runtime plus the shared
//! backing store. [`MemoryDeployer`] and [`MemoryConnector`] expose it through
//! the harness traits, and per-version [`VersionBehavior`] knobs simulate the
//! ways a real migration goes wrong.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{AssetApi, Connector};
use crate::deployer::{DeployedInstance, InstanceHandle, RuntimeDeployer};
use crate::domain::{Asset, ClientError, HarnessError, Result, VersionSpec};

/// How a given version of the fake service misbehaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionBehavior {
    /// `start` fails outright.
    pub fail_start: bool,
    /// Number of health checks that fail before the instance turns healthy.
    /// `u32::MAX` means it never does.
    pub unhealthy_checks: u32,
    /// Rows last written by another version read back with an empty `source`,
    /// as if this version reads a column the others never fill.
    pub blank_foreign_source: bool,
    /// Creates and updates answer 500.
    pub reject_writes: bool,
    /// Rows last written before this version started read back with an empty
    /// `source`, as if its migration skipped the backfill.
    pub blank_preexisting_source: bool,
    /// Updates to rows last written before this version started are
    /// acknowledged but never applied.
    pub drop_preexisting_updates: bool,
}

impl VersionBehavior {
    pub fn never_ready() -> Self {
        Self {
            unhealthy_checks: u32::MAX,
            ..Self::default()
        }
    }

    pub fn ready_after(failed_checks: u32) -> Self {
        Self {
            unhealthy_checks: failed_checks,
            ..Self::default()
        }
    }

    pub fn blank_foreign_source() -> Self {
        Self {
            blank_foreign_source: true,
            ..Self::default()
        }
    }

    pub fn blank_preexisting_source() -> Self {
        Self {
            blank_preexisting_source: true,
            ..Self::default()
        }
    }

    pub fn drop_preexisting_updates() -> Self {
        Self {
            drop_preexisting_updates: true,
            ..Self::default()
        }
    }
}

/// Observable side effects, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    Prepared,
    Started { tag: String },
    Stopped { tag: String },
    /// Free-form marker recorded by test code (e.g. a probe that ran).
    Note(String),
}

#[derive(Debug)]
struct LiveInstance {
    tag: String,
    address: String,
    health_checks: u32,
    started_at: u64,
}

#[derive(Debug)]
struct StoredAsset {
    asset: Asset,
    written_by: String,
    written_at: u64,
}

/// The live instance a client call landed on.
#[derive(Debug)]
struct Caller {
    tag: String,
    started_at: u64,
    behavior: VersionBehavior,
}

impl Caller {
    fn predates(&self, row: &StoredAsset) -> bool {
        row.written_at < self.started_at
    }
}

#[derive(Debug, Default)]
struct ClusterState {
    store: HashMap<String, StoredAsset>,
    live: HashMap<String, LiveInstance>,
    behaviors: HashMap<String, VersionBehavior>,
    events: Vec<ClusterEvent>,
    next_handle: u64,
    /// Logical clock ordering starts and writes.
    clock: u64,
}

impl ClusterState {
    fn instance_at(&self, address: &str) -> Option<&LiveInstance> {
        self.live.values().find(|i| i.address == address)
    }

    fn behavior(&self, tag: &str) -> VersionBehavior {
        self.behaviors.get(tag).cloned().unwrap_or_default()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Shared fake runtime and backing store.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Configure how `tag` behaves once started.
    pub fn set_behavior(&self, tag: &str, behavior: VersionBehavior) {
        let mut state = self.state.lock().unwrap();
        state.behaviors.insert(tag.to_string(), behavior);
    }

    pub fn record(&self, event: ClusterEvent) {
        self.state.lock().unwrap().events.push(event);
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Tags of running instances, sorted.
    pub fn live_tags(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut tags: Vec<String> = state.live.values().map(|i| i.tag.clone()).collect();
        tags.sort();
        tags
    }

    /// Row as held by the backing store, bypassing any version.
    pub fn stored(&self, id: &str) -> Option<Asset> {
        let state = self.state.lock().unwrap();
        state.store.get(id).map(|row| row.asset.clone())
    }

    pub fn stored_count(&self) -> usize {
        self.state.lock().unwrap().store.len()
    }

    pub fn deployer(self: &Arc<Self>) -> MemoryDeployer {
        MemoryDeployer {
            cluster: Arc::clone(self),
        }
    }

    pub fn connector(self: &Arc<Self>) -> MemoryConnector {
        MemoryConnector {
            cluster: Arc::clone(self),
        }
    }
}

/// [`RuntimeDeployer`] over a [`MemoryCluster`].
#[derive(Debug, Clone)]
pub struct MemoryDeployer {
    cluster: Arc<MemoryCluster>,
}

#[async_trait]
impl RuntimeDeployer for MemoryDeployer {
    async fn prepare(&self) -> Result<()> {
        self.cluster.record(ClusterEvent::Prepared);
        Ok(())
    }

    async fn start(&self, version: &VersionSpec) -> Result<DeployedInstance> {
        let mut state = self.cluster.state.lock().unwrap();
        if state.behavior(&version.tag).fail_start {
            return Err(HarnessError::Deployment(format!(
                "image for {} failed to start",
                version.tag
            )));
        }

        let address = format!("127.0.0.1:{}", version.port);
        if let Some(existing) = state.instance_at(&address) {
            return Err(HarnessError::Deployment(format!(
                "port {} already allocated by {}",
                version.port, existing.tag
            )));
        }

        state.next_handle += 1;
        let id = format!("mem-{}", state.next_handle);
        let started_at = state.tick();
        state.live.insert(
            id.clone(),
            LiveInstance {
                tag: version.tag.clone(),
                address: address.clone(),
                health_checks: 0,
                started_at,
            },
        );
        state.events.push(ClusterEvent::Started {
            tag: version.tag.clone(),
        });

        Ok(DeployedInstance {
            handle: InstanceHandle::new(id),
            address,
        })
    }

    async fn stop(&self, handle: &InstanceHandle) -> Result<()> {
        let mut state = self.cluster.state.lock().unwrap();
        let instance = state.live.remove(handle.id()).ok_or_else(|| {
            HarnessError::Deployment(format!("no such instance: {}", handle))
        })?;
        state.events.push(ClusterEvent::Stopped { tag: instance.tag });
        Ok(())
    }
}

/// [`Connector`] handing out [`MemoryAssetClient`]s.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    cluster: Arc<MemoryCluster>,
}

impl Connector for MemoryConnector {
    fn connect(&self, address: &str) -> Result<Arc<dyn AssetApi>> {
        Ok(Arc::new(MemoryAssetClient {
            cluster: Arc::clone(&self.cluster),
            address: address.to_string(),
        }))
    }
}

/// Client for one address of a [`MemoryCluster`].
///
/// Calls against an address with no live instance fail like a refused
/// connection.
#[derive(Debug, Clone)]
pub struct MemoryAssetClient {
    cluster: Arc<MemoryCluster>,
    address: String,
}

impl MemoryAssetClient {
    fn with_instance<T>(
        &self,
        endpoint: &str,
        f: impl FnOnce(&mut ClusterState, &Caller) -> std::result::Result<T, ClientError>,
    ) -> std::result::Result<T, ClientError> {
        let mut state = self.cluster.state.lock().unwrap();
        let (tag, started_at) = match state.instance_at(&self.address) {
            Some(instance) => (instance.tag.clone(), instance.started_at),
            None => return Err(self.refused(endpoint)),
        };
        let caller = Caller {
            behavior: state.behavior(&tag),
            tag,
            started_at,
        };
        f(&mut state, &caller)
    }

    fn refused(&self, endpoint: &str) -> ClientError {
        ClientError::Transport {
            endpoint: endpoint.to_string(),
            detail: format!("connection refused: {}", self.address),
        }
    }

    fn server_error(endpoint: &str, body: &str) -> ClientError {
        ClientError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: 500,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl AssetApi for MemoryAssetClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn health(&self) -> std::result::Result<(), ClientError> {
        let endpoint = "GET /health";
        let mut state = self.cluster.state.lock().unwrap();
        let ClusterState {
            live, behaviors, ..
        } = &mut *state;
        let instance = live
            .values_mut()
            .find(|i| i.address == self.address)
            .ok_or_else(|| self.refused(endpoint))?;
        let threshold = behaviors
            .get(&instance.tag)
            .map(|b| b.unhealthy_checks)
            .unwrap_or(0);

        instance.health_checks = instance.health_checks.saturating_add(1);
        if instance.health_checks > threshold {
            Ok(())
        } else {
            Err(Self::server_error(endpoint, "migration in progress"))
        }
    }

    async fn create(&self, asset: &Asset) -> std::result::Result<Asset, ClientError> {
        let endpoint = "POST /api/asset";
        self.with_instance(endpoint, |state, caller| {
            if caller.behavior.reject_writes {
                return Err(Self::server_error(endpoint, "write rejected"));
            }
            if state.store.contains_key(&asset.id) {
                return Err(Self::server_error(endpoint, "duplicate id"));
            }
            let written_at = state.tick();
            state.store.insert(
                asset.id.clone(),
                StoredAsset {
                    asset: asset.clone(),
                    written_by: caller.tag.clone(),
                    written_at,
                },
            );
            Ok(asset.clone())
        })
    }

    async fn read(&self, id: &str) -> std::result::Result<Option<Asset>, ClientError> {
        self.with_instance("GET /api/asset", |state, caller| {
            Ok(state.store.get(id).map(|row| {
                let behavior = &caller.behavior;
                let mut asset = row.asset.clone();
                if (behavior.blank_foreign_source && row.written_by != caller.tag)
                    || (behavior.blank_preexisting_source && caller.predates(row))
                {
                    asset.source.clear();
                }
                asset
            }))
        })
    }

    async fn update_source(&self, id: &str, source: &str) -> std::result::Result<(), ClientError> {
        let endpoint = "PUT /api/asset";
        self.with_instance(endpoint, |state, caller| {
            if caller.behavior.reject_writes {
                return Err(Self::server_error(endpoint, "write rejected"));
            }
            let written_at = state.tick();
            match state.store.get_mut(id) {
                Some(row) if caller.behavior.drop_preexisting_updates && caller.predates(row) => {
                    Ok(())
                }
                Some(row) => {
                    row.asset.source = source.to_string();
                    row.written_by = caller.tag.clone();
                    row.written_at = written_at;
                    Ok(())
                }
                None => Err(ClientError::UnexpectedStatus {
                    endpoint: endpoint.to_string(),
                    status: 404,
                    body: format!("asset {} not found", id),
                }),
            }
        })
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), ClientError> {
        self.with_instance("DELETE /api/asset", |state, _| {
            state.store.remove(id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stopped_instance_refuses_connections() {
        let cluster = MemoryCluster::new();
        let deployer = cluster.deployer();
        let deployed = deployer
            .start(&VersionSpec::new("v1", 8081))
            .await
            .expect("start");
        let client = cluster.connector().connect(&deployed.address).unwrap();
        client.health().await.expect("healthy");

        deployer.stop(&deployed.handle).await.expect("stop");
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(cluster.live_tags().is_empty());
    }

    #[tokio::test]
    async fn port_collision_is_a_deployment_error() {
        let cluster = MemoryCluster::new();
        let deployer = cluster.deployer();
        deployer.start(&VersionSpec::new("v1", 8081)).await.unwrap();
        let err = deployer
            .start(&VersionSpec::new("v2", 8081))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Deployment(_)));
    }

    #[tokio::test]
    async fn ready_after_counts_failed_checks() {
        let cluster = MemoryCluster::new();
        cluster.set_behavior("v1", VersionBehavior::ready_after(2));
        let deployed = cluster
            .deployer()
            .start(&VersionSpec::new("v1", 8081))
            .await
            .unwrap();
        let client = cluster.connector().connect(&deployed.address).unwrap();
        assert!(client.health().await.is_err());
        assert!(client.health().await.is_err());
        assert!(client.health().await.is_ok());
    }

    #[tokio::test]
    async fn preexisting_rows_are_told_apart_from_fresh_ones() {
        let cluster = MemoryCluster::new();
        cluster.set_behavior("v2", VersionBehavior::blank_preexisting_source());
        let deployer = cluster.deployer();
        let connector = cluster.connector();

        let v1 = deployer.start(&VersionSpec::new("v1", 8081)).await.unwrap();
        let v1 = connector.connect(&v1.address).unwrap();
        v1.create(&Asset::new("old", "n", "s1")).await.unwrap();

        let v2 = deployer.start(&VersionSpec::new("v2", 8082)).await.unwrap();
        let v2 = connector.connect(&v2.address).unwrap();
        v1.create(&Asset::new("new", "n", "s1")).await.unwrap();

        assert_eq!(v2.read("old").await.unwrap(), Some(Asset::new("old", "n", "")));
        assert_eq!(v2.read("new").await.unwrap(), Some(Asset::new("new", "n", "s1")));
        assert_eq!(cluster.stored("old"), Some(Asset::new("old", "n", "s1")));
    }

    #[tokio::test]
    async fn dropped_update_is_acknowledged_but_not_applied() {
        let cluster = MemoryCluster::new();
        cluster.set_behavior("v2", VersionBehavior::drop_preexisting_updates());
        let deployer = cluster.deployer();
        let connector = cluster.connector();

        let v1 = deployer.start(&VersionSpec::new("v1", 8081)).await.unwrap();
        let v1 = connector.connect(&v1.address).unwrap();
        v1.create(&Asset::new("A", "n", "s1")).await.unwrap();

        let v2 = deployer.start(&VersionSpec::new("v2", 8082)).await.unwrap();
        let v2 = connector.connect(&v2.address).unwrap();
        v2.update_source("A", "s2").await.expect("acknowledged");
        assert_eq!(cluster.stored("A"), Some(Asset::new("A", "n", "s1")));

        v2.create(&Asset::new("B", "n", "s1")).await.unwrap();
        v2.update_source("B", "s2").await.unwrap();
        assert_eq!(cluster.stored("B"), Some(Asset::new("B", "n", "s2")));
    }
}
