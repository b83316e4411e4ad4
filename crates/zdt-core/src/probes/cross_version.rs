//! Write through one version, read through the other.

use async_trait::async_trait;
use tracing::debug;

use super::{create_probe_asset, expect_readable, CompatibilityProbe};
use crate::deployer::VersionInstance;
use crate::domain::Result;

/// Forward compatibility: the incoming version reads what the outgoing one wrote.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateOldReadNew;

#[async_trait]
impl CompatibilityProbe for CreateOldReadNew {
    fn name(&self) -> &'static str {
        "create_old_read_new"
    }

    async fn check(&mut self, old: &VersionInstance, new: &VersionInstance) -> Result<()> {
        let created = create_probe_asset(old, self.name()).await?;
        debug!(asset_id = %created.id, writer = %old.tag(), reader = %new.tag(), "cross-version read");
        expect_readable(new, &created).await
    }
}

/// Backward compatibility: the outgoing version reads what the incoming one wrote.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateNewReadOld;

#[async_trait]
impl CompatibilityProbe for CreateNewReadOld {
    fn name(&self) -> &'static str {
        "create_new_read_old"
    }

    async fn check(&mut self, old: &VersionInstance, new: &VersionInstance) -> Result<()> {
        let created = create_probe_asset(new, self.name()).await?;
        debug!(asset_id = %created.id, writer = %new.tag(), reader = %old.tag(), "cross-version read");
        expect_readable(old, &created).await
    }
}
