//! Probes that carry assets forward through every stage of a run.

use async_trait::async_trait;
use tracing::debug;

use super::{create_probe_asset, expect_readable, CompatibilityProbe};
use crate::deployer::VersionInstance;
use crate::domain::{Asset, Result};

/// Everything written in earlier stages must still read back via the newest version.
#[derive(Debug, Default)]
pub struct Rereadable {
    remembered: Vec<Asset>,
}

impl Rereadable {
    pub fn remembered(&self) -> &[Asset] {
        &self.remembered
    }
}

#[async_trait]
impl CompatibilityProbe for Rereadable {
    fn name(&self) -> &'static str {
        "rereadable"
    }

    async fn check(&mut self, _old: &VersionInstance, new: &VersionInstance) -> Result<()> {
        for asset in &self.remembered {
            expect_readable(new, asset).await?;
        }
        debug!(checked = self.remembered.len(), via = %new.tag(), "remembered assets readable");

        let created = create_probe_asset(new, self.name()).await?;
        self.remembered.push(created);
        Ok(())
    }
}

/// Long-lived assets must stay mutable, not just readable, after each migration.
#[derive(Debug, Default)]
pub struct Rewritable {
    remembered: Vec<Asset>,
}

impl Rewritable {
    pub fn remembered(&self) -> &[Asset] {
        &self.remembered
    }

    /// Source written for `asset` when `tag` is the incoming version.
    pub fn next_source(asset: &Asset, tag: &str) -> String {
        format!("{}-{}", asset.source, tag)
    }
}

#[async_trait]
impl CompatibilityProbe for Rewritable {
    fn name(&self) -> &'static str {
        "rewritable"
    }

    async fn check(&mut self, _old: &VersionInstance, new: &VersionInstance) -> Result<()> {
        let client = new.client();
        for asset in self.remembered.iter_mut() {
            let source = Self::next_source(asset, new.tag());
            client.update_source(&asset.id, &source).await?;

            let mut expected = asset.clone();
            expected.source = source;
            expect_readable(new, &expected).await?;
            *asset = expected;
        }
        debug!(updated = self.remembered.len(), via = %new.tag(), "remembered assets rewritten");

        let created = create_probe_asset(new, self.name()).await?;
        self.remembered.push(created);
        Ok(())
    }
}
