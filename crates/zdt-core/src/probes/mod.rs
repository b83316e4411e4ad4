//! Stateful cross-version compatibility probes.
//!
//! Each probe checks one invariant over an `(old, new)` pair of live
//! instances. Probes own whatever they remember between stages, so the
//! long-lived ones can keep checking data written many migrations ago.
//! The suite runs probes strictly in order; each probe's writes are complete
//! before the next one starts.

mod cross_version;
mod longevity;

pub use cross_version::{CreateNewReadOld, CreateOldReadNew};
pub use longevity::{Rereadable, Rewritable};

use async_trait::async_trait;

use crate::deployer::VersionInstance;
use crate::domain::{Asset, Result, Violation};

/// A named check over two concurrently-live versions.
#[async_trait]
pub trait CompatibilityProbe: Send {
    fn name(&self) -> &'static str;

    /// Run the check. Any broken invariant is an error that aborts the run.
    async fn check(&mut self, old: &VersionInstance, new: &VersionInstance) -> Result<()>;
}

/// Ordered list of probes owned by one deployment run.
#[derive(Default)]
pub struct ProbeSuite {
    probes: Vec<Box<dyn CompatibilityProbe>>,
}

impl ProbeSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four standard probes, in their fixed order.
    pub fn standard() -> Self {
        Self::new()
            .with_probe(CreateOldReadNew)
            .with_probe(CreateNewReadOld)
            .with_probe(Rereadable::default())
            .with_probe(Rewritable::default())
    }

    /// Append a probe to the end of the suite (builder pattern).
    pub fn with_probe(mut self, probe: impl CompatibilityProbe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn CompatibilityProbe>> {
        self.probes.iter_mut()
    }
}

impl std::fmt::Debug for ProbeSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Read `expected.id` via `instance` and require an exact match.
pub(crate) async fn expect_readable(instance: &VersionInstance, expected: &Asset) -> Result<()> {
    let actual = instance
        .client()
        .read(&expected.id)
        .await?
        .ok_or_else(|| Violation::Missing {
            asset_id: expected.id.clone(),
            via: instance.tag().to_string(),
        })?;

    if &actual != expected {
        return Err(Violation::Mismatch {
            asset_id: expected.id.clone(),
            via: instance.tag().to_string(),
            expected: expected.clone(),
            actual,
        }
        .into());
    }
    Ok(())
}

/// Create a probe asset via `instance`, returning the canonical stored value.
pub(crate) async fn create_probe_asset(
    instance: &VersionInstance,
    probe: &str,
) -> Result<Asset> {
    let asset = Asset::generate(
        format!("{}-{}", probe, instance.tag()),
        format!("s-{}", instance.tag()),
    );
    Ok(instance.client().create(&asset).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_suite_order_is_fixed() {
        let suite = ProbeSuite::standard();
        assert_eq!(
            suite.names(),
            vec![
                "create_old_read_new",
                "create_new_read_old",
                "rereadable",
                "rewritable"
            ]
        );
        assert_eq!(suite.len(), 4);
    }

    #[test]
    fn empty_suite() {
        let suite = ProbeSuite::new();
        assert!(suite.is_empty());
        assert_eq!(format!("{:?}", suite), "[]");
    }
}
