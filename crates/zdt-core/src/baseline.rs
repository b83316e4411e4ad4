//! Single-instance CRUD round-trip, run before any cross-version comparison.

use tracing::debug;

use crate::deployer::VersionInstance;
use crate::domain::{Asset, Result, Violation};
use crate::probes::expect_readable;

/// Create, read, update, read, delete and confirm absence against one instance.
pub async fn verify_crud(instance: &VersionInstance) -> Result<()> {
    let client = instance.client();
    let tag = instance.tag();

    let created = client
        .create(&Asset::generate(tag, format!("s-{}", tag)))
        .await?;
    expect_readable(instance, &created).await?;

    let source = format!("s-{}-updated", tag);
    client.update_source(&created.id, &source).await?;
    let mut updated = created.clone();
    updated.source = source;
    expect_readable(instance, &updated).await?;

    client.delete(&created.id).await?;
    if client.read(&created.id).await?.is_some() {
        return Err(Violation::NotDeleted {
            asset_id: created.id,
            via: tag.to_string(),
        }
        .into());
    }

    debug!(tag = %tag, asset_id = %created.id, "baseline CRUD verified");
    Ok(())
}
