//! Blob backend reachability check for `agv status`

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use opendal::Operator;

/// What a successful health check saw at the bucket root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHealth {
    /// Top-level `<identity>/` prefixes holding documents
    pub identities: usize,
    /// Stray objects at the root; the vault never writes there
    pub loose_objects: usize,
    pub latency: Duration,
}

/// List the bucket root and summarise the identity prefixes under it.
pub async fn check_health(op: &Operator) -> Result<StorageHealth> {
    let started = Instant::now();
    let entries = op
        .list("/")
        .await
        .context("storage health check failed")?;

    let (mut identities, mut loose_objects) = (0, 0);
    for entry in &entries {
        match entry.path() {
            "" | "/" => {}
            p if p.ends_with('/') => identities += 1,
            _ => loose_objects += 1,
        }
    }

    Ok(StorageHealth {
        identities,
        loose_objects,
        latency: started.elapsed(),
    })
}
