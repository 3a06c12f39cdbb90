//! Replica-catalog seam

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// Client for the distributed replica catalog.
///
/// Used only to build validation manifests: which datasets a finished
/// job's output container holds, and what files of what sizes each
/// dataset should contain.
#[async_trait]
pub trait ReplicaCatalog: Send + Sync {
    /// Lists the datasets registered inside an output container.
    async fn datasets_in_container(&self, container: &str) -> Result<Vec<String>>;

    /// Lists the files of a dataset with their registered byte sizes.
    async fn files_in_dataset(&self, dataset: &str) -> Result<BTreeMap<String, u64>>;
}
