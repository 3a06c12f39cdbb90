//! Manifest domain types
//!
//! A manifest is what the replica catalog says a job's output should look
//! like: every dataset in the output container, and for each dataset every
//! file with its expected size in bytes. Manifests are fetched fresh for
//! each validation attempt and never cached across jobs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Expected output of one job, keyed dataset -> file -> byte size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub datasets: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset: impl Into<String>, file: impl Into<String>, size: u64) {
        self.datasets
            .entry(dataset.into())
            .or_default()
            .insert(file.into(), size);
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Total number of files across all datasets.
    pub fn file_count(&self) -> usize {
        self.datasets.values().map(|files| files.len()).sum()
    }
}

/// A downloaded file whose size disagrees with the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptFile {
    pub dataset: String,
    pub file: String,
}

impl std::fmt::Display for CorruptFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.dataset, self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_insert_and_count() {
        let mut manifest = Manifest::new();
        assert!(manifest.is_empty());

        manifest.insert("ds1", "a.root", 100);
        manifest.insert("ds1", "b.root", 200);
        manifest.insert("ds2", "c.root", 50);

        assert!(!manifest.is_empty());
        assert_eq!(manifest.file_count(), 3);
        assert_eq!(manifest.datasets["ds1"]["b.root"], 200);
    }

    #[test]
    fn test_corrupt_file_display() {
        let corrupt = CorruptFile {
            dataset: "ds1".to_string(),
            file: "b.root".to_string(),
        };
        assert_eq!(corrupt.to_string(), "ds1/b.root");
    }
}
