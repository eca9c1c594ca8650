use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::topology::Topology;

/// Files collected from one host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    pub local_dir: PathBuf,
    pub files: Vec<String>,
}

/// Outcome of processing one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusterStatus {
    Collected,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterReport {
    pub cluster: String,
    pub status: ClusterStatus,
    pub topology: Option<Topology>,
    pub controllers: Vec<HostReport>,
    pub blades: Vec<HostReport>,
}

impl ClusterReport {
    pub fn new(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            status: ClusterStatus::Collected,
            topology: None,
            controllers: Vec::new(),
            blades: Vec::new(),
        }
    }

    pub fn failed(cluster: &str, error: &anyhow::Error) -> Self {
        Self {
            status: ClusterStatus::Failed {
                error: format!("{:#}", error),
            },
            ..Self::new(cluster)
        }
    }

    pub fn file_count(&self) -> usize {
        self.controllers
            .iter()
            .chain(self.blades.iter())
            .map(|h| h.files.len())
            .sum()
    }
}

/// Statistics about the local output tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub duration_secs: u64,
    pub decompressed_archives: usize,
    pub failed_archives: usize,
}

/// Metadata written as `collection_metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub collection_timestamp: String,
    pub tool_version: String,
    pub clusters: Vec<String>,
    pub log_types: Vec<String>,
    pub files_per_category: usize,
    pub output_directory: String,
}

/// Result of a complete collection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub clusters: Vec<ClusterReport>,
    pub stats: CollectionStats,
}

impl RunReport {
    pub fn failed_clusters(&self) -> Vec<&str> {
        self.clusters
            .iter()
            .filter(|c| matches!(c.status, ClusterStatus::Failed { .. }))
            .map(|c| c.cluster.as_str())
            .collect()
    }
}
