// Module declarations
pub mod decompress;
pub mod test_log;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collect::topology::{BladeEndpoint, ControllerEndpoint};

pub use decompress::{decompress_tree, ArchiveKind, DecompressStats};
pub use test_log::{copy_recent_test_log, TestLogOutcome, TEST_LOG_MAX_AGE, TEST_LOG_NAME};

/// The local output tree of one run.
///
/// Every directory is created with `create_dir`: parents are never created and
/// an existing entry with the same name is an error.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

/// `<first-cluster>_<YYYY-MM-DD-THH-MM-SS>`
pub fn toplevel_name<Tz: TimeZone>(first_cluster: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", first_cluster, now.format("%Y-%m-%d-T%H-%M-%S"))
}

fn create_leaf(path: &Path) -> Result<()> {
    fs::create_dir(path).with_context(|| {
        format!(
            "Failed to create directory {} (it must not exist yet and its parent must exist)",
            path.display()
        )
    })
}

impl OutputLayout {
    /// Create `<dir_prefix>/<first_cluster>_<timestamp>`. Only the leaf is created.
    pub fn create<Tz: TimeZone>(
        dir_prefix: &Path,
        first_cluster: &str,
        now: &DateTime<Tz>,
    ) -> Result<Self>
    where
        Tz::Offset: std::fmt::Display,
    {
        let root = dir_prefix.join(toplevel_name(first_cluster, now));
        create_leaf(&root)?;
        info!("📁 Created output directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn controller_dir_name(cluster: &str, controller: &ControllerEndpoint) -> String {
        format!("{}_sup{}_{}", cluster, controller.role, controller.address)
    }

    /// `<root>/<cluster>_sup<n>_<address>`
    pub fn create_controller_dir(
        &self,
        cluster: &str,
        controller: &ControllerEndpoint,
    ) -> Result<PathBuf> {
        let dir = self
            .root
            .join(Self::controller_dir_name(cluster, controller));
        create_leaf(&dir)?;
        Ok(dir)
    }

    /// `<root>/<cluster>`, the parent of the blade directories
    pub fn create_cluster_dir(&self, cluster: &str) -> Result<PathBuf> {
        let dir = self.root.join(cluster);
        create_leaf(&dir)?;
        Ok(dir)
    }

    /// `<root>/<cluster>/ir<n>`; [`Self::create_cluster_dir`] must have run first
    pub fn create_blade_dir(&self, cluster: &str, blade: &BladeEndpoint) -> Result<PathBuf> {
        let dir = self.root.join(cluster).join(blade.hostname());
        create_leaf(&dir)?;
        Ok(dir)
    }
}
