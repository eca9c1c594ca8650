use anyhow::{Context, Result};
use chrono::{Local, Utc};
use colored::Colorize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use super::collector::ClusterCollector;
use super::logtypes::{LogSelection, LogType};
use super::types::{ClusterReport, CollectionStats, RunMetadata, RunReport};
use super::CollectError;
use crate::config::SshConfig;
use crate::layout::{copy_recent_test_log, decompress_tree, DecompressStats, OutputLayout, TEST_LOG_NAME};
use crate::ssh::Connector;

pub const METADATA_FILE: &str = "collection_metadata.json";

/// What to do when one cluster of a multi-cluster run fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop the whole run at the first failure
    #[default]
    Abort,
    /// Record the failure and go on with the next cluster
    Continue,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub clusters: Vec<String>,
    pub selection: LogSelection,
    /// Newest files per category per host
    pub num: usize,
    pub dir_prefix: PathBuf,
    pub error_policy: ErrorPolicy,
}

/// Trim cluster names, drop empty entries and duplicates, keep first-occurrence order
pub fn normalize_clusters(raw: &[String]) -> Result<Vec<String>, CollectError> {
    let mut seen = HashSet::new();
    let mut clusters = Vec::new();

    for name in raw.iter().map(|c| c.trim()) {
        if name.is_empty() {
            warn!("⚠️  Ignoring empty cluster name");
            continue;
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(CollectError::InvalidClusterName(name.to_string()));
        }
        if !seen.insert(name.to_string()) {
            warn!("⚠️  Ignoring duplicate cluster {}", name);
            continue;
        }
        clusters.push(name.to_string());
    }

    if clusters.is_empty() {
        return Err(CollectError::NoClusters);
    }
    Ok(clusters)
}

/// Validated clusters and the freshly created output root
#[derive(Debug)]
pub struct RunPlan {
    pub clusters: Vec<String>,
    pub layout: OutputLayout,
}

/// One invocation of the collector: every cluster, then post-processing of the output tree
pub struct CollectionRun<C: Connector> {
    connector: C,
    ssh: SshConfig,
    options: RunOptions,
    test_log_source: PathBuf,
}

impl<C: Connector> CollectionRun<C> {
    pub fn new(connector: C, ssh: SshConfig, options: RunOptions) -> Self {
        Self {
            connector,
            ssh,
            options,
            test_log_source: PathBuf::from(TEST_LOG_NAME),
        }
    }

    /// Look for the test log somewhere other than the working directory
    pub fn with_test_log_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_log_source = path.into();
        self
    }

    /// Validate the request and create the output root. Nothing is connected yet.
    pub fn prepare(&self) -> Result<RunPlan> {
        let clusters = normalize_clusters(&self.options.clusters)?;
        if self.options.selection.is_empty() {
            return Err(CollectError::NoLogTypes.into());
        }
        if self.options.selection.contains(LogType::AtopBlades) {
            warn!("⚠️  {} is accepted but not collected yet", LogType::AtopBlades);
        }

        println!("{}", "═══════════════════════════════════════════════════════════════".bright_blue());
        println!("{}", "        STORAGE CLUSTER LOG COLLECTION".bright_white().bold());
        println!("{}", "═══════════════════════════════════════════════════════════════".bright_blue());
        println!("  • Clusters:  {}", clusters.join(", "));
        println!("  • Log types: {}", self.options.selection.names().join(", "));
        println!("  • Files per category: {}", self.options.num);
        println!();

        let layout = OutputLayout::create(&self.options.dir_prefix, &clusters[0], &Local::now())?;
        Ok(RunPlan { clusters, layout })
    }

    /// Collect every cluster of `plan` and post-process the output tree.
    ///
    /// Whatever the outcome, `logdir = <path>` is the last line written to `out`;
    /// a failure is logged before it.
    pub async fn execute<W: Write>(&self, plan: &RunPlan, out: &mut W) -> Result<RunReport> {
        let result = self.collect_into(plan).await;
        if let Err(e) = &result {
            error!("❌ Collection aborted: {:#}", e);
        }
        writeln!(out, "logdir = {}", plan.layout.root().display())?;
        out.flush()?;
        result
    }

    async fn collect_into(&self, plan: &RunPlan) -> Result<RunReport> {
        let start_time = Instant::now();
        let root = plan.layout.root();

        let reports = self.collect_clusters(&plan.clusters, &plan.layout).await?;

        let decompress_stats = decompress_tree(root);

        if let Err(e) = copy_recent_test_log(&self.test_log_source, root, SystemTime::now()) {
            warn!("⚠️  Could not copy {}: {:#}", self.test_log_source.display(), e);
        }

        let stats = calculate_stats(root, start_time.elapsed().as_secs(), decompress_stats);
        let report = RunReport {
            metadata: self.metadata(&plan.clusters, root),
            clusters: reports,
            stats,
        };
        save_metadata(root, &report)?;

        print_summary(&report, root);
        Ok(report)
    }

    async fn collect_clusters(
        &self,
        clusters: &[String],
        layout: &OutputLayout,
    ) -> Result<Vec<ClusterReport>> {
        let collector = ClusterCollector::new(
            &self.connector,
            &self.ssh,
            &self.options.selection,
            layout,
            self.options.num,
        );

        let mut reports = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            println!("{}", format!("🔍 Processing cluster {} ...", cluster).bright_white().bold());
            println!("────────────────────────────────────────");

            match collector.collect(cluster).await {
                Ok(report) => {
                    println!("  ✅ {} complete, {} file(s)\n", cluster, report.file_count());
                    reports.push(report);
                }
                Err(e) => match self.options.error_policy {
                    ErrorPolicy::Abort => {
                        return Err(e.context(format!("Collection of cluster {} failed", cluster)))
                    }
                    ErrorPolicy::Continue => {
                        error!("❌ Cluster {} failed, continuing: {:#}", cluster, e);
                        reports.push(ClusterReport::failed(cluster, &e));
                    }
                },
            }
        }
        Ok(reports)
    }

    fn metadata(&self, clusters: &[String], root: &Path) -> RunMetadata {
        RunMetadata {
            collection_timestamp: Utc::now().to_rfc3339(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            clusters: clusters.to_vec(),
            log_types: self
                .options
                .selection
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            files_per_category: self.options.num,
            output_directory: root.to_string_lossy().to_string(),
        }
    }
}

fn save_metadata(root: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    let path = root.join(METADATA_FILE);
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Count files and bytes below `root`
pub fn calculate_stats(root: &Path, duration_secs: u64, archives: DecompressStats) -> CollectionStats {
    let mut total_files = 0;
    let mut total_size = 0;

    for entry in WalkDir::new(root).into_iter().flatten() {
        if entry.file_type().is_file() {
            total_files += 1;
            if let Ok(metadata) = entry.metadata() {
                total_size += metadata.len();
            }
        }
    }

    CollectionStats {
        total_files,
        total_size_bytes: total_size,
        duration_secs,
        decompressed_archives: archives.decompressed,
        failed_archives: archives.failed,
    }
}

fn print_summary(report: &RunReport, root: &Path) {
    let failed = report.failed_clusters();
    let succeeded = report.clusters.len() - failed.len();

    println!("{}", "═══════════════════════════════════════════════════════════════".bright_blue());
    println!("{}", "                    COLLECTION COMPLETE!".bright_white().bold());
    println!("{}", "═══════════════════════════════════════════════════════════════".bright_blue());
    println!();
    println!("📊 Collection Statistics:");
    println!("  • Total files collected: {}", report.stats.total_files);
    println!("  • Total size: {} KB", report.stats.total_size_bytes / 1024);
    println!(
        "  • Archives decompressed: {} ({} failed)",
        report.stats.decompressed_archives, report.stats.failed_archives
    );
    println!(
        "  • Clusters collected: {}",
        format!("{}/{}", succeeded, report.clusters.len()).green()
    );
    if !failed.is_empty() {
        println!("  • Failed clusters: {}", failed.join(", ").bright_red().bold());
    }
    println!("  • Duration: {}s", report.stats.duration_secs);
    println!();
    info!("Metadata written to {}", root.join(METADATA_FILE).display());
}
