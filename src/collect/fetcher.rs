use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::logtypes::{listing_command, parse_listing, LogType};
use crate::ssh::RemoteHost;

/// Lists and downloads the newest log files of each category from one host
pub struct LogFetcher<'a> {
    remote_log_dir: &'a str,
    count: usize,
}

impl<'a> LogFetcher<'a> {
    pub fn new(remote_log_dir: &'a str, count: usize) -> Self {
        Self {
            remote_log_dir,
            count,
        }
    }

    fn remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_log_dir.trim_end_matches('/'), file_name)
    }

    /// Newest files of one category, oldest first.
    ///
    /// A failing listing is reported and treated as "no matching files".
    pub async fn list_category<S: RemoteHost>(
        &self,
        session: &S,
        log_type: LogType,
    ) -> Result<Vec<String>> {
        let Some(command) = listing_command(self.remote_log_dir, log_type.patterns(), self.count)
        else {
            warn!(
                "⚠️  {} is not collected yet, skipping on {}",
                log_type,
                session.host()
            );
            return Ok(Vec::new());
        };

        let output = session.exec(&command).await?;
        if !output.success() {
            warn!(
                "⚠️  Listing {} on {} failed (exit status {}): {}",
                log_type,
                session.host(),
                output.exit_status,
                output.stderr.trim()
            );
            return Ok(Vec::new());
        }
        if !output.stderr.trim().is_empty() {
            warn!(
                "⚠️  Listing {} on {} reported: {}",
                log_type,
                session.host(),
                output.stderr.trim()
            );
        }

        let files = parse_listing(&output.stdout, self.count);
        debug!("{} on {}: {:?}", log_type, session.host(), files);
        Ok(files)
    }

    /// Concatenated listings of all categories, in category order
    pub async fn list<S: RemoteHost>(
        &self,
        session: &S,
        log_types: &[LogType],
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for log_type in log_types {
            files.extend(self.list_category(session, *log_type).await?);
        }
        Ok(files)
    }

    /// List and download into `local_dir`. Returns the local paths written.
    pub async fn fetch<S: RemoteHost>(
        &self,
        session: &S,
        log_types: &[LogType],
        local_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let files = self.list(session, log_types).await?;
        info!("  • {} log file(s) on {}: {:?}", files.len(), session.host(), files);

        let mut downloaded = Vec::with_capacity(files.len());
        for file in &files {
            let remote_path = self.remote_path(file);
            info!("    Downloading: {} ...", remote_path);
            let local_path = session
                .download(&remote_path, local_dir)
                .await
                .with_context(|| format!("Failed to download {}:{}", session.host(), remote_path))?;
            downloaded.push(local_path);
        }
        Ok(downloaded)
    }
}
