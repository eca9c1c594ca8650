use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::fetcher::LogFetcher;
use super::logtypes::LogSelection;
use super::topology::{discover_blades, discover_topology, BladeEndpoint, ControllerEndpoint};
use super::types::{ClusterReport, HostReport};
use crate::config::{BladeKeyLocation, SshConfig};
use crate::layout::OutputLayout;
use crate::ssh::{resolve_key, Auth, Connector, Hop, KeySource, RemoteHost};
use russh::keys::PrivateKey;

/// Collects the logs of one cluster: topology, controllers, then blades.
///
/// Every session is closed by the scope that opened it, before that scope
/// returns, whether the work inside it succeeded or not.
pub struct ClusterCollector<'a, C: Connector> {
    connector: &'a C,
    ssh: &'a SshConfig,
    selection: &'a LogSelection,
    layout: &'a OutputLayout,
    fetcher: LogFetcher<'a>,
}

impl<'a, C: Connector> ClusterCollector<'a, C> {
    pub fn new(
        connector: &'a C,
        ssh: &'a SshConfig,
        selection: &'a LogSelection,
        layout: &'a OutputLayout,
        count: usize,
    ) -> Self {
        Self {
            connector,
            ssh,
            selection,
            layout,
            fetcher: LogFetcher::new(&ssh.remote_log_dir, count),
        }
    }

    fn password_auth(&self) -> Auth {
        Auth::Password {
            username: self.ssh.username.clone(),
            password: self.ssh.password.clone(),
        }
    }

    /// Process one cluster. Fails on the first unreachable hop or invalid topology.
    pub async fn collect(&self, cluster: &str) -> Result<ClusterReport> {
        let mut report = ClusterReport::new(cluster);

        let topology = discover_topology(self.connector, cluster, &self.password_auth()).await?;

        if self.selection.wants_controller_logs() {
            for controller in &topology.controllers {
                let host_report = self.collect_controller(cluster, controller).await?;
                report.controllers.push(host_report);
            }
        } else {
            info!("  • No controller log types requested, skipping controllers");
        }

        if self.selection.wants_blade_logs() {
            report.blades = self.collect_blades(cluster, topology.standby()).await?;
        } else {
            info!("  • No blade log types requested, skipping blade discovery");
        }

        report.topology = Some(topology);
        Ok(report)
    }

    async fn collect_controller(
        &self,
        cluster: &str,
        controller: &ControllerEndpoint,
    ) -> Result<HostReport> {
        let local_dir = self.layout.create_controller_dir(cluster, controller)?;
        info!(
            "🔍 Controller sup{} ({}) -> {}",
            controller.role,
            controller.address,
            local_dir.display()
        );

        let session = self
            .connector
            .connect(Hop::Root, &controller.address, &self.password_auth())
            .await
            .with_context(|| format!("Failed to reach controller {}", controller.address))?;
        let files = self
            .fetcher
            .fetch(&session, &self.selection.controller_types(), &local_dir)
            .await;
        session.close().await;

        Ok(host_report(&controller.address, &local_dir, files?))
    }

    async fn collect_blades(
        &self,
        cluster: &str,
        standby: &ControllerEndpoint,
    ) -> Result<Vec<HostReport>> {
        info!(
            "🔍 Reaching blades through standby controller sup{} ({})",
            standby.role, standby.address
        );

        let session = self
            .connector
            .connect(Hop::Root, &standby.address, &self.password_auth())
            .await
            .with_context(|| format!("Failed to reach standby controller {}", standby.address))?;
        let reports = self.collect_blades_via(cluster, &session).await;
        session.close().await;
        reports
    }

    async fn collect_blades_via(
        &self,
        cluster: &str,
        standby: &C::Session,
    ) -> Result<Vec<HostReport>> {
        let blades = discover_blades(standby).await?;
        let key = self.blade_key(standby).await?;
        let auth = Auth::Key {
            username: self.ssh.blade_username.clone(),
            key,
        };

        self.layout.create_cluster_dir(cluster)?;

        let mut reports = Vec::with_capacity(blades.len());
        for blade in &blades {
            reports.push(self.collect_blade(cluster, standby, blade, &auth).await?);
        }
        Ok(reports)
    }

    async fn blade_key(&self, standby: &C::Session) -> Result<Arc<PrivateKey>> {
        let key = match &self.ssh.blade_key {
            BladeKeyLocation::Remote(path) => {
                resolve_key(KeySource::Remote {
                    session: standby,
                    path,
                })
                .await
            }
            BladeKeyLocation::Local(path) => resolve_key::<C::Session>(KeySource::Local(path)).await,
        };
        key.context("Failed to resolve the blade key")
    }

    async fn collect_blade(
        &self,
        cluster: &str,
        standby: &C::Session,
        blade: &BladeEndpoint,
        auth: &Auth,
    ) -> Result<HostReport> {
        let hostname = blade.hostname();
        let local_dir = self.layout.create_blade_dir(cluster, blade)?;
        info!("🔍 cluster={}, blade={} -> {}", cluster, hostname, local_dir.display());

        let session = self
            .connector
            .connect(Hop::Tunneled(standby), &hostname, auth)
            .await
            .with_context(|| format!("Failed to reach blade {} via {}", hostname, standby.host()))?;
        let files = self
            .fetcher
            .fetch(&session, &self.selection.blade_types(), &local_dir)
            .await;
        session.close().await;

        Ok(host_report(&hostname, &local_dir, files?))
    }
}

fn host_report(host: &str, local_dir: &Path, files: Vec<PathBuf>) -> HostReport {
    HostReport {
        host: host.to_string(),
        local_dir: local_dir.to_path_buf(),
        files: files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect(),
    }
}
