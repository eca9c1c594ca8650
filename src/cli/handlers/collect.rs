use anyhow::{anyhow, bail, Result};
use std::io;
use std::process::ExitCode;
use tracing::info;

use crate::cli::commands::Cli;
use crate::collect::{CollectionRun, LogSelection, RunOptions, RunReport};
use crate::config::SshConfig;
use crate::ssh::SshConnector;

/// Build run options from parsed arguments. Fails when no cluster was given.
pub fn run_options(cli: &Cli) -> Result<RunOptions> {
    let Some(clusters) = cli.clusters.clone() else {
        bail!("Missing --clusters: give at least one cluster, e.g. --clusters c01,c02");
    };

    Ok(RunOptions {
        clusters,
        selection: LogSelection::new(cli.logtypes.iter().copied()),
        num: cli.num as usize,
        dir_prefix: cli.dir_prefix.clone().unwrap_or_default(),
        error_policy: cli.error_policy(),
    })
}

/// Run the collection. Once the output directory exists every outcome is
/// reported on stdout, ending in `logdir = <path>`, and only the exit code
/// distinguishes success from failure.
pub async fn handle_collect_command(cli: Cli) -> Result<ExitCode> {
    let options = run_options(&cli)?;
    let ssh = SshConfig::from_env().map_err(|e| anyhow!(e))?;
    info!(
        "Starting log collection as {} (blades as {})",
        ssh.username, ssh.blade_username
    );

    let connector = SshConnector::new(ssh.port);
    let run = CollectionRun::new(connector, ssh, options);
    let plan = run.prepare()?;

    let result = run.execute(&plan, &mut io::stdout()).await;
    if run_succeeded(&result) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// False when the run aborted or any cluster failed
pub fn run_succeeded(result: &Result<RunReport>) -> bool {
    matches!(result, Ok(report) if report.failed_clusters().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::types::CollectionStats;
    use crate::collect::{ClusterReport, ErrorPolicy, LogType, RunMetadata};
    use clap::Parser;
    use std::path::PathBuf;

    fn report(clusters: Vec<ClusterReport>) -> RunReport {
        RunReport {
            metadata: RunMetadata {
                collection_timestamp: "2024-01-30T17:00:37+00:00".to_string(),
                tool_version: "0.1.0".to_string(),
                clusters: clusters.iter().map(|c| c.cluster.clone()).collect(),
                log_types: vec!["middleware".to_string()],
                files_per_category: 3,
                output_directory: "c01_2024-01-30-T17-00-37".to_string(),
            },
            clusters,
            stats: CollectionStats::default(),
        }
    }

    #[test]
    fn test_run_succeeded_only_when_every_cluster_was_collected() {
        assert!(run_succeeded(&Ok(report(vec![ClusterReport::new("c01")]))));

        let partial = report(vec![
            ClusterReport::failed("c01", &anyhow!("Connection refused: c01")),
            ClusterReport::new("c02"),
        ]);
        assert!(!run_succeeded(&Ok(partial)));

        assert!(!run_succeeded(&Err(anyhow!("Collection of cluster c01 failed"))));
    }

    #[test]
    fn test_run_options_from_arguments() {
        let cli = Cli::try_parse_from([
            "logpilot",
            "-c",
            "c01,,c01",
            "-l",
            "system,system_blades",
            "-n",
            "5",
        ])
        .unwrap();

        let options = run_options(&cli).unwrap();
        assert_eq!(options.clusters, vec!["c01", "", "c01"]);
        assert!(options.selection.contains(LogType::System));
        assert!(options.selection.contains(LogType::SystemBlades));
        assert_eq!(options.num, 5);
        assert_eq!(options.dir_prefix, PathBuf::new());
        assert_eq!(options.error_policy, ErrorPolicy::Abort);
    }

    #[test]
    fn test_missing_clusters_is_an_error() {
        let cli = Cli::try_parse_from(["logpilot"]).unwrap();
        let err = run_options(&cli).unwrap_err();
        assert!(err.to_string().contains("--clusters"));
    }
}
