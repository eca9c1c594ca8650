use clap::Parser;
use std::path::PathBuf;

use crate::collect::{ErrorPolicy, LogType};

#[derive(Parser, Debug)]
#[command(
    name = "logpilot",
    about = "Collect recent logs from the controllers and blades of storage clusters",
    version,
    author
)]
pub struct Cli {
    /// Comma-separated cluster identifiers, processed in order
    #[arg(short, long, value_delimiter = ',')]
    pub clusters: Option<Vec<String>>,

    /// Comma-separated log categories to collect
    #[arg(
        short,
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = LogType::DEFAULTS
    )]
    pub logtypes: Vec<LogType>,

    /// Directory the timestamped output directory is created in (must exist)
    #[arg(short, long)]
    pub dir_prefix: Option<PathBuf>,

    /// Number of most recent files per category per host
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub num: u32,

    /// Log a failing cluster and go on with the next one instead of aborting
    #[arg(long)]
    pub continue_on_error: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format for logs
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Cli {
    pub fn error_policy(&self) -> ErrorPolicy {
        if self.continue_on_error {
            ErrorPolicy::Continue
        } else {
            ErrorPolicy::Abort
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["logpilot", "--clusters", "c01"]).unwrap();

        assert_eq!(cli.clusters, Some(vec!["c01".to_string()]));
        assert_eq!(
            cli.logtypes,
            vec![LogType::Middleware, LogType::Platform, LogType::Nfs]
        );
        assert_eq!(cli.dir_prefix, None);
        assert_eq!(cli.num, 3);
        assert_eq!(cli.error_policy(), ErrorPolicy::Abort);
        assert_eq!(cli.log_format, "text");
    }

    #[test]
    fn test_short_flags_and_lists() {
        let cli = Cli::try_parse_from([
            "logpilot",
            "-c",
            "c01,c02",
            "-l",
            "middleware,haproxy_blades",
            "-d",
            "/tmp/out",
            "-n",
            "2",
            "--continue-on-error",
        ])
        .unwrap();

        assert_eq!(
            cli.clusters,
            Some(vec!["c01".to_string(), "c02".to_string()])
        );
        assert_eq!(
            cli.logtypes,
            vec![LogType::Middleware, LogType::HaproxyBlades]
        );
        assert_eq!(cli.dir_prefix, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.num, 2);
        assert_eq!(cli.error_policy(), ErrorPolicy::Continue);
    }

    #[test]
    fn test_missing_clusters_parses_to_none() {
        let cli = Cli::try_parse_from(["logpilot"]).unwrap();
        assert!(cli.clusters.is_none());
    }

    #[test]
    fn test_unknown_log_type_is_rejected() {
        assert!(Cli::try_parse_from(["logpilot", "-c", "c01", "-l", "platform_blade"]).is_err());
        assert!(Cli::try_parse_from(["logpilot", "-c", "c01", "-l", "kernel"]).is_err());
    }

    #[test]
    fn test_num_must_be_positive() {
        assert!(Cli::try_parse_from(["logpilot", "-c", "c01", "-n", "0"]).is_err());
        assert!(Cli::try_parse_from(["logpilot", "-c", "c01", "-n", "-1"]).is_err());
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["logpilot", "-c", "c01", "--log-format", "xml"]).is_err());
    }
}
