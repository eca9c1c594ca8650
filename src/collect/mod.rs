// Module declarations
pub mod collector;
pub mod fetcher;
pub mod logtypes;
pub mod run;
pub mod topology;
pub mod types;

// Re-export types for convenience
pub use collector::ClusterCollector;
pub use logtypes::{HostClass, LogSelection, LogType};
pub use run::{CollectionRun, ErrorPolicy, RunOptions, RunPlan};
pub use topology::{BladeEndpoint, ControllerEndpoint, ControllerRole, Topology};
pub use types::{ClusterReport, ClusterStatus, HostReport, RunMetadata, RunReport};

/// Fatal precondition failures. Any of these aborts the cluster being processed.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("No clusters specified")]
    NoClusters,

    #[error("No log types specified")]
    NoLogTypes,

    #[error("Invalid cluster name '{0}'")]
    InvalidClusterName(String),

    #[error("Master controller index of {cluster} should be 1 or 2, but is '{value}'")]
    InvalidMasterIndex { cluster: String, value: String },

    #[error("Address of controller {role} of {cluster} is empty")]
    EmptyAddress { cluster: String, role: ControllerRole },

    #[error("Blade list from {host} is empty")]
    EmptyBladeList { host: String },

    #[error("Invalid blade entry '{entry}' from {host}")]
    InvalidBlade { host: String, entry: String },

    #[error("Command '{command}' failed on {host} with exit status {status}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        status: u32,
        stderr: String,
    },
}
