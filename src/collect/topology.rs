use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::CollectError;
use crate::ssh::{Auth, Connector, Hop, RemoteHost};

pub const CONTROLLER_1_ADDRESS_CMD: &str =
    "purenetwork list --csv | grep 'fm1.admin0,' | cut -d',' -f5";
pub const CONTROLLER_2_ADDRESS_CMD: &str =
    "purenetwork list --csv | grep 'fm2.admin0,' | cut -d',' -f5";
pub const MASTER_INDEX_CMD: &str =
    "puremastership list | grep master | cut -d'M' -f2 | cut -c1-1";
pub const BLADE_LIST_CMD: &str =
    "pureblade list --notitle | grep -v unused | cut -d' ' -f1 | cut -c7-";

/// Pairing role of a controller within its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerRole {
    One,
    Two,
}

impl ControllerRole {
    pub fn number(&self) -> u8 {
        match self {
            ControllerRole::One => 1,
            ControllerRole::Two => 2,
        }
    }

    /// Zero-based position in [`Topology::controllers`]
    pub fn index(&self) -> usize {
        usize::from(self.number() - 1)
    }

    pub fn peer(&self) -> ControllerRole {
        match self {
            ControllerRole::One => ControllerRole::Two,
            ControllerRole::Two => ControllerRole::One,
        }
    }
}

impl fmt::Display for ControllerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerEndpoint {
    pub role: ControllerRole,
    pub address: String,
}

/// Controllers of one cluster and which of them holds mastership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub cluster: String,
    pub controllers: [ControllerEndpoint; 2],
    pub master: ControllerRole,
}

impl Topology {
    /// Validate raw inspection output
    pub fn from_raw(
        cluster: &str,
        address_1: &str,
        address_2: &str,
        master_index: &str,
    ) -> Result<Self, CollectError> {
        let master = parse_master_index(cluster, master_index)?;

        let endpoint = |role: ControllerRole, address: &str| {
            let address = address.trim();
            if address.is_empty() {
                return Err(CollectError::EmptyAddress {
                    cluster: cluster.to_string(),
                    role,
                });
            }
            Ok(ControllerEndpoint {
                role,
                address: address.to_string(),
            })
        };

        Ok(Self {
            cluster: cluster.to_string(),
            controllers: [
                endpoint(ControllerRole::One, address_1)?,
                endpoint(ControllerRole::Two, address_2)?,
            ],
            master,
        })
    }

    pub fn master(&self) -> &ControllerEndpoint {
        &self.controllers[self.master.index()]
    }

    /// The controller not holding mastership. Blades are reached through it,
    /// as it is the less loaded of the two.
    pub fn standby(&self) -> &ControllerEndpoint {
        &self.controllers[self.master.peer().index()]
    }
}

pub fn parse_master_index(cluster: &str, raw: &str) -> Result<ControllerRole, CollectError> {
    match raw.trim() {
        "1" => Ok(ControllerRole::One),
        "2" => Ok(ControllerRole::Two),
        other => Err(CollectError::InvalidMasterIndex {
            cluster: cluster.to_string(),
            value: other.to_string(),
        }),
    }
}

/// A data node reachable through a controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BladeEndpoint {
    /// Blade number exactly as listed, digits only
    pub id: String,
}

impl BladeEndpoint {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }

    pub fn hostname(&self) -> String {
        format!("ir{}", self.id)
    }
}

/// Parse blade numbers, one per line. `unused` slots are skipped.
pub fn parse_blade_list(host: &str, stdout: &str) -> Result<Vec<BladeEndpoint>, CollectError> {
    let mut blades = Vec::new();
    for entry in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if entry.contains("unused") {
            continue;
        }
        if !entry.chars().all(|c| c.is_ascii_digit()) {
            return Err(CollectError::InvalidBlade {
                host: host.to_string(),
                entry: entry.to_string(),
            });
        }
        blades.push(BladeEndpoint::new(entry));
    }

    if blades.is_empty() {
        return Err(CollectError::EmptyBladeList {
            host: host.to_string(),
        });
    }
    Ok(blades)
}

/// Run an inspection command whose failure makes the topology unknowable
pub async fn inspect<S: RemoteHost>(session: &S, command: &str) -> Result<String> {
    let output = session.exec(command).await?;
    if !output.success() {
        return Err(CollectError::CommandFailed {
            host: session.host().to_string(),
            command: command.to_string(),
            status: output.exit_status,
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(output.trimmed().to_string())
}

async fn read_topology<S: RemoteHost>(session: &S, cluster: &str) -> Result<Topology> {
    let address_1 = inspect(session, CONTROLLER_1_ADDRESS_CMD).await?;
    let address_2 = inspect(session, CONTROLLER_2_ADDRESS_CMD).await?;
    let master_index = inspect(session, MASTER_INDEX_CMD).await?;
    Ok(Topology::from_raw(cluster, &address_1, &address_2, &master_index)?)
}

/// Connect to the cluster entrypoint and discover controller addresses and mastership
pub async fn discover_topology<C: Connector>(
    connector: &C,
    cluster: &str,
    auth: &Auth,
) -> Result<Topology> {
    info!("🔍 Discovering controllers of {}", cluster);

    let session = connector
        .connect(Hop::Root, cluster, auth)
        .await
        .with_context(|| format!("Failed to reach cluster entrypoint {}", cluster))?;
    let topology = read_topology(&session, cluster).await;
    session.close().await;
    let topology = topology?;

    info!(
        "  • sup1={}, sup2={}, master=sup{}, standby=sup{} ({})",
        topology.controllers[0].address,
        topology.controllers[1].address,
        topology.master,
        topology.standby().role,
        topology.standby().address
    );
    Ok(topology)
}

/// List blades attached to the cluster, as seen from a controller session
pub async fn discover_blades<S: RemoteHost>(session: &S) -> Result<Vec<BladeEndpoint>> {
    let stdout = inspect(session, BLADE_LIST_CMD).await?;
    let blades = parse_blade_list(session.host(), &stdout)?;
    info!(
        "  • Found {} blade(s): {}",
        blades.len(),
        blades
            .iter()
            .map(BladeEndpoint::hostname)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(blades)
}
