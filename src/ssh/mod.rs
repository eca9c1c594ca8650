// Module declarations
pub mod keys;
pub mod session;

use anyhow::Result;
use async_trait::async_trait;
use russh::keys::PrivateKey;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use keys::{parse_private_key, read_key_material, resolve_key, KeyError, KeyFormat, KeySource};
pub use session::{RemoteSession, SshConnector};

/// Where the next hop connects from.
///
/// `Root` dials from the local network stack, `Tunneled` opens a
/// `direct-tcpip` channel through an already authenticated session.
pub enum Hop<'a, S> {
    Root,
    Tunneled(&'a S),
}

impl<S> Clone for Hop<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Hop<'_, S> {}

impl<'a, S: RemoteHost> Hop<'a, S> {
    /// Human readable description used in status lines
    pub fn describe(&self) -> String {
        match self {
            Hop::Root => "local host".to_string(),
            Hop::Tunneled(parent) => format!("tunnel via {}", parent.host()),
        }
    }
}

/// Credentials presented to a hop
#[derive(Clone)]
pub enum Auth {
    Password { username: String, password: String },
    Key { username: String, key: Arc<PrivateKey> },
}

impl Auth {
    pub fn username(&self) -> &str {
        match self {
            Auth::Password { username, .. } | Auth::Key { username, .. } => username,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Auth::Password { .. } => "password",
            Auth::Key { .. } => "publickey",
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("username", &self.username())
            .field("method", &self.method())
            .finish()
    }
}

/// Captured result of a single remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Standard output with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// An authenticated session to one hop.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Host name or address this session is connected to
    fn host(&self) -> &str;

    /// Run one command and wait for it to exit
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Read a remote file over SFTP
    async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>>;

    /// Copy a remote file into `local_dir`, keeping its modification time.
    /// Returns the local path written.
    async fn download(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf>;

    /// Tear down the session. Called exactly once by the scope that opened it.
    async fn close(&self);
}

/// Builds sessions, either directly or through a parent session.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: RemoteHost;

    async fn connect(
        &self,
        hop: Hop<'_, Self::Session>,
        target: &str,
        auth: &Auth,
    ) -> Result<Self::Session>;
}
