use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_SSH_USER: &str = "ir";
pub const DEFAULT_BLADE_KEY_PATH: &str = "/home/ir/.ssh/id_rsa";
pub const DEFAULT_REMOTE_LOG_DIR: &str = "/logs/";
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Where the blade private key is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BladeKeyLocation {
    /// Path on the standby controller, read over SFTP
    Remote(String),
    /// Path on the invoking host
    Local(PathBuf),
}

/// SSH credentials and fixed remote paths
#[derive(Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Service account for the cluster entrypoint and controllers
    pub username: String,

    /// Password for the service account. Never defaulted.
    #[serde(skip_serializing)]
    pub password: String,

    /// Account used on the blades
    pub blade_username: String,

    pub blade_key: BladeKeyLocation,

    /// Log directory on every remote host
    pub remote_log_dir: String,

    pub port: u16,
}

impl std::fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("blade_username", &self.blade_username)
            .field("blade_key", &self.blade_key)
            .field("remote_log_dir", &self.remote_log_dir)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_SSH_USER.to_string(),
            password: String::new(),
            blade_username: DEFAULT_SSH_USER.to_string(),
            blade_key: BladeKeyLocation::Remote(DEFAULT_BLADE_KEY_PATH.to_string()),
            remote_log_dir: DEFAULT_REMOTE_LOG_DIR.to_string(),
            port: DEFAULT_SSH_PORT,
        }
    }
}

impl SshConfig {
    /// Load configuration from environment variables (and a `.env` file if present)
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_internal(true)
    }

    #[cfg(test)]
    fn from_env_no_dotenv() -> Result<Self, String> {
        Self::from_env_internal(false)
    }

    fn from_env_internal(load_dotenv: bool) -> Result<Self, String> {
        if load_dotenv {
            let _ = dotenv::dotenv();
        }

        let password = env::var("LOGPILOT_SSH_PASSWORD").map_err(|_| {
            "LOGPILOT_SSH_PASSWORD not found in environment. Please set it in .env file or environment variables."
        })?;

        let mut config = Self {
            password,
            ..Default::default()
        };

        if let Ok(username) = env::var("LOGPILOT_SSH_USER") {
            config.username = username.clone();
            config.blade_username = username;
        }

        if let Ok(blade_username) = env::var("LOGPILOT_BLADE_USER") {
            config.blade_username = blade_username;
        }

        let key_path =
            env::var("LOGPILOT_BLADE_KEY_PATH").unwrap_or_else(|_| DEFAULT_BLADE_KEY_PATH.to_string());
        let key_is_local = env::var("LOGPILOT_BLADE_KEY_LOCAL")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);
        config.blade_key = if key_is_local {
            BladeKeyLocation::Local(PathBuf::from(key_path))
        } else {
            BladeKeyLocation::Remote(key_path)
        };

        if let Ok(dir) = env::var("LOGPILOT_REMOTE_LOG_DIR") {
            config.remote_log_dir = dir;
        }

        if let Ok(port) = env::var("LOGPILOT_SSH_PORT") {
            config.port = port
                .parse::<u16>()
                .map_err(|_| format!("LOGPILOT_SSH_PORT is not a valid port: {}", port))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() || self.blade_username.is_empty() {
            return Err("SSH user is empty".to_string());
        }

        if self.password.is_empty() {
            return Err("LOGPILOT_SSH_PASSWORD is empty".to_string());
        }

        if !self.remote_log_dir.starts_with('/') {
            return Err(format!(
                "Remote log directory must be absolute, got {}",
                self.remote_log_dir
            ));
        }

        if self.port == 0 {
            return Err("SSH port must be greater than 0".to_string());
        }

        Ok(())
    }
}
