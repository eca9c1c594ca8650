use anyhow::{Context, Result};
use russh::keys::ssh_key::Algorithm;
use russh::keys::{decode_secret_key, PrivateKey};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::RemoteHost;

/// Private key formats, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Rsa,
    Dss,
    Ecdsa,
    Ed25519,
}

impl KeyFormat {
    pub const ALL: [KeyFormat; 4] = [
        KeyFormat::Rsa,
        KeyFormat::Dss,
        KeyFormat::Ecdsa,
        KeyFormat::Ed25519,
    ];

    fn accepts(&self, algorithm: &Algorithm) -> bool {
        matches!(
            (self, algorithm),
            (KeyFormat::Rsa, Algorithm::Rsa { .. })
                | (KeyFormat::Dss, Algorithm::Dsa)
                | (KeyFormat::Ecdsa, Algorithm::Ecdsa { .. })
                | (KeyFormat::Ed25519, Algorithm::Ed25519)
        )
    }

    /// Parse `pem` as a key of this format, `None` if it is not one
    pub fn parse(&self, pem: &str) -> Option<PrivateKey> {
        let key = decode_secret_key(pem, None).ok()?;
        self.accepts(&key.algorithm()).then_some(key)
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyFormat::Rsa => "RSA",
            KeyFormat::Dss => "DSS",
            KeyFormat::Ecdsa => "ECDSA",
            KeyFormat::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Key material from {0} is not valid UTF-8")]
    NotUtf8(String),

    #[error("Unsupported key format: {location} is none of RSA, DSS, ECDSA, Ed25519")]
    UnsupportedFormat { location: String },
}

/// Where private key material is read from
pub enum KeySource<'a, S> {
    Local(&'a Path),
    Remote { session: &'a S, path: &'a str },
}

impl<S: RemoteHost> KeySource<'_, S> {
    fn location(&self) -> String {
        match self {
            KeySource::Local(path) => path.display().to_string(),
            KeySource::Remote { session, path } => format!("{}:{}", session.host(), path),
        }
    }
}

/// Read key material as text, from the local disk or over SFTP
pub async fn read_key_material<S: RemoteHost>(source: &KeySource<'_, S>) -> Result<String> {
    match source {
        KeySource::Local(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read key file {}", path.display())),
        KeySource::Remote { session, path } => {
            let bytes = session
                .read_file(path)
                .await
                .with_context(|| format!("Failed to read key file {}:{}", session.host(), path))?;
            String::from_utf8(bytes).map_err(|_| KeyError::NotUtf8(source.location()).into())
        }
    }
}

/// Try each format in [`KeyFormat::ALL`] until one parses
pub fn parse_private_key(pem: &str, location: &str) -> Result<(KeyFormat, PrivateKey), KeyError> {
    for format in KeyFormat::ALL {
        if let Some(key) = format.parse(pem) {
            return Ok((format, key));
        }
        debug!("{} is not a {} key", location, format);
    }
    Err(KeyError::UnsupportedFormat {
        location: location.to_string(),
    })
}

/// Read and parse a private key
pub async fn resolve_key<S: RemoteHost>(source: KeySource<'_, S>) -> Result<Arc<PrivateKey>> {
    let location = source.location();
    let pem = read_key_material(&source).await?;
    let (format, key) = parse_private_key(&pem, &location)?;
    info!("🔑 Loaded {} key from {}", format, location);
    Ok(Arc::new(key))
}
