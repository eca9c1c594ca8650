use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use russh::client::{self, AuthResult, Config, Handle, Handler};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{Auth, CommandOutput, Connector, Hop, RemoteHost};

/// russh client handler. Server host keys are accepted without verification:
/// the cluster hosts live on a trusted internal network.
#[derive(Clone, Debug, Default)]
pub struct ClientHandler;

impl Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens SSH sessions, either from the local host or tunneled through a parent session
pub struct SshConnector {
    config: Arc<Config>,
    port: u16,
}

impl SshConnector {
    pub fn new(port: u16) -> Self {
        let config = Config {
            // no inactivity timeout: remote commands may stay silent for a long time
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            port,
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = RemoteSession;

    async fn connect(
        &self,
        hop: Hop<'_, RemoteSession>,
        target: &str,
        auth: &Auth,
    ) -> Result<RemoteSession> {
        info!(
            "🔐 Connecting to {} as {} ({}, {})",
            target,
            auth.username(),
            auth.method(),
            hop.describe()
        );

        let mut handle = match hop {
            Hop::Root => client::connect(self.config.clone(), (target, self.port), ClientHandler)
                .await
                .with_context(|| format!("SSH connect to {}:{} failed", target, self.port))?,
            Hop::Tunneled(parent) => {
                let channel = parent
                    .handle
                    .channel_open_direct_tcpip(target, u32::from(self.port), "127.0.0.1", 0)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to open tunnel to {}:{} through {}",
                            target, self.port, parent.host
                        )
                    })?;
                client::connect_stream(self.config.clone(), channel.into_stream(), ClientHandler)
                    .await
                    .with_context(|| {
                        format!("SSH handshake with {} through {} failed", target, parent.host)
                    })?
            }
        };

        authenticate(&mut handle, auth)
            .await
            .with_context(|| format!("Authentication to {} failed", target))?;
        debug!("Authenticated to {}", target);

        Ok(RemoteSession {
            host: target.to_string(),
            handle,
        })
    }
}

async fn authenticate(handle: &mut Handle<ClientHandler>, auth: &Auth) -> Result<()> {
    let result = match auth {
        Auth::Password { username, password } => {
            handle
                .authenticate_password(username.clone(), password.clone())
                .await?
        }
        Auth::Key { username, key } => {
            // Prefer SHA-256 for RSA if applicable (ignored for non-RSA keys)
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            handle
                .authenticate_publickey(
                    username.clone(),
                    PrivateKeyWithHashAlg::new(key.clone(), hash_alg),
                )
                .await?
        }
    };

    match result {
        AuthResult::Success => Ok(()),
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } => Err(anyhow!(
            "{} authentication rejected (remaining_methods={:?}, partial_success={})",
            auth.method(),
            remaining_methods,
            partial_success
        )),
    }
}

/// An authenticated russh session to one host
pub struct RemoteSession {
    host: String,
    handle: Handle<ClientHandler>,
}

impl RemoteSession {
    async fn sftp(&self) -> Result<SftpSession> {
        let channel = self.handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .with_context(|| format!("Failed to start SFTP on {}", self.host))?;
        Ok(sftp)
    }

    async fn download_with(
        &self,
        sftp: &SftpSession,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<PathBuf> {
        let file_name = remote_file_name(remote_path)?;
        let local_path = local_dir.join(file_name);

        let attrs = sftp
            .metadata(remote_path)
            .await
            .with_context(|| format!("stat {}:{}", self.host, remote_path))?;
        let mut remote = sftp
            .open(remote_path)
            .await
            .with_context(|| format!("open {}:{}", self.host, remote_path))?;
        let mut local = tokio::fs::File::create(&local_path)
            .await
            .with_context(|| format!("create {}", local_path.display()))?;

        let bytes = tokio::io::copy(&mut remote, &mut local).await?;
        local.flush().await?;
        debug!("Copied {} bytes from {}:{}", bytes, self.host, remote_path);

        let local = local.into_std().await;
        apply_remote_times(&local, attrs.mtime, attrs.atime)
            .with_context(|| format!("set times on {}", local_path.display()))?;

        Ok(local_path)
    }
}

#[async_trait]
impl RemoteHost for RemoteSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        let mut chan = self.handle.channel_open_session().await?;
        debug!("executing on {}: '{}'", self.host, command);
        chan.exec(true, command).await.context("exec request")?;

        let mut capture = ExecCapture::default();
        while let Some(msg) = chan.wait().await {
            if capture.handle(&msg) {
                break;
            }
        }

        capture
            .finish()
            .with_context(|| format!("'{}' on {}", command, self.host))
    }

    async fn read_file(&self, remote_path: &str) -> Result<Vec<u8>> {
        let sftp = self.sftp().await?;
        let data = sftp
            .read(remote_path)
            .await
            .with_context(|| format!("read {}:{}", self.host, remote_path));
        let _ = sftp.close().await;
        data
    }

    async fn download(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf> {
        let sftp = self.sftp().await?;
        let result = self.download_with(&sftp, remote_path, local_dir).await;
        let _ = sftp.close().await;
        result
    }

    async fn close(&self) {
        debug!("Closing session to {}", self.host);
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("Disconnect from {} reported: {}", self.host, e);
        }
    }
}

/// Output of one remote command, accumulated from channel messages
#[derive(Debug, Default)]
struct ExecCapture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    signal: Option<String>,
}

impl ExecCapture {
    /// Record one message. Returns true once the channel is closed.
    fn handle(&mut self, msg: &ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => self.exit_status = Some(*exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                self.signal = Some(format!("{:?}", signal_name))
            }
            ChannelMsg::Close => return true,
            _ => {}
        }
        false
    }

    /// A command killed by a signal reports `128 + signal` like a shell does.
    /// A channel that ended without any exit report is an error.
    fn finish(self) -> Result<CommandOutput> {
        let exit_status = match (self.exit_status, &self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => {
                warn!("Remote command was killed by signal {}", signal);
                128 + signal_number(signal)
            }
            (None, None) => {
                return Err(anyhow!(
                    "Channel closed before the remote command reported an exit status"
                ))
            }
        };

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        })
    }
}

/// POSIX number of a signal name, 0 when unknown
fn signal_number(name: &str) -> u32 {
    match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "ABRT" => 6,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        _ => 0,
    }
}

/// Last path component of a remote path
pub fn remote_file_name(remote_path: &str) -> Result<&str> {
    remote_path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| anyhow!("Remote path has no file name: {}", remote_path))
}

/// Copy the remote modification/access times (seconds since epoch) onto a local file
pub fn apply_remote_times(file: &File, mtime: Option<u32>, atime: Option<u32>) -> Result<()> {
    let Some(mtime) = mtime else {
        return Ok(());
    };
    let to_system_time = |secs: u32| UNIX_EPOCH + Duration::from_secs(u64::from(secs));
    let modified: SystemTime = to_system_time(mtime);
    let accessed = atime.map(to_system_time).unwrap_or(modified);

    file.set_times(FileTimes::new().set_modified(modified).set_accessed(accessed))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::{CryptoVec, Sig};
    use tempfile::TempDir;

    fn exit_signal(signal_name: Sig) -> ChannelMsg {
        ChannelMsg::ExitSignal {
            signal_name,
            core_dumped: false,
            error_message: String::new(),
            lang_tag: String::new(),
        }
    }

    #[test]
    fn test_exec_capture_accumulates_output() {
        let mut capture = ExecCapture::default();

        let msg = ChannelMsg::Data {
            data: CryptoVec::from_slice(b"10.0.0.1\n"),
        };
        assert!(!capture.handle(&msg));
        let msg = ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"warning"),
            ext: 1,
        };
        assert!(!capture.handle(&msg));
        assert!(!capture.handle(&ChannelMsg::ExitStatus { exit_status: 2 }));
        assert!(capture.handle(&ChannelMsg::Close));

        let output = capture.finish().unwrap();
        assert_eq!(output.stdout, "10.0.0.1\n");
        assert_eq!(output.stderr, "warning");
        assert_eq!(output.exit_status, 2);
        assert!(!output.success());
    }

    #[test]
    fn test_exec_capture_killed_by_signal_is_a_failure() {
        let mut capture = ExecCapture::default();
        capture.handle(&ChannelMsg::Data {
            data: CryptoVec::from_slice(b"middleware.log.2\n"),
        });
        capture.handle(&exit_signal(Sig::KILL));
        assert!(capture.handle(&ChannelMsg::Close));

        let output = capture.finish().unwrap();
        assert_eq!(output.exit_status, 137);
        assert!(!output.success());
    }

    #[test]
    fn test_exec_capture_unknown_signal_is_still_a_failure() {
        let mut capture = ExecCapture::default();
        capture.handle(&exit_signal(Sig::Custom("XCPU".to_string())));

        let output = capture.finish().unwrap();
        assert_eq!(output.exit_status, 128);
        assert!(!output.success());
    }

    #[test]
    fn test_exec_capture_without_exit_report_is_an_error() {
        let mut capture = ExecCapture::default();
        capture.handle(&ChannelMsg::Data {
            data: CryptoVec::from_slice(b"partial"),
        });
        assert!(capture.handle(&ChannelMsg::Close));

        assert!(capture.finish().is_err());
        assert!(ExecCapture::default().finish().is_err());
    }

    #[test]
    fn test_remote_file_name() {
        assert_eq!(remote_file_name("/logs/middleware.log.2").unwrap(), "middleware.log.2");
        assert_eq!(remote_file_name("nfs.log").unwrap(), "nfs.log");
        assert!(remote_file_name("/logs/").is_err());
        assert!(remote_file_name("/logs/..").is_err());
    }

    #[test]
    fn test_apply_remote_times_sets_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("platform.log");
        std::fs::write(&path, "line\n").unwrap();

        let file = File::options().write(true).open(&path).unwrap();
        apply_remote_times(&file, Some(1_700_000_000), None).unwrap();
        drop(file);

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(
            modified.duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_700_000_000
        );
    }

    #[test]
    fn test_apply_remote_times_without_mtime_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("system.log");
        std::fs::write(&path, "line\n").unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let file = File::options().write(true).open(&path).unwrap();
        apply_remote_times(&file, None, Some(5)).unwrap();
        drop(file);

        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    }
}
