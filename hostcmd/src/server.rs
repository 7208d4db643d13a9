// ABOUTME: hosts the unix socket listener that receives one host command per connection.
// ABOUTME: reads each connection to end-of-stream, then dispatches it before accepting the next.

use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use hostcmd_common::Command;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actions::HostActions;
use crate::dispatch;
use crate::lifecycle::{Lifecycle, ShutdownHandle, Trigger};

const READ_CHUNK_BYTES: usize = 512;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Unset means messages are accumulated without a cap.
    pub max_message_bytes: Option<usize>,
}

pub async fn run<F>(config: ServerConfig, host: Arc<dyn HostActions>, external: F) -> anyhow::Result<Trigger>
where
    F: Future<Output = &'static str> + Send + 'static,
{
    let listener = Listener::bind(&config.socket_path).await?;

    let (lifecycle, supervisor, shutdown) = Lifecycle::new();
    let closer = listener.closer();
    let supervisor = tokio::spawn(supervisor.run(external, move || closer.close()));

    listener
        .accept_loop(host.as_ref(), &shutdown, lifecycle.token(), config.max_message_bytes)
        .await;
    lifecycle.listener_closed();

    let trigger = supervisor.await.context("join lifecycle supervisor")?;
    if trigger == Trigger::ListenerClosed {
        warn!("accept loop ended without a shutdown trigger");
    }
    listener.close().await;
    lifecycle.finish();
    Ok(trigger)
}

pub struct Listener {
    listener: Arc<UnixListener>,
    path: PathBuf,
}

/// Shuts the listening socket down from another task. Connects made
/// afterwards are refused while the accept loop finishes its current client.
pub struct ListenerCloser {
    listener: Arc<UnixListener>,
}

impl ListenerCloser {
    pub fn close(&self) {
        let rc = unsafe { libc::shutdown(self.listener.as_raw_fd(), libc::SHUT_RDWR) };
        if rc != 0 {
            warn!(error = %std::io::Error::last_os_error(), "failed to shut down listening socket");
        }
    }
}

impl Listener {
    /// Removes whatever a previous run left at `path`, then binds.
    pub async fn bind(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "removed stale socket"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove existing socket at {}", path.display()));
            }
        }

        let listener = UnixListener::bind(path).with_context(|| format!("bind {}", path.display()))?;
        info!(path = %path.display(), "listening");

        Ok(Self {
            listener: Arc::new(listener),
            path: path.to_path_buf(),
        })
    }

    pub fn closer(&self) -> ListenerCloser {
        ListenerCloser {
            listener: self.listener.clone(),
        }
    }

    /// Accepts and handles connections strictly one after another. Returns
    /// once the token is cancelled, accept fails, or a shutdown or reboot
    /// command was handled.
    pub async fn accept_loop(
        &self,
        host: &dyn HostActions,
        shutdown: &ShutdownHandle,
        token: CancellationToken,
        max_message_bytes: Option<usize>,
    ) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("listener closed");
                    return;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, _addr)) => {
                    let command = handle_client(stream, host, shutdown, max_message_bytes).await;
                    if command.as_ref().is_some_and(Command::is_terminal) {
                        info!("listener closed after terminal command");
                        return;
                    }
                }
                Err(err) => {
                    error!(error = %err, "accept error");
                    return;
                }
            }
        }
    }

    pub async fn close(self) {
        self.closer().close();
        drop(self.listener);
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "removed socket"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "failed to remove socket"),
        }
    }
}

async fn handle_client(
    mut stream: UnixStream,
    host: &dyn HostActions,
    shutdown: &ShutdownHandle,
    max_message_bytes: Option<usize>,
) -> Option<Command> {
    match peer_credentials(&stream) {
        Some(peer) => info!(pid = peer.pid, uid = peer.uid, gid = peer.gid, "client connected"),
        None => info!("client connected"),
    }

    let message = read_message(&mut stream, max_message_bytes).await;
    drop(stream);

    if message.exceeded {
        warn!(
            received = message.received,
            limit = max_message_bytes,
            "message exceeds max bytes, ignoring"
        );
        return None;
    }

    let text = String::from_utf8_lossy(&message.bytes);
    Some(dispatch::dispatch(&text, host, shutdown).await)
}

#[derive(Debug, Default)]
pub struct Message {
    pub bytes: Vec<u8>,
    pub received: usize,
    pub exceeded: bool,
}

/// Accumulates bytes until end-of-stream. A read error ends accumulation
/// and keeps what was read so far.
pub async fn read_message<R>(reader: &mut R, max_message_bytes: Option<usize>) -> Message
where
    R: AsyncRead + Unpin,
{
    let mut message = Message::default();
    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, received = message.received, "error on read");
                break;
            }
        };
        message.received += n;
        debug!(count = n, "read chunk");

        if message.exceeded {
            continue;
        }
        if max_message_bytes.is_some_and(|max| message.received > max) {
            message.exceeded = true;
            message.bytes.clear();
            continue;
        }
        message.bytes.extend_from_slice(&buf[..n]);
    }
    message
}

#[derive(Debug, Clone, Copy)]
struct PeerCredentials {
    pid: i32,
    uid: u32,
    gid: u32,
}

fn peer_credentials(stream: &UnixStream) -> Option<PeerCredentials> {
    let fd = stream.as_raw_fd();

    let mut ucred: libc::ucred = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            (&mut ucred as *mut libc::ucred).cast(),
            &mut len,
        )
    };
    if rc != 0 {
        return None;
    }
    if len as usize != std::mem::size_of::<libc::ucred>() {
        return None;
    }

    Some(PeerCredentials {
        pid: ucred.pid,
        uid: ucred.uid,
        gid: ucred.gid,
    })
}
