// ABOUTME: coordinates daemon teardown from os signals or from a handled shutdown/reboot command.
// ABOUTME: funnels both triggers into one supervisor that cancels the accept loop exactly once.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    External(&'static str),
    Requested(&'static str),
    ListenerClosed,
}

/// Cloneable handle the dispatcher uses to ask for teardown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<&'static str>,
}

impl ShutdownHandle {
    /// Never blocks. Requests after the first are dropped.
    pub fn request(&self, reason: &'static str) {
        match self.tx.try_send(reason) {
            Ok(()) => debug!(reason, "shutdown requested"),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                debug!(reason, "shutdown already in progress");
            }
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    token: CancellationToken,
    phase: Arc<watch::Sender<Phase>>,
}

#[derive(Debug)]
pub struct Supervisor {
    requests: mpsc::Receiver<&'static str>,
    token: CancellationToken,
    phase: Arc<watch::Sender<Phase>>,
}

impl Lifecycle {
    pub fn new() -> (Lifecycle, Supervisor, ShutdownHandle) {
        let (tx, requests) = mpsc::channel(1);
        let (phase, _) = watch::channel(Phase::Running);
        let phase = Arc::new(phase);
        let token = CancellationToken::new();

        let lifecycle = Lifecycle {
            token: token.clone(),
            phase: phase.clone(),
        };
        let supervisor = Supervisor {
            requests,
            token,
            phase,
        };
        (lifecycle, supervisor, ShutdownHandle { tx })
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[cfg(test)]
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Stops the supervisor when the accept loop ended on its own.
    pub fn listener_closed(&self) {
        self.token.cancel();
    }

    pub fn finish(&self) {
        self.phase.send_replace(Phase::Terminated);
        info!("hostcmd stopped");
    }
}

impl Supervisor {
    /// Waits for the first trigger, then runs `close_listener` so new
    /// connections are refused before the accept loop is cancelled.
    pub async fn run<F, C>(mut self, external: F, close_listener: C) -> Trigger
    where
        F: Future<Output = &'static str>,
        C: FnOnce(),
    {
        let trigger = tokio::select! {
            biased;
            signal = external => Trigger::External(signal),
            Some(reason) = self.requests.recv() => Trigger::Requested(reason),
            _ = self.token.cancelled() => Trigger::ListenerClosed,
        };

        self.phase.send_replace(Phase::Draining);
        info!(?trigger, "draining");
        close_listener();
        self.token.cancel();
        trigger
    }
}

/// Resolves on SIGINT or SIGTERM with the signal's name.
pub async fn wait_for_termination() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
