// ABOUTME: declares the privileged host operations the daemon performs for its caller.
// ABOUTME: keeps the real process-spawning runner behind a trait so dispatch can be tested.

pub mod system;

#[cfg(test)]
pub mod recording;

use std::process::ExitStatus;

use async_trait::async_trait;

pub use system::{HostConfig, SystemHost};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("refusing to set the clock from an empty timestamp")]
    EmptyTimestamp,
}

impl ActionError {
    /// Captured output of a program that ran and failed, if any.
    pub fn captured(&self) -> Option<(&str, &str)> {
        match self {
            ActionError::Failed { stdout, stderr, .. } => Some((stdout.as_str(), stderr.as_str())),
            _ => None,
        }
    }
}

#[async_trait]
pub trait HostActions: Send + Sync {
    async fn power_off(&self) -> Result<(), ActionError>;
    async fn reboot(&self) -> Result<(), ActionError>;
    async fn restart_service(&self) -> Result<(), ActionError>;
    async fn pull_images(&self) -> Result<(), ActionError>;
    async fn set_system_clock(&self, timestamp: &str) -> Result<(), ActionError>;
    async fn persist_hardware_clock(&self) -> Result<(), ActionError>;
}
