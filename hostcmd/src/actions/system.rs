// ABOUTME: runs the privileged host programs (power, service, clock) as child processes.
// ABOUTME: reports each program's exit status and captured output as a typed result.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ActionError, HostActions};

const MAX_STDIO_BYTES: usize = 8192;
const DATE_FORMAT: &str = "+%Y-%m-%dT%H:%M:%S.%3NZ";

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub service: String,
    pub compose_file: PathBuf,
    pub env_file: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            service: "databeam.service".to_string(),
            compose_file: PathBuf::from("/opt/databeam/docker-compose.yml"),
            env_file: PathBuf::from("/opt/databeam/.env"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemHost {
    config: HostConfig,
}

impl SystemHost {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    fn compose_pull_argv(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "--env-file".to_string(),
            self.config.env_file.to_string_lossy().into_owned(),
            "-f".to_string(),
            self.config.compose_file.to_string_lossy().into_owned(),
            "pull".to_string(),
        ]
    }
}

#[async_trait]
impl HostActions for SystemHost {
    async fn power_off(&self) -> Result<(), ActionError> {
        run("poweroff", &[]).await
    }

    async fn reboot(&self) -> Result<(), ActionError> {
        run("reboot", &[]).await
    }

    async fn restart_service(&self) -> Result<(), ActionError> {
        run("systemctl", &["restart".to_string(), self.config.service.clone()]).await
    }

    async fn pull_images(&self) -> Result<(), ActionError> {
        run("docker", &self.compose_pull_argv()).await
    }

    async fn set_system_clock(&self, timestamp: &str) -> Result<(), ActionError> {
        if timestamp.is_empty() {
            return Err(ActionError::EmptyTimestamp);
        }
        let args = [
            DATE_FORMAT.to_string(),
            "-u".to_string(),
            "-s".to_string(),
            timestamp.to_string(),
        ];
        run("date", &args).await
    }

    async fn persist_hardware_clock(&self) -> Result<(), ActionError> {
        run("hwclock", &["-w".to_string()]).await
    }
}

async fn run(program: &str, args: &[String]) -> Result<(), ActionError> {
    debug!(program, ?args, "running host program");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| ActionError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        return Ok(());
    }

    Err(ActionError::Failed {
        program: program.to_string(),
        status: output.status,
        stdout: truncate_bytes(&output.stdout),
        stderr: truncate_bytes(&output.stderr),
    })
}

fn truncate_bytes(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_STDIO_BYTES {
        return String::from_utf8_lossy(bytes).to_string();
    }

    let mut out = String::from_utf8_lossy(&bytes[..MAX_STDIO_BYTES]).to_string();
    out.push_str("\n[truncated]\n");
    out
}
