// ABOUTME: runs the privileged daemon that performs host power, service and clock actions.
// ABOUTME: listens on a local unix socket for one short text command per connection.

mod actions;
mod dispatch;
mod lifecycle;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use actions::{HostConfig, SystemHost};
use server::ServerConfig;

#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = hostcmd_common::DEFAULT_SOCKET_PATH)]
    socket_path: PathBuf,

    /// systemd unit restarted by the service restart command.
    #[arg(long, default_value = "databeam.service")]
    service: String,

    #[arg(long, default_value = "/opt/databeam/docker-compose.yml")]
    compose_file: PathBuf,

    #[arg(long, default_value = "/opt/databeam/.env")]
    env_file: PathBuf,

    /// Ignore messages larger than this. Unbounded when unset.
    #[arg(long)]
    max_message_bytes: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    info!(socket_path = %args.socket_path.display(), "hostcmd starting");

    let host = SystemHost::new(HostConfig {
        service: args.service,
        compose_file: args.compose_file,
        env_file: args.env_file,
    });
    let config = ServerConfig {
        socket_path: args.socket_path,
        max_message_bytes: args.max_message_bytes,
    };

    let trigger = server::run(config, Arc::new(host), lifecycle::wait_for_termination()).await?;
    info!(?trigger, "byebye");
    Ok(())
}
