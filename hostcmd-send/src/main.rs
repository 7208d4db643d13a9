// ABOUTME: provides a cli for asking the privileged hostcmd daemon to act on the host.
// ABOUTME: sends one command over the local unix socket and exits once it is delivered.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hostcmd_common::Command as HostCommand;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "hostcmd-send")]
struct Args {
    #[arg(long, global = true, default_value = hostcmd_common::DEFAULT_SOCKET_PATH)]
    socket_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Shutdown,
    Reboot,
    ServiceRestart,
    ServicePull,
    TimeSync {
        /// RFC 3339 timestamp; defaults to the current time.
        #[arg(long)]
        at: Option<String>,
    },
    /// Send text verbatim.
    Raw { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let command = match args.command {
        Command::Shutdown => HostCommand::Shutdown,
        Command::Reboot => HostCommand::Reboot,
        Command::ServiceRestart => HostCommand::ServiceRestart,
        Command::ServicePull => HostCommand::ServicePull,
        Command::TimeSync { at } => hostcmd_send::time_sync(at.as_deref())?,
        Command::Raw { text } => HostCommand::Unrecognized(text),
    };

    hostcmd_send::send(&args.socket_path, &command).await?;
    let message = command.to_message();
    info!(command = HostCommand::parse(&message).name(), message = %message, "sent");
    Ok(())
}
