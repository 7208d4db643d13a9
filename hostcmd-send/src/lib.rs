// ABOUTME: provides hostcmd-send helpers for building command messages and delivering them.
// ABOUTME: keeps client behavior simple: one message per connection, then half-close.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use hostcmd_common::Command;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Normalizes an explicit timestamp to UTC, or uses the current time.
pub fn time_sync(at: Option<&str>) -> anyhow::Result<Command> {
    let at = match at {
        Some(at) => DateTime::parse_from_rfc3339(at.trim())
            .with_context(|| format!("timestamp must be RFC 3339: {at}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    Ok(Command::TimeSync {
        timestamp: format_timestamp(at),
    })
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn send(socket_path: &Path, command: &Command) -> anyhow::Result<()> {
    if !socket_path.exists() {
        return Err(anyhow::anyhow!("socket path does not exist: {}", socket_path.display()));
    }

    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    stream.write_all(command.to_message().as_bytes()).await?;
    stream.shutdown().await?;

    // the daemon never replies; wait for it to close its end
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await?;
    Ok(())
}
