// ABOUTME: turns one received message into a host command and runs its privileged action.
// ABOUTME: logs every outcome and asks the lifecycle to stop after shutdown or reboot.

use hostcmd_common::Command;
use tracing::{error, info, warn};

use crate::actions::{ActionError, HostActions};
use crate::lifecycle::ShutdownHandle;

pub async fn dispatch(message: &str, host: &dyn HostActions, shutdown: &ShutdownHandle) -> Command {
    let command = Command::parse(message);
    info!(command = command.name(), message, "command message received");

    match &command {
        Command::Shutdown => {
            report("power off", host.power_off().await);
        }
        Command::Reboot => {
            report("reboot", host.reboot().await);
        }
        Command::ServiceRestart => {
            report("service restart", host.restart_service().await);
        }
        Command::ServicePull => {
            report("image pull", host.pull_images().await);
        }
        Command::TimeSync { timestamp } => {
            time_sync(host, timestamp).await;
        }
        Command::Unrecognized(raw) => {
            warn!(message = %raw, "unrecognized command");
        }
    }

    if command.is_terminal() {
        shutdown.request(command.name());
    }
    command
}

async fn time_sync(host: &dyn HostActions, timestamp: &str) {
    if timestamp.is_empty() {
        report("set system time", Err(ActionError::EmptyTimestamp));
        return;
    }

    info!(timestamp, "setting system time");
    let set = host.set_system_clock(timestamp).await;
    let ok = set.is_ok();
    report("set system time", set);
    if ok {
        report("set hardware clock", host.persist_hardware_clock().await);
    }
}

fn report(action: &str, result: Result<(), ActionError>) {
    match result {
        Ok(()) => info!(action, "host action succeeded"),
        Err(err) => match err.captured() {
            Some((stdout, stderr)) => error!(action, error = %err, stdout, stderr, "host action failed"),
            None => error!(action, error = %err, "host action failed"),
        },
    }
}
