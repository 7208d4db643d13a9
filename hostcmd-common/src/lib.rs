// ABOUTME: defines the host command vocabulary shared by hostcmd and hostcmd-send.
// ABOUTME: maps raw socket messages to commands and commands back to wire text.

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/databeam_hostcmd.sock";

pub const SHUTDOWN: &str = "dotheshutdown";
pub const REBOOT: &str = "dothereboot";
pub const SERVICE_RESTART: &str = "dothedockerrestart";
pub const SERVICE_PULL: &str = "dothedockerpull";
pub const TIME_SYNC: &str = "dothetimesync";
pub const TIME_SYNC_DELIMITER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Shutdown,
    Reboot,
    ServiceRestart,
    ServicePull,
    TimeSync { timestamp: String },
    Unrecognized(String),
}

impl Command {
    /// Classifies one complete message. Literals are case-sensitive and
    /// matched exactly, except time sync which only needs to be contained.
    pub fn parse(message: &str) -> Command {
        match message {
            SHUTDOWN => Command::Shutdown,
            REBOOT => Command::Reboot,
            SERVICE_RESTART => Command::ServiceRestart,
            SERVICE_PULL => Command::ServicePull,
            _ if message.contains(TIME_SYNC) => {
                let timestamp = message
                    .split_once(TIME_SYNC_DELIMITER)
                    .map(|(_, rest)| rest)
                    .unwrap_or_default();
                Command::TimeSync {
                    timestamp: timestamp.to_string(),
                }
            }
            _ => Command::Unrecognized(message.to_string()),
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Command::Shutdown => SHUTDOWN.to_string(),
            Command::Reboot => REBOOT.to_string(),
            Command::ServiceRestart => SERVICE_RESTART.to_string(),
            Command::ServicePull => SERVICE_PULL.to_string(),
            Command::TimeSync { timestamp } => format!("{TIME_SYNC}{TIME_SYNC_DELIMITER}{timestamp}"),
            Command::Unrecognized(raw) => raw.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Shutdown => "shutdown",
            Command::Reboot => "reboot",
            Command::ServiceRestart => "service_restart",
            Command::ServicePull => "service_pull",
            Command::TimeSync { .. } => "time_sync",
            Command::Unrecognized(_) => "unrecognized",
        }
    }

    /// Shutdown and reboot end the daemon once handled, whatever the outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Command::Shutdown | Command::Reboot)
    }
}
