// ABOUTME: provides an in-memory HostActions fake that records every invocation.
// ABOUTME: lets dispatch and server tests assert which privileged actions ran.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ActionError, HostActions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    PowerOff,
    Reboot,
    RestartService,
    PullImages,
    SetSystemClock(String),
    PersistHardwareClock,
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    failing: Vec<HostCall>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls matching any of these fail with captured output.
    pub fn failing(failing: Vec<HostCall>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing,
        }
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) -> Result<(), ActionError> {
        let fails = self.failing.iter().any(|f| match (f, &call) {
            (HostCall::SetSystemClock(_), HostCall::SetSystemClock(_)) => true,
            (f, call) => f == call,
        });
        self.calls.lock().unwrap().push(call);

        if fails {
            return Err(ActionError::Failed {
                program: "fake".to_string(),
                status: failed_status(),
                stdout: "fake stdout".to_string(),
                stderr: "fake stderr".to_string(),
            });
        }
        Ok(())
    }
}

fn failed_status() -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(1 << 8)
}

#[async_trait]
impl HostActions for RecordingHost {
    async fn power_off(&self) -> Result<(), ActionError> {
        self.record(HostCall::PowerOff)
    }

    async fn reboot(&self) -> Result<(), ActionError> {
        self.record(HostCall::Reboot)
    }

    async fn restart_service(&self) -> Result<(), ActionError> {
        self.record(HostCall::RestartService)
    }

    async fn pull_images(&self) -> Result<(), ActionError> {
        self.record(HostCall::PullImages)
    }

    async fn set_system_clock(&self, timestamp: &str) -> Result<(), ActionError> {
        self.record(HostCall::SetSystemClock(timestamp.to_string()))
    }

    async fn persist_hardware_clock(&self) -> Result<(), ActionError> {
        self.record(HostCall::PersistHardwareClock)
    }
}
