//! Platform restart primitives.
//!
//! Defines the `RestartPlatform` trait so the coordinator can restart a real
//! device, restart only this process under a supervisor, or record the call in
//! tests.

use super::error::RestartError;
use parking_lot::Mutex;
use std::process::Command;
use std::sync::Arc;
use tracing::info;

/// The operation that actually takes the device down.
pub trait RestartPlatform: Send + Sync + std::fmt::Debug {
    /// Restart. A successful real restart usually never returns; an `Err`
    /// means the restart did not happen.
    fn restart(&self) -> Result<(), RestartError>;

    /// Short name for logs and status output.
    fn name(&self) -> &'static str;
}

/// Exit the process and let the service supervisor start a fresh instance.
#[derive(Debug, Clone, Copy)]
pub struct ExitProcess {
    pub exit_code: i32,
}

impl RestartPlatform for ExitProcess {
    fn restart(&self) -> Result<(), RestartError> {
        info!(exit_code = self.exit_code, "exiting for supervisor restart");
        std::process::exit(self.exit_code)
    }

    fn name(&self) -> &'static str {
        "exit"
    }
}

/// Run an external reboot command such as `systemctl reboot`.
#[derive(Debug, Clone)]
pub struct CommandRestart {
    program: String,
    args: Vec<String>,
}

impl CommandRestart {
    /// Build from a command line split into words; the first word is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self, RestartError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RestartError::platform("restart command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl RestartPlatform for CommandRestart {
    fn restart(&self) -> Result<(), RestartError> {
        info!(command = %self.display(), "invoking restart command");
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| RestartError::platform(format!("could not run `{}`: {e}", self.display())))?;

        if status.success() {
            Ok(())
        } else {
            Err(RestartError::platform(format!(
                "`{}` exited with {status}",
                self.display()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[derive(Debug, Default)]
struct MockRestartState {
    calls: usize,
    failure: Option<String>,
}

/// Restart primitive that only records invocations.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRestart {
    state: Arc<Mutex<MockRestartState>>,
}

impl MockRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// A primitive that always fails with `message`, as if privileges were missing.
    pub fn failing(message: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.set_failure(Some(message.into()));
        mock
    }

    pub fn set_failure(&self, failure: Option<String>) {
        self.state.lock().failure = failure;
    }

    /// How many times the restart primitive was invoked.
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }
}

impl RestartPlatform for MockRestart {
    fn restart(&self) -> Result<(), RestartError> {
        let mut state = self.state.lock();
        state.calls += 1;
        match &state.failure {
            Some(message) => Err(RestartError::platform(message.clone())),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
