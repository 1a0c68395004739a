//! External decision-process bridge
//!
//! Runs a long-lived policy process and trades one JSON line each way per
//! tick: the current [`Observation`] goes to the process's stdin, a
//! `{"desiredSpeed": <number>}` line comes back on its stdout.
//!
//! The exchange blocks until the answer arrives; there is no timeout. Any
//! protocol failure tears the process down and leaves the bridge unusable.
//! Teardown closes stdin, then stdout, waits up to [`SHUTDOWN_GRACE`] for the
//! process to exit and kills it only after that. It runs exactly once whether
//! through [`DecisionBridge::shutdown`], a protocol error or `Drop`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::sim::Observation;

/// How long a process may take to exit after its stdin closes
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Request line payload
pub type DecisionRequest = Observation;

/// Response line payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub desired_speed: f64,
}

/// How to launch the decision process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionProcessConfig {
    pub shell: String,
    /// Arguments placed before the command string
    pub shell_args: Vec<String>,
    pub command: String,
}

impl DecisionProcessConfig {
    /// Run `command` through `sh -c`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            shell: "sh".to_string(),
            shell_args: vec!["-c".to_string()],
            command: command.into(),
        }
    }
}

/// Line-protocol client for one decision process
#[derive(Debug)]
pub struct DecisionBridge {
    command: String,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    child: Option<Child>,
    /// Reused read buffer
    line: String,
    exchanges: u64,
}

impl DecisionBridge {
    /// Start the decision process
    pub fn spawn(config: &DecisionProcessConfig) -> Result<Self, ProtocolError> {
        let launch_error = |source: std::io::Error| ProtocolError::Launch {
            command: config.command.clone(),
            source,
        };

        let mut child = Command::new(&config.shell)
            .args(&config.shell_args)
            .arg(&config.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(launch_error(std::io::Error::other(
                "child process streams were not captured",
            )));
        };

        log::info!(
            "Decision process started (pid {}): {} {}",
            child.id(),
            config.shell,
            config.command
        );

        Ok(Self {
            command: config.command.clone(),
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout)),
            child: Some(child),
            line: String::new(),
            exchanges: 0,
        })
    }

    /// Send one observation and block until the process answers
    pub fn decide(&mut self, observation: &DecisionRequest) -> Result<f64, ProtocolError> {
        if self.child.is_none() {
            return Err(ProtocolError::ShutDown);
        }
        match self.exchange(observation) {
            Ok(speed) => {
                self.exchanges += 1;
                Ok(speed)
            }
            Err(err) => {
                log::error!(
                    "Decision process `{}` failed after {} exchanges: {}",
                    self.command,
                    self.exchanges,
                    err
                );
                self.teardown();
                Err(err)
            }
        }
    }

    fn exchange(&mut self, observation: &DecisionRequest) -> Result<f64, ProtocolError> {
        let (Some(stdin), Some(stdout)) = (self.stdin.as_mut(), self.stdout.as_mut()) else {
            return Err(ProtocolError::ShutDown);
        };

        let mut request = serde_json::to_string(observation).map_err(|e| {
            ProtocolError::Malformed {
                line: String::new(),
                reason: e.to_string(),
            }
        })?;
        request.push('\n');
        stdin.write_all(request.as_bytes())?;
        stdin.flush()?;

        self.line.clear();
        if stdout.read_line(&mut self.line)? == 0 {
            return Err(ProtocolError::Closed);
        }
        parse_response(self.line.trim_end_matches(['\r', '\n']))
    }

    /// Completed request/response pairs
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn is_alive(&self) -> bool {
        self.child.is_some()
    }

    /// OS process id, until teardown
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Close both streams and reap the process
    pub fn shutdown(mut self) -> Option<ExitStatus> {
        self.teardown()
    }

    fn teardown(&mut self) -> Option<ExitStatus> {
        // stdin before stdout; the process sees EOF first
        drop(self.stdin.take());
        drop(self.stdout.take());
        let mut child = self.child.take()?;

        let status = match wait_with_grace(&mut child, SHUTDOWN_GRACE) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                log::warn!(
                    "Decision process did not exit within {SHUTDOWN_GRACE:?}, killing it"
                );
                if let Err(err) = child.kill() {
                    log::warn!("Failed to kill decision process: {err}");
                }
                child.wait()
            }
            Err(err) => Err(err),
        };
        match status {
            Ok(status) => {
                log::info!(
                    "Decision process stopped after {} exchanges ({status})",
                    self.exchanges
                );
                Some(status)
            }
            Err(err) => {
                log::warn!("Failed to reap decision process: {err}");
                None
            }
        }
    }
}

impl Drop for DecisionBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Poll for exit until `grace` runs out
fn wait_with_grace(child: &mut Child, grace: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Decode one response line
pub fn parse_response(line: &str) -> Result<f64, ProtocolError> {
    let malformed = |reason: String| ProtocolError::Malformed {
        line: line.to_string(),
        reason,
    };
    let response: DecisionResponse =
        serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    if !response.desired_speed.is_finite() {
        return Err(malformed("desiredSpeed is not finite".to_string()));
    }
    Ok(response.desired_speed)
}
