//! Transport Layer
//!
//! Abstracts how a request document reaches the execution service. Provides:
//! - Transport trait: the single `dispatch` operation the orchestrator blocks on
//! - MockTransport: in-process simulated host for tests
//! - CommandTransport: spawns a configured command speaking JSON over stdio

use std::io;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use hostcall_protocol::{RequestDocument, ResponseDocument};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mock::MockHost;

/// Delivers one request and returns the raw response
pub trait Transport: Send + Sync {
    /// Send `request` and block until a response or a channel failure
    fn dispatch(&self, request: &RequestDocument) -> Result<ResponseDocument, TransportError>;
}

/// Transport errors; no response body was obtained
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Command error: {0}")]
    Command(String),
}

/// Mock transport: hands the document straight to an in-process [`MockHost`]
pub struct MockTransport {
    host: MockHost,
    disconnected: AtomicBool,
}

impl MockTransport {
    /// Create a new mock transport with an empty host
    pub fn new() -> Self {
        Self::with_host(MockHost::new())
    }

    /// Create a mock transport around a pre-configured host
    pub fn with_host(host: MockHost) -> Self {
        Self {
            host,
            disconnected: AtomicBool::new(false),
        }
    }

    /// Get a reference to the underlying host for test configuration
    pub fn host(&self) -> &MockHost {
        &self.host
    }

    /// Make every following dispatch fail as if the channel dropped
    pub fn set_disconnected(&self, disconnected: bool) {
        self.disconnected.store(disconnected, Ordering::SeqCst);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn dispatch(&self, request: &RequestDocument) -> Result<ResponseDocument, TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "mock host is disconnected".to_string(),
            ));
        }
        Ok(self.host.handle_request(request))
    }
}

/// Command transport configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Executable to spawn; empty means no transport is configured
    #[serde(default)]
    pub command: String,
    /// Arguments passed before any request data
    #[serde(default)]
    pub args: Vec<String>,
}

/// Transport that runs a command per call.
///
/// Format: single JSON request line on stdin → single JSON response on stdout.
pub struct CommandTransport {
    config: CommandConfig,
}

impl CommandTransport {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }
}

impl Transport for CommandTransport {
    fn dispatch(&self, request: &RequestDocument) -> Result<ResponseDocument, TransportError> {
        if self.config.command.trim().is_empty() {
            return Err(TransportError::ConnectionFailed(
                "no transport command configured".to_string(),
            ));
        }

        let request_json = serde_json::to_string(request)?;
        debug!(command = %self.config.command, request_id = %request.request_id, "Spawning transport command");

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!(
                    "Failed to spawn '{}': {}",
                    self.config.command, e
                ))
            })?;

        // Dropping stdin after the write closes it so the command sees EOF.
        // A command that exits without reading is judged by its exit status.
        if let Some(mut stdin) = child.stdin.take() {
            use std::io::Write;
            if let Err(e) = writeln!(stdin, "{}", request_json) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| TransportError::Command(format!("Process error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Command(format!(
                "'{}' exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }

        ResponseDocument::from_json(&output.stdout)
            .map_err(|e| TransportError::Protocol(format!("Invalid response JSON: {}", e)))
    }
}
