//! Contract consumed from the host debug service.
//!
//! The transport itself (session discovery, memory writes, symbol loading,
//! execution control) lives behind these traits. Whoever constructs the
//! server decides how it talks to hardware; the orchestrator only ever
//! receives a ready-made instance.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Global bound the debug service applies to blocking calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    Bounded(Duration),
    Unbounded,
}

impl Timeout {
    /// Bounded timeout from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Timeout::Bounded(Duration::from_millis(ms))
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Bounded(d) => write!(f, "{} ms", d.as_millis()),
            Timeout::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// The debug service: opens per-core sessions and owns global settings.
pub trait DebugServer {
    /// Session handle type produced by this server.
    type Session: DebugSession;

    /// Point the service at a target configuration before sessions open.
    fn set_config(&mut self, path: &Path) -> Result<(), TransportError>;

    /// Open the session whose core matches `selector`.
    fn open_session(&mut self, selector: &str) -> Result<Self::Session, TransportError>;

    /// Bound (or unbound) every subsequent blocking call.
    fn set_global_timeout(&mut self, timeout: Timeout) -> Result<(), TransportError>;

    /// Shut the service down. Sessions must already be terminated.
    fn stop(&mut self) -> Result<(), TransportError>;
}

/// One core's debug session.
///
/// `connect` on an already-connected session is a no-op at this layer.
pub trait DebugSession {
    fn connect(&mut self) -> Result<(), TransportError>;
    fn disconnect(&mut self) -> Result<(), TransportError>;
    fn reset(&mut self) -> Result<(), TransportError>;
    /// Move the program counter back to the loaded image's entry point.
    fn restart(&mut self) -> Result<(), TransportError>;
    /// Start execution without waiting for it to finish or halt.
    fn run_async(&mut self) -> Result<(), TransportError>;
    fn halt(&mut self) -> Result<(), TransportError>;
    /// Whether the physical connection is currently live.
    fn is_connected(&self) -> bool;
    /// Write a program image into target memory.
    fn load_image(&mut self, path: &Path) -> Result<(), TransportError>;
    /// Load debug symbols only.
    fn load_symbols(&mut self, path: &Path) -> Result<(), TransportError>;
    /// Evaluate a named platform routine through this core.
    fn evaluate_routine(&mut self, name: &str) -> Result<(), TransportError>;
    /// Release the session handle itself.
    fn terminate(&mut self) -> Result<(), TransportError>;
}
