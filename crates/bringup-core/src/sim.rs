//! In-memory debug service.
//!
//! Records every call in order, keeps one physical connection flag per
//! selector, and lets callers inject failures. Used for dry runs (with
//! image-path checking switched on) and throughout the tests.
//!
//! Queries (`is_connected`) are not recorded.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::debug::{DebugServer, DebugSession, Timeout};
use crate::error::TransportError;

/// Kind of a recorded collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    SetConfig,
    OpenSession,
    SetTimeout,
    Stop,
    Connect,
    Disconnect,
    Reset,
    Restart,
    RunAsync,
    Halt,
    LoadImage,
    LoadSymbols,
    EvaluateRoutine,
    Terminate,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Session selector, or `None` for server-level calls.
    pub selector: Option<String>,
    pub kind: CallKind,
    /// Path, routine name, or timeout, when the call carries one.
    pub argument: Option<String>,
}

#[derive(Debug)]
struct SimState {
    calls: Vec<CallRecord>,
    connected: HashSet<String>,
    physical_connects: HashMap<String, usize>,
    faults: HashMap<(String, CallKind), String>,
    routine_faults: HashMap<String, String>,
    require_images: bool,
    timeout: Timeout,
}

impl SimState {
    fn record(&mut self, selector: Option<&str>, kind: CallKind, argument: Option<String>) {
        self.calls.push(CallRecord {
            selector: selector.map(str::to_string),
            kind,
            argument,
        });
    }

    fn injected(&self, selector: &str, kind: CallKind) -> Result<(), TransportError> {
        match self.faults.get(&(selector.to_string(), kind)) {
            Some(detail) => Err(TransportError::new(detail.clone())),
            None => Ok(()),
        }
    }
}

/// Simulated debug server. Clones share state, so a test can keep one
/// clone to inspect calls after handing another to a sequencer.
#[derive(Debug, Clone)]
pub struct SimulatedServer {
    state: Rc<RefCell<SimState>>,
}

impl Default for SimulatedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedServer {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                calls: Vec::new(),
                connected: HashSet::new(),
                physical_connects: HashMap::new(),
                faults: HashMap::new(),
                routine_faults: HashMap::new(),
                require_images: false,
                timeout: Timeout::Unbounded,
            })),
        }
    }

    /// Fail image and symbol loads whose path is not an existing file.
    pub fn require_images(self, require: bool) -> Self {
        self.state.borrow_mut().require_images = require;
        self
    }

    /// Make every `kind` call on `selector` fail with `detail`.
    pub fn fail(&self, selector: &str, kind: CallKind, detail: &str) {
        self.state
            .borrow_mut()
            .faults
            .insert((selector.to_string(), kind), detail.to_string());
    }

    /// Make evaluation of `routine` fail with `detail`.
    pub fn fail_routine(&self, routine: &str, detail: &str) {
        self.state
            .borrow_mut()
            .routine_faults
            .insert(routine.to_string(), detail.to_string());
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.borrow().calls.clone()
    }

    /// Calls of `kind`, in order.
    pub fn calls_of(&self, kind: CallKind) -> Vec<CallRecord> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of calls of `kind`.
    pub fn count(&self, kind: CallKind) -> usize {
        self.state.borrow().calls.iter().filter(|c| c.kind == kind).count()
    }

    /// How many times `selector` went from disconnected to connected.
    pub fn physical_connections(&self, selector: &str) -> usize {
        self.state
            .borrow()
            .physical_connects
            .get(selector)
            .copied()
            .unwrap_or(0)
    }

    /// Whether `selector` is physically connected.
    pub fn is_connected(&self, selector: &str) -> bool {
        self.state.borrow().connected.contains(selector)
    }

    /// The timeout currently in force.
    pub fn timeout(&self) -> Timeout {
        self.state.borrow().timeout
    }
}

impl DebugServer for SimulatedServer {
    type Session = SimulatedSession;

    fn set_config(&mut self, path: &Path) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.record(None, CallKind::SetConfig, Some(path.display().to_string()));
        Ok(())
    }

    fn open_session(&mut self, selector: &str) -> Result<SimulatedSession, TransportError> {
        let mut state = self.state.borrow_mut();
        state.record(Some(selector), CallKind::OpenSession, None);
        state.injected(selector, CallKind::OpenSession)?;
        debug!(selector, "simulated session opened");
        Ok(SimulatedSession {
            selector: selector.to_string(),
            state: Rc::clone(&self.state),
            terminated: false,
        })
    }

    fn set_global_timeout(&mut self, timeout: Timeout) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.record(None, CallKind::SetTimeout, Some(timeout.to_string()));
        state.timeout = timeout;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.record(None, CallKind::Stop, None);
        state.connected.clear();
        Ok(())
    }
}

/// Session handle produced by [`SimulatedServer`].
#[derive(Debug)]
pub struct SimulatedSession {
    selector: String,
    state: Rc<RefCell<SimState>>,
    terminated: bool,
}

impl SimulatedSession {
    /// Record `kind`, then fail if injected, terminated, or (when
    /// `needs_connection`) not connected.
    fn call(
        &self,
        kind: CallKind,
        argument: Option<String>,
        needs_connection: bool,
    ) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.record(Some(&self.selector), kind, argument);
        if self.terminated {
            return Err(TransportError::new("session terminated"));
        }
        state.injected(&self.selector, kind)?;
        if needs_connection && !state.connected.contains(&self.selector) {
            return Err(TransportError::new("target not connected"));
        }
        Ok(())
    }

    fn check_file(&self, path: &Path) -> Result<(), TransportError> {
        if self.state.borrow().require_images && !path.is_file() {
            return Err(TransportError::new(format!(
                "file not found: {}",
                path.display()
            )));
        }
        Ok(())
    }
}

impl DebugSession for SimulatedSession {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Connect, None, false)?;
        let mut state = self.state.borrow_mut();
        if state.connected.insert(self.selector.clone()) {
            *state
                .physical_connects
                .entry(self.selector.clone())
                .or_insert(0) += 1;
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Disconnect, None, false)?;
        self.state.borrow_mut().connected.remove(&self.selector);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Reset, None, true)
    }

    fn restart(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Restart, None, true)
    }

    fn run_async(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::RunAsync, None, true)
    }

    fn halt(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Halt, None, true)
    }

    fn is_connected(&self) -> bool {
        !self.terminated && self.state.borrow().connected.contains(&self.selector)
    }

    fn load_image(&mut self, path: &Path) -> Result<(), TransportError> {
        self.call(CallKind::LoadImage, Some(path.display().to_string()), true)?;
        self.check_file(path)
    }

    fn load_symbols(&mut self, path: &Path) -> Result<(), TransportError> {
        self.call(CallKind::LoadSymbols, Some(path.display().to_string()), true)?;
        self.check_file(path)
    }

    fn evaluate_routine(&mut self, name: &str) -> Result<(), TransportError> {
        self.call(CallKind::EvaluateRoutine, Some(name.to_string()), true)?;
        match self.state.borrow().routine_faults.get(name) {
            Some(detail) => Err(TransportError::new(detail.clone())),
            None => Ok(()),
        }
    }

    fn terminate(&mut self) -> Result<(), TransportError> {
        self.call(CallKind::Terminate, None, false)?;
        self.state.borrow_mut().connected.remove(&self.selector);
        self.terminated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut server = SimulatedServer::new();
        let mut s = server.open_session(".*DSP1").unwrap();
        s.connect().unwrap();
        s.halt().unwrap();
        let kinds: Vec<_> = server.calls().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [CallKind::OpenSession, CallKind::Connect, CallKind::Halt]);
        assert_eq!(server.calls()[1].selector.as_deref(), Some(".*DSP1"));
    }

    #[test]
    fn connect_is_idempotent() {
        let mut server = SimulatedServer::new();
        let mut s = server.open_session(".*DSP1").unwrap();
        s.connect().unwrap();
        s.connect().unwrap();
        assert_eq!(server.physical_connections(".*DSP1"), 1);
        s.disconnect().unwrap();
        assert!(!s.is_connected());
        s.connect().unwrap();
        assert_eq!(server.physical_connections(".*DSP1"), 2);
    }

    #[test]
    fn injected_failure() {
        let mut server = SimulatedServer::new();
        server.fail(".*EVE_1", CallKind::Connect, "JTAG timeout");
        let mut s = server.open_session(".*EVE_1").unwrap();
        assert_eq!(s.connect().unwrap_err().detail, "JTAG timeout");
        assert!(!server.is_connected(".*EVE_1"));
    }

    #[test]
    fn require_images_checks_disk() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ipu.xem4");
        std::fs::write(&present, b"\x7fELF").unwrap();

        let mut server = SimulatedServer::new().require_images(true);
        let mut s = server.open_session(".*IPU1_C0").unwrap();
        s.connect().unwrap();
        assert!(s.load_image(&present).is_ok());
        let err = s.load_image(&dir.path().join("missing.xem4")).unwrap_err();
        assert!(err.detail.starts_with("file not found"));
    }

    #[test]
    fn terminated_session_rejects_calls() {
        let mut server = SimulatedServer::new();
        let mut s = server.open_session(".*A15_0").unwrap();
        s.connect().unwrap();
        s.terminate().unwrap();
        assert!(!s.is_connected());
        assert!(s.connect().is_err());
    }

    #[test]
    fn timeout_tracking() {
        let mut server = SimulatedServer::new();
        server.set_global_timeout(Timeout::from_millis(2_000)).unwrap();
        assert_eq!(server.timeout(), Timeout::from_millis(2_000));
        server.set_global_timeout(Timeout::Unbounded).unwrap();
        assert_eq!(server.timeout(), Timeout::Unbounded);
    }
}
