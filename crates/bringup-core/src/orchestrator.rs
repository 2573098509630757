//! Core registry and fault-isolated fan-out.

use tracing::{debug, info, warn};

use bringup_platform::CoreDescriptor;

use crate::debug::{DebugServer, DebugSession, Timeout};
use crate::error::TransportError;
use crate::lifecycle;
use crate::result::{Operation, RunResult};

/// One registry entry: a core and the session held for it, if any.
struct Entry<S> {
    core: CoreDescriptor,
    session: Option<S>,
}

/// Owns the debug server, the core registry, and at most one session per core.
///
/// Cores are visited strictly in declaration order. Each per-core operation
/// completes (or fails, and is recorded) before the next core is attempted.
pub struct Orchestrator<S: DebugServer> {
    server: S,
    entries: Vec<Entry<S::Session>>,
}

impl<S: DebugServer> Orchestrator<S> {
    /// Build an orchestrator over `cores` (declaration order is kept).
    pub fn new(server: S, cores: Vec<CoreDescriptor>) -> Self {
        Self {
            server,
            entries: cores
                .into_iter()
                .map(|core| Entry {
                    core,
                    session: None,
                })
                .collect(),
        }
    }

    /// Registered cores in declaration order.
    pub fn cores(&self) -> impl Iterator<Item = &CoreDescriptor> {
        self.entries.iter().map(|e| &e.core)
    }

    pub fn core(&self, id: &str) -> Option<&CoreDescriptor> {
        self.cores().find(|c| c.id == id)
    }

    /// The anchor core: first in declaration order.
    pub fn anchor(&self) -> Option<&CoreDescriptor> {
        self.entries.first().map(|e| &e.core)
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut S {
        &mut self.server
    }

    /// Whether a session is held for `id`.
    pub fn has_session(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.core.id == id && e.session.is_some())
    }

    /// Whether `id`'s session is held and connected.
    pub fn is_live(&self, id: &str) -> bool {
        self.entries
            .iter()
            .find(|e| e.core.id == id)
            .and_then(|e| e.session.as_ref())
            .is_some_and(|s| s.is_connected())
    }

    /// Apply `op` to every core, collecting one result per core.
    pub fn apply_to_all(&mut self, op: Operation) -> Vec<RunResult> {
        self.apply_to_all_then(op, |_, _, _| {})
    }

    /// Apply `op` to every core, calling `after` once each core's step has
    /// completed and before the next core is attempted.
    pub fn apply_to_all_then<F>(&mut self, op: Operation, mut after: F) -> Vec<RunResult>
    where
        F: FnMut(&mut Self, usize, &RunResult),
    {
        debug!(%op, cores = self.entries.len(), "broadcast");
        let mut results = Vec::with_capacity(self.entries.len());
        for index in 0..self.entries.len() {
            let result = self.apply_at(index, op);
            after(self, index, &result);
            results.push(result);
        }
        results
    }

    /// Apply `op` to the core named `id`.
    ///
    /// An unknown id is a configuration failure, not a skip.
    pub fn apply_to_one(&mut self, op: Operation, id: &str) -> RunResult {
        match self.entries.iter().position(|e| e.core.id == id) {
            Some(index) => self.apply_at(index, op),
            None => {
                warn!(core = id, %op, "core not found");
                RunResult::core_not_found(id, op)
            }
        }
    }

    fn apply_at(&mut self, index: usize, op: Operation) -> RunResult {
        let entry = &mut self.entries[index];
        lifecycle::apply(op, &entry.core, &mut entry.session, &mut self.server)
    }

    /// Evaluate a routine through the anchor core's session.
    ///
    /// Returns `None` when the anchor is not live.
    pub fn evaluate_on_anchor(&mut self, routine: &str) -> Option<Result<(), TransportError>> {
        let entry = self.entries.first_mut()?;
        let session = entry.session.as_mut().filter(|s| s.is_connected())?;
        info!(core = %entry.core.id, routine, "evaluating routine");
        Some(session.evaluate_routine(routine))
    }

    pub fn set_global_timeout(&mut self, timeout: Timeout) -> Result<(), TransportError> {
        debug!(%timeout, "setting global timeout");
        self.server.set_global_timeout(timeout)
    }

    /// Replace the registry. A session is kept only when its core remains
    /// with the same id and session selector; every other session is released.
    pub fn rebuild(&mut self, cores: Vec<CoreDescriptor>) {
        let mut old: Vec<Entry<S::Session>> = std::mem::take(&mut self.entries);
        for core in cores {
            let session = old
                .iter_mut()
                .find(|e| e.core.id == core.id && e.core.session_selector == core.session_selector)
                .and_then(|e| e.session.take());
            self.entries.push(Entry { core, session });
        }
        for entry in old {
            if let Some(session) = entry.session {
                release(&entry.core.id, session);
            }
        }
    }

    /// Terminate every held session and stop the server.
    pub fn shutdown(&mut self) -> Result<(), TransportError> {
        for entry in &mut self.entries {
            if let Some(session) = entry.session.take() {
                release(&entry.core.id, session);
            }
        }
        info!("stopping debug server");
        self.server.stop()
    }
}

fn release<T: DebugSession>(id: &str, mut session: T) {
    if session.is_connected() {
        if let Err(e) = session.disconnect() {
            warn!(core = id, error = %e, "disconnect failed during release");
        }
    }
    if let Err(e) = session.terminate() {
        warn!(core = id, error = %e, "terminate failed");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bringup_platform::{BuildVariant, CoreClass};

    use super::*;
    use crate::result::{FailureKind, Outcome};
    use crate::sim::{CallKind, SimulatedServer};

    fn core(id: &str, enabled: bool) -> CoreDescriptor {
        CoreDescriptor {
            id: id.into(),
            class: CoreClass::RealTime,
            session_selector: format!(".*{id}"),
            enabled,
            variant: BuildVariant::release(),
            image_path: PathBuf::from(format!("/fw/{id}.out")),
        }
    }

    fn abc() -> Vec<CoreDescriptor> {
        vec![core("A", true), core("B", true), core("C", true)]
    }

    #[test]
    fn broadcast_visits_declaration_order() {
        let server = SimulatedServer::new();
        let log = server.clone();
        let cores = vec![core("C", true), core("A", true), core("B", true)];
        let mut orch = Orchestrator::new(server, cores);
        let results = orch.apply_to_all(Operation::Connect);
        let ids: Vec<_> = results.iter().map(|r| r.core_id.as_str()).collect();
        assert_eq!(ids, ["C", "A", "B"]);
        let selectors: Vec<_> = log
            .calls_of(CallKind::Connect)
            .into_iter()
            .filter_map(|c| c.selector)
            .collect();
        assert_eq!(selectors, [".*C", ".*A", ".*B"]);
    }

    #[test]
    fn failure_on_one_core_does_not_stop_fan_out() {
        let server = SimulatedServer::new();
        server.fail(".*B", CallKind::LoadImage, "checksum mismatch");
        let mut orch = Orchestrator::new(server, abc());
        let results = orch.apply_to_all(Operation::LoadImage);
        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert_eq!(results[1].error_detail(), Some("checksum mismatch"));
        assert!(results[2].succeeded());
    }

    #[test]
    fn order_holds_despite_failures() {
        let server = SimulatedServer::new();
        let log = server.clone();
        server.fail(".*A", CallKind::Connect, "down");
        let mut orch = Orchestrator::new(server, abc());
        orch.apply_to_all(Operation::Connect);
        let selectors: Vec<_> = log
            .calls_of(CallKind::Connect)
            .into_iter()
            .filter_map(|c| c.selector)
            .collect();
        assert_eq!(selectors, [".*A", ".*B", ".*C"]);
    }

    #[test]
    fn disabled_cores_untouched_by_broadcast() {
        let server = SimulatedServer::new();
        let log = server.clone();
        let mut orch = Orchestrator::new(server, vec![core("A", true), core("B", false)]);
        for op in [Operation::Connect, Operation::LoadImage, Operation::Run] {
            orch.apply_to_all(op);
        }
        assert!(log.calls().iter().all(|c| c.selector.as_deref() != Some(".*B")));
    }

    #[test]
    fn after_hook_runs_between_cores() {
        let mut orch = Orchestrator::new(SimulatedServer::new(), abc());
        let mut seen = Vec::new();
        orch.apply_to_all_then(Operation::Connect, |o, index, result| {
            seen.push((index, result.core_id.clone(), o.is_live("B")));
        });
        assert_eq!(
            seen,
            [
                (0, "A".to_string(), false),
                (1, "B".to_string(), true),
                (2, "C".to_string(), true)
            ]
        );
    }

    #[test]
    fn apply_to_one_unknown_core() {
        let mut orch = Orchestrator::new(SimulatedServer::new(), abc());
        let r = orch.apply_to_one(Operation::Connect, "Z");
        assert_eq!(r.core_id, "Z");
        assert!(matches!(
            r.outcome,
            Outcome::Failed {
                kind: FailureKind::Configuration,
                ..
            }
        ));
        assert!(orch.apply_to_one(Operation::Connect, "B").succeeded());
        assert!(orch.is_live("B"));
        assert!(!orch.is_live("A"));
    }

    #[test]
    fn evaluate_needs_live_anchor() {
        let mut orch = Orchestrator::new(SimulatedServer::new(), abc());
        assert!(orch.evaluate_on_anchor("Init()").is_none());
        orch.apply_to_one(Operation::Connect, "A");
        assert_eq!(orch.evaluate_on_anchor("Init()"), Some(Ok(())));
    }

    #[test]
    fn rebuild_keeps_surviving_sessions() {
        let server = SimulatedServer::new();
        let log = server.clone();
        let mut orch = Orchestrator::new(server, abc());
        orch.apply_to_all(Operation::Connect);

        orch.rebuild(vec![core("A", true), core("C", false)]);
        assert!(orch.is_live("A"));
        assert!(orch.is_live("C"));
        assert!(orch.core("B").is_none());
        assert!(!log.is_connected(".*B"));
        assert_eq!(log.count(CallKind::Terminate), 1);
        assert_eq!(log.count(CallKind::OpenSession), 3);
    }

    #[test]
    fn rebuild_releases_session_when_selector_changes() {
        let server = SimulatedServer::new();
        let log = server.clone();
        let mut orch = Orchestrator::new(server, vec![core("DSP_0", true)]);
        orch.apply_to_all(Operation::Connect);

        let mut moved = core("DSP_0", true);
        moved.session_selector = ".*C66xx_DSP2".into();
        orch.rebuild(vec![moved]);
        assert!(!orch.has_session("DSP_0"));
        assert!(!log.is_connected(".*DSP_0"));
        assert_eq!(log.count(CallKind::Terminate), 1);

        orch.apply_to_all(Operation::LoadImage);
        let loads: Vec<_> = log
            .calls_of(CallKind::LoadImage)
            .into_iter()
            .map(|c| c.selector)
            .collect();
        assert_eq!(loads, [Some(".*C66xx_DSP2".to_string())]);
    }

    #[test]
    fn shutdown_terminates_everything() {
        let server = SimulatedServer::new();
        let log = server.clone();
        let mut orch = Orchestrator::new(server, abc());
        orch.apply_to_all(Operation::Connect);
        orch.shutdown().unwrap();
        assert_eq!(log.count(CallKind::Terminate), 3);
        assert_eq!(log.count(CallKind::Stop), 1);
        assert!(!orch.has_session("A"));
    }
}
