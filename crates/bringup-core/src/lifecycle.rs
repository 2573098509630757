//! Per-core lifecycle operations.
//!
//! Each operation takes one core, the slot holding that core's session (if
//! one has been opened), and the debug server, and returns exactly one
//! [`RunResult`]. Guards are applied here so callers never pre-check state:
//!
//! | operation      | guard                        |
//! |----------------|------------------------------|
//! | connect        | enabled                      |
//! | disconnect     | a session is held            |
//! | reset, halt    | session connected            |
//! | restart, run   | enabled                      |
//! | load-image     | enabled, auto-connects       |
//! | load-symbols   | enabled, auto-connects       |

use tracing::{debug, info};

use bringup_platform::CoreDescriptor;

use crate::debug::{DebugServer, DebugSession};
use crate::error::TransportError;
use crate::result::{Operation, RunResult, SkipReason};

/// Dispatch `op` to the matching operation.
pub fn apply<S: DebugServer>(
    op: Operation,
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    match op {
        Operation::Connect => connect(core, slot, server),
        Operation::Disconnect => disconnect(core, slot),
        Operation::Reset => reset(core, slot),
        Operation::Restart => restart(core, slot, server),
        Operation::Run => run(core, slot, server),
        Operation::Halt => halt(core, slot),
        Operation::LoadImage => load_image(core, slot, server),
        Operation::LoadSymbols => load_symbols(core, slot, server),
    }
}

/// Open the core's session on first use.
fn acquire<'a, S: DebugServer>(
    core: &CoreDescriptor,
    slot: &'a mut Option<S::Session>,
    server: &mut S,
) -> Result<&'a mut S::Session, TransportError> {
    let session = match slot.take() {
        Some(session) => session,
        None => {
            debug!(core = %core.id, selector = %core.session_selector, "opening session");
            server.open_session(&core.session_selector)?
        }
    };
    Ok(slot.insert(session))
}

/// The held session, if it is connected.
fn live<S: DebugSession>(slot: &mut Option<S>) -> Option<&mut S> {
    slot.as_mut().filter(|s| s.is_connected())
}

/// Connect an enabled core, opening its session if needed.
pub fn connect<S: DebugServer>(
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    if !core.enabled {
        return RunResult::skipped(core, Operation::Connect, SkipReason::Disabled);
    }
    info!(core = %core.id, "connecting");
    let attempt = acquire(core, slot, server).and_then(|s| s.connect());
    RunResult::from_attempt(core, Operation::Connect, attempt)
}

/// Release the core's connection whether or not it is enabled.
pub fn disconnect<S: DebugSession>(core: &CoreDescriptor, slot: &mut Option<S>) -> RunResult {
    match slot.as_mut() {
        Some(session) => {
            info!(core = %core.id, "disconnecting");
            RunResult::from_attempt(core, Operation::Disconnect, session.disconnect())
        }
        None => RunResult::skipped(core, Operation::Disconnect, SkipReason::NoSession),
    }
}

/// Reset a core whose connection is live.
pub fn reset<S: DebugSession>(core: &CoreDescriptor, slot: &mut Option<S>) -> RunResult {
    match live(slot) {
        Some(session) => {
            info!(core = %core.id, "resetting");
            RunResult::from_attempt(core, Operation::Reset, session.reset())
        }
        None => RunResult::skipped(core, Operation::Reset, SkipReason::NotConnected),
    }
}

/// Restart an enabled core from its image's entry point.
pub fn restart<S: DebugServer>(
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    if !core.enabled {
        return RunResult::skipped(core, Operation::Restart, SkipReason::Disabled);
    }
    info!(core = %core.id, "restarting");
    let attempt = acquire(core, slot, server).and_then(|s| s.restart());
    RunResult::from_attempt(core, Operation::Restart, attempt)
}

/// Start an enabled core without waiting on it.
pub fn run<S: DebugServer>(
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    if !core.enabled {
        return RunResult::skipped(core, Operation::Run, SkipReason::Disabled);
    }
    info!(core = %core.id, "running");
    let attempt = acquire(core, slot, server).and_then(|s| s.run_async());
    RunResult::from_attempt(core, Operation::Run, attempt)
}

/// Halt a core whose connection is live.
pub fn halt<S: DebugSession>(core: &CoreDescriptor, slot: &mut Option<S>) -> RunResult {
    match live(slot) {
        Some(session) => {
            info!(core = %core.id, "halting");
            RunResult::from_attempt(core, Operation::Halt, session.halt())
        }
        None => RunResult::skipped(core, Operation::Halt, SkipReason::NotConnected),
    }
}

/// Connect if needed, then write the core's program image.
pub fn load_image<S: DebugServer>(
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    if !core.enabled {
        return RunResult::skipped(core, Operation::LoadImage, SkipReason::Disabled);
    }
    info!(core = %core.id, image = %core.image_path.display(), "loading image");
    let attempt = connected(core, slot, server).and_then(|s| s.load_image(&core.image_path));
    RunResult::from_attempt(core, Operation::LoadImage, attempt)
}

/// Connect if needed, then load the core's debug symbols.
pub fn load_symbols<S: DebugServer>(
    core: &CoreDescriptor,
    slot: &mut Option<S::Session>,
    server: &mut S,
) -> RunResult {
    if !core.enabled {
        return RunResult::skipped(core, Operation::LoadSymbols, SkipReason::Disabled);
    }
    info!(core = %core.id, image = %core.image_path.display(), "loading symbols");
    let attempt = connected(core, slot, server).and_then(|s| s.load_symbols(&core.image_path));
    RunResult::from_attempt(core, Operation::LoadSymbols, attempt)
}

fn connected<'a, S: DebugServer>(
    core: &CoreDescriptor,
    slot: &'a mut Option<S::Session>,
    server: &mut S,
) -> Result<&'a mut S::Session, TransportError> {
    let session = acquire(core, slot, server)?;
    if !session.is_connected() {
        debug!(core = %core.id, "auto-connecting before load");
        session.connect()?;
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bringup_platform::{BuildVariant, CoreClass};

    use super::*;
    use crate::result::Outcome;
    use crate::sim::{CallKind, SimulatedServer, SimulatedSession};

    fn core(enabled: bool) -> CoreDescriptor {
        CoreDescriptor {
            id: "IPU1_0".into(),
            class: CoreClass::RealTime,
            session_selector: ".*Cortex_M4_IPU1_C0".into(),
            enabled,
            variant: BuildVariant::debug(),
            image_path: PathBuf::from("/fw/ipu1_0.xem4"),
        }
    }

    #[test]
    fn disabled_core_guarded_ops_make_no_calls() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        let c = core(false);
        for op in [
            Operation::Connect,
            Operation::Restart,
            Operation::Run,
            Operation::LoadImage,
            Operation::LoadSymbols,
        ] {
            let r = apply(op, &c, &mut slot, &mut server);
            assert_eq!(
                r.outcome,
                Outcome::Skipped {
                    reason: SkipReason::Disabled
                }
            );
        }
        assert!(server.calls().is_empty());
        assert!(slot.is_none());
    }

    #[test]
    fn reset_and_halt_skip_when_not_connected() {
        let mut server = SimulatedServer::new();
        let c = core(true);

        let mut empty: Option<SimulatedSession> = None;
        assert!(reset(&c, &mut empty).is_skipped());
        assert!(halt(&c, &mut empty).is_skipped());

        // Session held but never connected.
        let mut slot = Some(server.open_session(&c.session_selector).unwrap());
        let before = server.calls().len();
        assert!(reset(&c, &mut slot).is_skipped());
        assert!(halt(&c, &mut slot).is_skipped());
        assert_eq!(server.calls().len(), before);
    }

    #[test]
    fn connect_twice_keeps_one_session() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        let c = core(true);
        assert!(connect(&c, &mut slot, &mut server).succeeded());
        assert!(connect(&c, &mut slot, &mut server).succeeded());
        assert_eq!(server.count(CallKind::OpenSession), 1);
        assert_eq!(server.physical_connections(&c.session_selector), 1);
    }

    #[test]
    fn load_auto_connects() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        let c = core(true);
        assert!(load_image(&c, &mut slot, &mut server).succeeded());
        let kinds: Vec<_> = server.calls().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [CallKind::OpenSession, CallKind::Connect, CallKind::LoadImage]
        );
        assert_eq!(
            server.calls()[2].argument.as_deref(),
            Some("/fw/ipu1_0.xem4")
        );
    }

    #[test]
    fn load_symbols_does_not_reconnect_live_session() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        let c = core(true);
        connect(&c, &mut slot, &mut server);
        assert!(load_symbols(&c, &mut slot, &mut server).succeeded());
        assert_eq!(server.count(CallKind::Connect), 1);
        assert_eq!(server.count(CallKind::LoadSymbols), 1);
    }

    #[test]
    fn connect_failure_is_contained() {
        let mut server = SimulatedServer::new();
        let c = core(true);
        server.fail(&c.session_selector, CallKind::Connect, "emulator not responding");
        let mut slot = None;
        let r = connect(&c, &mut slot, &mut server);
        assert_eq!(r.error_detail(), Some("emulator not responding"));
        // The session stays held for a later retry.
        assert!(slot.is_some());
    }

    #[test]
    fn open_session_failure_is_contained() {
        let mut server = SimulatedServer::new();
        let c = core(true);
        server.fail(&c.session_selector, CallKind::OpenSession, "no such core");
        let mut slot = None;
        assert!(!run(&c, &mut slot, &mut server).succeeded());
        assert!(slot.is_none());
    }

    #[test]
    fn disconnect_ignores_enabled_flag() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        connect(&core(true), &mut slot, &mut server);
        let r = disconnect(&core(false), &mut slot);
        assert!(r.succeeded() && !r.is_skipped());
        assert!(!slot.as_ref().unwrap().is_connected());

        let mut none: Option<SimulatedSession> = None;
        assert!(disconnect(&core(true), &mut none).is_skipped());
    }

    #[test]
    fn run_does_not_auto_connect() {
        let mut server = SimulatedServer::new();
        let mut slot = None;
        let c = core(true);
        let r = run(&c, &mut slot, &mut server);
        assert_eq!(r.error_detail(), Some("target not connected"));
        assert_eq!(server.count(CallKind::Connect), 0);

        connect(&c, &mut slot, &mut server);
        assert!(restart(&c, &mut slot, &mut server).succeeded());
        assert!(run(&c, &mut slot, &mut server).succeeded());
        assert_eq!(server.count(CallKind::RunAsync), 2);
    }
}
