//! Fault-isolated bring-up of heterogeneous multi-core platforms.
//!
//! Drives a host debug service through the sequence that takes a board from
//! "powered" to "every enabled core running its firmware":
//! print configuration, halt, connect (with platform-initialization routines
//! after the anchor core), reset, load, and optionally run.
//!
//! Every lifecycle operation is safe on a disabled or disconnected core, and
//! a failure on one core is recorded rather than propagated, so a broadcast
//! always visits every core in declaration order.

pub mod command;
pub mod debug;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod result;
pub mod sequencer;
pub mod sim;

pub use command::{Action, Command, CommandTable};
pub use debug::{DebugServer, DebugSession, Timeout};
pub use error::{BringupError, Result, TransportError};
pub use orchestrator::Orchestrator;
pub use report::{
    BringupReport, ConfigurationSummary, CoreSummary, RoutineResult, Stage, StageReport,
};
pub use result::{FailureKind, Operation, Outcome, RunResult, SkipReason};
pub use sequencer::{BringupSequencer, SequencerSettings, SequencerState};
pub use sim::{CallKind, CallRecord, SimulatedServer, SimulatedSession};
