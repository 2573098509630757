//! Per-core outcome records.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use bringup_platform::CoreDescriptor;

use crate::error::TransportError;

/// The lifecycle operations that can be applied to a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Connect,
    Disconnect,
    Reset,
    Restart,
    Run,
    Halt,
    LoadImage,
    LoadSymbols,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Reset => "reset",
            Operation::Restart => "restart",
            Operation::Run => "run",
            Operation::Halt => "halt",
            Operation::LoadImage => "load-image",
            Operation::LoadSymbols => "load-symbols",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a guarded operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The core is disabled in the profile.
    Disabled,
    /// The core's session is not connected.
    NotConnected,
    /// No session has ever been opened for the core.
    NoSession,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => f.write_str("core disabled"),
            SkipReason::NotConnected => f.write_str("not connected"),
            SkipReason::NoSession => f.write_str("no session held"),
        }
    }
}

/// Which part of the error taxonomy a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Caller or profile mistake (unknown core id, bad path).
    Configuration,
    /// The debug service reported an error.
    Transport,
}

/// Result of one operation on one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Succeeded,
    /// Precondition did not hold; not an error.
    Skipped { reason: SkipReason },
    Failed { kind: FailureKind, detail: String },
}

/// Outcome record for one (core, operation) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunResult {
    pub core_id: String,
    pub operation: Operation,
    pub outcome: Outcome,
}

impl RunResult {
    pub fn succeeded_on(core: &CoreDescriptor, operation: Operation) -> Self {
        Self {
            core_id: core.id.clone(),
            operation,
            outcome: Outcome::Succeeded,
        }
    }

    pub fn skipped(core: &CoreDescriptor, operation: Operation, reason: SkipReason) -> Self {
        Self {
            core_id: core.id.clone(),
            operation,
            outcome: Outcome::Skipped { reason },
        }
    }

    /// A caller referenced a core the registry does not hold.
    pub fn core_not_found(core_id: &str, operation: Operation) -> Self {
        Self {
            core_id: core_id.to_string(),
            operation,
            outcome: Outcome::Failed {
                kind: FailureKind::Configuration,
                detail: "core not found".into(),
            },
        }
    }

    /// Convert a collaborator call result into a record, logging failures.
    pub fn from_attempt(
        core: &CoreDescriptor,
        operation: Operation,
        attempt: Result<(), TransportError>,
    ) -> Self {
        match attempt {
            Ok(()) => Self::succeeded_on(core, operation),
            Err(e) => {
                warn!(core = %core.id, %operation, error = %e, "operation failed");
                Self {
                    core_id: core.id.clone(),
                    operation,
                    outcome: Outcome::Failed {
                        kind: FailureKind::Transport,
                        detail: e.detail,
                    },
                }
            }
        }
    }

    /// True unless the operation failed. Skips count as success.
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped { .. })
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {:<13} ", self.core_id, self.operation.name())?;
        match &self.outcome {
            Outcome::Succeeded => write!(f, "ok"),
            Outcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            Outcome::Failed { detail, .. } => write!(f, "FAILED: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bringup_platform::{BuildVariant, CoreClass};

    use super::*;

    fn core() -> CoreDescriptor {
        CoreDescriptor {
            id: "DSP_0".into(),
            class: CoreClass::Dsp,
            session_selector: ".*C66xx_DSP1".into(),
            enabled: true,
            variant: BuildVariant::debug(),
            image_path: PathBuf::from("dsp.xe66"),
        }
    }

    #[test]
    fn skip_counts_as_success() {
        let r = RunResult::skipped(&core(), Operation::Reset, SkipReason::NotConnected);
        assert!(r.succeeded());
        assert!(r.is_skipped());
        assert!(r.error_detail().is_none());
    }

    #[test]
    fn transport_failure_keeps_detail() {
        let r = RunResult::from_attempt(
            &core(),
            Operation::LoadImage,
            Err(TransportError::new("file not found")),
        );
        assert!(!r.succeeded());
        assert_eq!(r.error_detail(), Some("file not found"));
        assert!(matches!(
            r.outcome,
            Outcome::Failed {
                kind: FailureKind::Transport,
                ..
            }
        ));
    }

    #[test]
    fn not_found_is_configuration_failure() {
        let r = RunResult::core_not_found("GPU_0", Operation::Connect);
        assert_eq!(r.core_id, "GPU_0");
        assert_eq!(r.error_detail(), Some("core not found"));
        assert!(matches!(
            r.outcome,
            Outcome::Failed {
                kind: FailureKind::Configuration,
                ..
            }
        ));
    }

    #[test]
    fn display_line() {
        let r = RunResult::succeeded_on(&core(), Operation::Connect);
        assert_eq!(r.to_string().trim_end(), "DSP_0    connect       ok");
    }
}
