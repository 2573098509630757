//! Stage and run reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use bringup_platform::{BuildVariant, CoreClass};

use crate::result::{Operation, Outcome, RunResult};

/// A sequencer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PrintConfiguration,
    HaltAll,
    ConnectAll,
    ResetAll,
    RestartAll,
    LoadAll,
    LoadSymbolsAll,
    RunAll,
    DisconnectAll,
    /// A single-core invocation of one operation.
    Core(Operation),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::PrintConfiguration => f.write_str("print-configuration"),
            Stage::HaltAll => f.write_str("halt-all"),
            Stage::ConnectAll => f.write_str("connect-all"),
            Stage::ResetAll => f.write_str("reset-all"),
            Stage::RestartAll => f.write_str("restart-all"),
            Stage::LoadAll => f.write_str("load-all"),
            Stage::LoadSymbolsAll => f.write_str("load-symbols-all"),
            Stage::RunAll => f.write_str("run-all"),
            Stage::DisconnectAll => f.write_str("disconnect-all"),
            Stage::Core(op) => write!(f, "{op}"),
        }
    }
}

/// Outcome of one initialization routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoutineResult {
    pub routine: String,
    pub outcome: Outcome,
}

impl RoutineResult {
    pub fn succeeded(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Everything one stage produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageReport {
    pub stage: Stage,
    pub results: Vec<RunResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routines: Vec<RoutineResult>,
}

impl StageReport {
    pub fn new(stage: Stage, results: Vec<RunResult>) -> Self {
        Self {
            stage,
            results,
            routines: Vec::new(),
        }
    }

    /// Number of failed core operations and routines.
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
            + self.routines.iter().filter(|r| !r.succeeded()).count()
    }
}

/// One row of the configuration summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreSummary {
    pub id: String,
    pub class: CoreClass,
    pub enabled: bool,
    pub image_path: PathBuf,
}

/// What `print-configuration` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationSummary {
    pub profile: String,
    pub variant: BuildVariant,
    pub run_after_load: bool,
    pub routines_enabled: bool,
    pub cores: Vec<CoreSummary>,
}

impl ConfigurationSummary {
    /// Ids of enabled cores, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.cores.iter().filter(|c| c.enabled).map(|c| c.id.as_str())
    }
}

impl fmt::Display for ConfigurationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Profile: {} ({})", self.profile, self.variant)?;
        writeln!(f, "Run after load: {}", if self.run_after_load { "yes" } else { "no" })?;
        writeln!(
            f,
            "Init routines: {}",
            if self.routines_enabled { "enabled" } else { "disabled" }
        )?;
        writeln!(f)?;
        writeln!(f, "Cores enabled:")?;
        let mut any = false;
        for core in self.cores.iter().filter(|c| c.enabled) {
            any = true;
            writeln!(
                f,
                "  {:<8} {:<12} {}",
                core.id,
                core.class.to_string(),
                core.image_path.display()
            )?;
        }
        if !any {
            writeln!(f, "  (none)")?;
        }
        Ok(())
    }
}

/// Result of one command: the stages it ran, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BringupReport {
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ConfigurationSummary>,
    pub stages: Vec<StageReport>,
}

impl BringupReport {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            configuration: None,
            stages: Vec::new(),
        }
    }

    /// Look up the first report of `stage`.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Every core result across all stages, in execution order.
    pub fn results(&self) -> impl Iterator<Item = &RunResult> {
        self.stages.iter().flat_map(|s| s.results.iter())
    }

    /// Results recorded for one core.
    pub fn results_for<'a>(&'a self, core_id: &'a str) -> impl Iterator<Item = &'a RunResult> {
        self.results().filter(move |r| r.core_id == core_id)
    }

    /// Failed core operations.
    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results().filter(|r| !r.succeeded())
    }

    /// Failed core operations plus failed routines.
    pub fn failure_count(&self) -> usize {
        self.stages.iter().map(StageReport::failure_count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

impl fmt::Display for BringupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bring-up Report: {} ===", self.profile)?;
        if let Some(config) = &self.configuration {
            writeln!(f)?;
            write!(f, "{config}")?;
        }

        for stage in &self.stages {
            if stage.stage == Stage::PrintConfiguration {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "--- {} ---", stage.stage)?;
            for routine in &stage.routines {
                match &routine.outcome {
                    Outcome::Succeeded => writeln!(f, "  routine {}: ok", routine.routine)?,
                    Outcome::Skipped { reason } => {
                        writeln!(f, "  routine {}: skipped ({reason})", routine.routine)?
                    }
                    Outcome::Failed { detail, .. } => {
                        writeln!(f, "  routine {}: FAILED: {detail}", routine.routine)?
                    }
                }
            }
            for result in &stage.results {
                writeln!(f, "  {result}")?;
            }
        }

        writeln!(f)?;
        let failures = self.failure_count();
        if failures == 0 {
            writeln!(f, "Result: OK")?;
        } else {
            writeln!(f, "Result: {failures} failure(s)")?;
            for failure in self.failures() {
                writeln!(
                    f,
                    "  {} {}: {}",
                    failure.core_id,
                    failure.operation,
                    failure.error_detail().unwrap_or_default()
                )?;
            }
            for stage in &self.stages {
                for routine in stage.routines.iter().filter(|r| !r.succeeded()) {
                    if let Outcome::Failed { detail, .. } = &routine.outcome {
                        writeln!(f, "  routine {}: {detail}", routine.routine)?;
                    }
                }
            }
        }
        Ok(())
    }
}
