//! Bring-up sequencing.
//!
//! Composes orchestrator broadcasts into the canonical chain
//! print-configuration -> halt -> connect (+ routines) -> reset -> load ->
//! run-if-configured. Every stage is also callable on its own at any time;
//! the sequencer records the last stage reached but never refuses a stage.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bringup_platform::PlatformProfile;

use crate::debug::{DebugServer, Timeout};
use crate::error::{BringupError, Result};
use crate::orchestrator::Orchestrator;
use crate::report::{
    BringupReport, ConfigurationSummary, CoreSummary, RoutineResult, Stage, StageReport,
};
use crate::result::{FailureKind, Operation, Outcome, SkipReason};

/// Last stage the sequencer completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequencerState {
    Idle,
    Configured,
    Halted,
    Connected,
    Reset,
    Loaded,
    Running,
    Disconnected,
}

/// Knobs derived from the profile that shape a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerSettings {
    pub profile: String,
    pub run_after_load: bool,
    pub routines_enabled: bool,
    /// Evaluated in order through the anchor core after it connects.
    pub routines: Vec<String>,
    pub routine_timeout: Timeout,
    /// Evaluated through the anchor instead of `routines` when they are disabled.
    pub disabled_cleanup: Option<String>,
    pub halt_timeout: Timeout,
}

impl SequencerSettings {
    pub fn from_profile(profile: &PlatformProfile) -> Self {
        Self {
            profile: profile.name.clone(),
            run_after_load: profile.run_after_load,
            routines_enabled: profile.routines.enabled,
            routines: profile.routines.routines.clone(),
            routine_timeout: profile
                .routines
                .timeout_ms
                .map_or(Timeout::Unbounded, Timeout::from_millis),
            disabled_cleanup: profile.routines.disabled_cleanup.clone(),
            halt_timeout: Timeout::from_millis(profile.halt_timeout_ms),
        }
    }
}

/// Drives the bring-up stages over an [`Orchestrator`].
///
/// At most one sequencer should drive a given debug server at a time.
pub struct BringupSequencer<S: DebugServer> {
    orchestrator: Orchestrator<S>,
    settings: SequencerSettings,
    state: SequencerState,
}

impl<S: DebugServer> BringupSequencer<S> {
    /// Build a sequencer for `profile` over a ready-made debug server.
    pub fn new(mut server: S, profile: &PlatformProfile) -> Result<Self> {
        let cores = profile.resolve_cores()?;
        if let Some(config) = &profile.target_config {
            info!(config = %config.display(), "applying target configuration");
            server.set_config(config).map_err(BringupError::Setup)?;
        }
        Ok(Self {
            orchestrator: Orchestrator::new(server, cores),
            settings: SequencerSettings::from_profile(profile),
            state: SequencerState::Idle,
        })
    }

    /// Rebuild the registry from a new profile, keeping surviving sessions.
    pub fn rebuild(&mut self, profile: &PlatformProfile) -> Result<()> {
        let cores = profile.resolve_cores()?;
        self.orchestrator.rebuild(cores);
        self.settings = SequencerSettings::from_profile(profile);
        Ok(())
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn settings(&self) -> &SequencerSettings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<S> {
        &mut self.orchestrator
    }

    fn report(&self, stage: StageReport) -> BringupReport {
        let mut report = BringupReport::new(self.settings.profile.clone());
        report.stages.push(stage);
        report
    }

    /// Summarize which cores are enabled and what they will load.
    pub fn configuration(&self) -> ConfigurationSummary {
        ConfigurationSummary {
            profile: self.settings.profile.clone(),
            variant: self
                .orchestrator
                .anchor()
                .map(|c| c.variant)
                .unwrap_or_default(),
            run_after_load: self.settings.run_after_load,
            routines_enabled: self.settings.routines_enabled,
            cores: self
                .orchestrator
                .cores()
                .map(|c| CoreSummary {
                    id: c.id.clone(),
                    class: c.class,
                    enabled: c.enabled,
                    image_path: c.image_path.clone(),
                })
                .collect(),
        }
    }

    /// Report the enabled cores. Changes nothing on the target.
    pub fn print_configuration(&mut self) -> BringupReport {
        let summary = self.configuration();
        let enabled: Vec<&str> = summary.enabled().collect();
        info!(profile = %summary.profile, enabled = ?enabled, "configuration");
        if self.state == SequencerState::Idle {
            self.state = SequencerState::Configured;
        }
        let mut report = self.report(StageReport::new(Stage::PrintConfiguration, Vec::new()));
        report.configuration = Some(summary);
        report
    }

    /// Halt every live core, bounded by the halt timeout.
    pub fn halt_all(&mut self) -> BringupReport {
        self.bounded(self.settings.halt_timeout);
        let results = self.orchestrator.apply_to_all(Operation::Halt);
        self.bounded(Timeout::Unbounded);
        self.state = SequencerState::Halted;
        self.report(StageReport::new(Stage::HaltAll, results))
    }

    /// Connect every enabled core. Initialization routines run right after
    /// the anchor core's connect step, before any other core is attempted.
    pub fn connect_all(&mut self) -> BringupReport {
        let settings = &self.settings;
        let mut routines = Vec::new();
        let results = self
            .orchestrator
            .apply_to_all_then(Operation::Connect, |orch, index, _| {
                if index == 0 {
                    routines = run_routines(orch, settings);
                }
            });
        self.state = SequencerState::Connected;
        let mut stage = StageReport::new(Stage::ConnectAll, results);
        stage.routines = routines;
        self.report(stage)
    }

    /// Reset every core whose connection is live.
    pub fn reset_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::Reset);
        self.state = SequencerState::Reset;
        self.report(StageReport::new(Stage::ResetAll, results))
    }

    /// Restart every enabled core from its entry point.
    pub fn restart_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::Restart);
        self.state = SequencerState::Loaded;
        self.report(StageReport::new(Stage::RestartAll, results))
    }

    /// Load the program image of every enabled core.
    pub fn load_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::LoadImage);
        self.state = SequencerState::Loaded;
        self.report(StageReport::new(Stage::LoadAll, results))
    }

    /// Load debug symbols for every enabled core.
    pub fn load_symbols_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::LoadSymbols);
        self.report(StageReport::new(Stage::LoadSymbolsAll, results))
    }

    /// Start every enabled core.
    pub fn run_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::Run);
        self.state = SequencerState::Running;
        self.report(StageReport::new(Stage::RunAll, results))
    }

    /// Disconnect every core that holds a session.
    pub fn disconnect_all(&mut self) -> BringupReport {
        let results = self.orchestrator.apply_to_all(Operation::Disconnect);
        self.state = SequencerState::Disconnected;
        self.report(StageReport::new(Stage::DisconnectAll, results))
    }

    /// Connect one core by id.
    pub fn connect_one(&mut self, id: &str) -> BringupReport {
        self.single(Operation::Connect, id)
    }

    /// Load one core's image by id.
    pub fn load_one(&mut self, id: &str) -> BringupReport {
        self.single(Operation::LoadImage, id)
    }

    /// Load one core's symbols by id.
    pub fn load_symbols_one(&mut self, id: &str) -> BringupReport {
        self.single(Operation::LoadSymbols, id)
    }

    fn single(&mut self, op: Operation, id: &str) -> BringupReport {
        let result = self.orchestrator.apply_to_one(op, id);
        self.report(StageReport::new(Stage::Core(op), vec![result]))
    }

    /// Run the full chain. Every stage is attempted regardless of earlier
    /// per-core failures; the run stage is omitted unless run-after-load is set.
    pub fn do_everything(&mut self) -> BringupReport {
        let mut report = self.print_configuration();
        let stages: [fn(&mut Self) -> BringupReport; 4] = [
            Self::halt_all,
            Self::connect_all,
            Self::reset_all,
            Self::load_all,
        ];
        for stage in stages {
            report.stages.extend(stage(self).stages);
        }
        if self.settings.run_after_load {
            report.stages.extend(self.run_all().stages);
        } else {
            info!("run after load disabled; cores left halted");
        }
        info!(
            profile = %report.profile,
            failures = report.failure_count(),
            "bring-up complete"
        );
        report
    }

    /// Terminate all sessions and stop the debug server.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.orchestrator.shutdown() {
            warn!(error = %e, "debug server stop failed");
        }
        self.state = SequencerState::Disconnected;
    }

    fn bounded(&mut self, timeout: Timeout) {
        if let Err(e) = self.orchestrator.set_global_timeout(timeout) {
            warn!(%timeout, error = %e, "could not set global timeout");
        }
    }
}

/// Evaluate the configured routines through the anchor, each failure
/// contained. The timeout returns to unbounded afterwards.
///
/// With routines disabled only the cleanup routine, if any, is evaluated.
fn run_routines<S: DebugServer>(
    orch: &mut Orchestrator<S>,
    settings: &SequencerSettings,
) -> Vec<RoutineResult> {
    if !settings.routines_enabled {
        return match &settings.disabled_cleanup {
            Some(cleanup) => {
                info!(routine = %cleanup, "routines disabled; running cleanup");
                vec![evaluate_routine(orch, cleanup)]
            }
            None => Vec::new(),
        };
    }
    if settings.routines.is_empty() {
        return Vec::new();
    }

    let anchor_live = orch.anchor().is_some_and(|a| orch.is_live(&a.id));
    if !anchor_live {
        warn!("anchor core not connected; skipping initialization routines");
        return settings
            .routines
            .iter()
            .map(|r| RoutineResult {
                routine: r.clone(),
                outcome: Outcome::Skipped {
                    reason: SkipReason::NotConnected,
                },
            })
            .collect();
    }

    info!(count = settings.routines.len(), "executing initialization routines");
    if let Err(e) = orch.set_global_timeout(settings.routine_timeout) {
        warn!(error = %e, "could not bound routine timeout");
    }

    let results: Vec<RoutineResult> = settings
        .routines
        .iter()
        .map(|routine| evaluate_routine(orch, routine))
        .collect();

    if let Err(e) = orch.set_global_timeout(Timeout::Unbounded) {
        warn!(error = %e, "could not clear routine timeout");
    }
    results
}

fn evaluate_routine<S: DebugServer>(orch: &mut Orchestrator<S>, routine: &str) -> RoutineResult {
    let outcome = match orch.evaluate_on_anchor(routine) {
        Some(Ok(())) => Outcome::Succeeded,
        Some(Err(e)) => {
            warn!(routine = %routine, error = %e, "initialization routine failed");
            Outcome::Failed {
                kind: FailureKind::Transport,
                detail: e.detail,
            }
        }
        None => Outcome::Skipped {
            reason: SkipReason::NotConnected,
        },
    };
    RoutineResult {
        routine: routine.to_string(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CallKind, SimulatedServer};

    fn sequencer(
        profile: &PlatformProfile,
    ) -> (BringupSequencer<SimulatedServer>, SimulatedServer) {
        let server = SimulatedServer::new();
        let log = server.clone();
        (BringupSequencer::new(server, profile).unwrap(), log)
    }

    #[test]
    fn starts_idle_and_tracks_stages() {
        let (mut seq, _) = sequencer(&PlatformProfile::tda3xx());
        assert_eq!(seq.state(), SequencerState::Idle);
        seq.print_configuration();
        assert_eq!(seq.state(), SequencerState::Configured);
        seq.connect_all();
        assert_eq!(seq.state(), SequencerState::Connected);
        seq.halt_all();
        assert_eq!(seq.state(), SequencerState::Halted);
        seq.disconnect_all();
        assert_eq!(seq.state(), SequencerState::Disconnected);
    }

    #[test]
    fn halt_is_bounded_then_unbounded() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda3xx());
        seq.halt_all();
        let timeouts: Vec<_> = log
            .calls_of(CallKind::SetTimeout)
            .into_iter()
            .filter_map(|c| c.argument)
            .collect();
        assert_eq!(timeouts, ["5000 ms", "unbounded"]);
        assert_eq!(log.timeout(), Timeout::Unbounded);
    }

    #[test]
    fn routines_follow_anchor_connect() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda2xx());
        let report = seq.connect_all();
        let stage = report.stage(Stage::ConnectAll).unwrap();
        assert_eq!(stage.routines.len(), 4);
        assert!(stage.routines.iter().all(RoutineResult::succeeded));

        let kinds: Vec<_> = log
            .calls()
            .into_iter()
            .filter(|c| matches!(c.kind, CallKind::Connect | CallKind::EvaluateRoutine))
            .map(|c| (c.kind, c.selector.unwrap_or_default()))
            .collect();
        assert_eq!(kinds[0], (CallKind::Connect, ".*CortexA15_0".to_string()));
        assert!(kinds[1..5].iter().all(|(k, _)| *k == CallKind::EvaluateRoutine));
        assert_eq!(kinds[5], (CallKind::Connect, ".*Cortex_M4_IPU1_C0".to_string()));
        assert_eq!(log.timeout(), Timeout::Unbounded);
    }

    #[test]
    fn routine_failure_does_not_stop_the_rest() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda2xx());
        log.fail_routine("TDA2xx_MULTICORE_EnableAllCores()", "GEL error");
        let mut profile = PlatformProfile::tda2xx();
        profile.routines.routines = vec![
            "First()".into(),
            "TDA2xx_MULTICORE_EnableAllCores()".into(),
            "Third()".into(),
            "Fourth()".into(),
        ];
        seq.rebuild(&profile).unwrap();

        let report = seq.connect_all();
        let routines = &report.stage(Stage::ConnectAll).unwrap().routines;
        let ok: Vec<_> = routines.iter().map(RoutineResult::succeeded).collect();
        assert_eq!(ok, [true, false, true, true]);
        assert_eq!(log.count(CallKind::EvaluateRoutine), 4);
        assert!(seq.orchestrator().is_live("IPU1_0"));
    }

    #[test]
    fn routines_skipped_when_anchor_down() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda2xx());
        log.fail(".*CortexA15_0", CallKind::Connect, "no power");
        let report = seq.connect_all();
        let stage = report.stage(Stage::ConnectAll).unwrap();
        assert!(stage.routines.iter().all(|r| matches!(
            r.outcome,
            Outcome::Skipped {
                reason: SkipReason::NotConnected
            }
        )));
        assert_eq!(log.count(CallKind::EvaluateRoutine), 0);
        // The remaining cores are still attempted.
        assert!(seq.orchestrator().is_live("IPU1_0"));
    }

    #[test]
    fn routines_disabled_by_profile() {
        let mut profile = PlatformProfile::tda2xx().with_routines_enabled(false);
        profile.routines.disabled_cleanup = None;
        let (mut seq, log) = sequencer(&profile);
        let report = seq.connect_all();
        assert!(report.stage(Stage::ConnectAll).unwrap().routines.is_empty());
        assert_eq!(log.count(CallKind::EvaluateRoutine), 0);
        assert_eq!(log.count(CallKind::SetTimeout), 0);
    }

    #[test]
    fn cleanup_runs_on_anchor_when_routines_disabled() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda3xx());
        let report = seq.connect_all();

        let routines = &report.stage(Stage::ConnectAll).unwrap().routines;
        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].routine, "GEL_UnloadAllGels()");
        assert_eq!(routines[0].outcome, Outcome::Succeeded);

        let calls = log.calls_of(CallKind::EvaluateRoutine);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].selector.as_deref(), Some(".*Cortex_M4_IPU1_C0"));
        assert_eq!(log.count(CallKind::SetTimeout), 0);
    }

    #[test]
    fn run_stage_omitted_without_run_after_load() {
        let (mut seq, log) = sequencer(&PlatformProfile::tda3xx());
        let report = seq.do_everything();
        assert!(report.stage(Stage::RunAll).is_none());
        assert_eq!(log.count(CallKind::RunAsync), 0);
        assert_eq!(seq.state(), SequencerState::Loaded);
    }

    #[test]
    fn target_config_applied_on_construction() {
        let mut profile = PlatformProfile::tda3xx();
        profile.target_config = Some("tda3xx_xds200.ccxml".into());
        let (_, log) = sequencer(&profile);
        let calls = log.calls_of(CallKind::SetConfig);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argument.as_deref(), Some("tda3xx_xds200.ccxml"));
    }

    #[test]
    fn single_core_ops() {
        let (mut seq, _) = sequencer(&PlatformProfile::tda3xx());
        let report = seq.load_one("DSP_1");
        assert!(report.is_clean());
        assert!(seq.orchestrator().is_live("DSP_1"));
        let report = seq.connect_one("A15_0");
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.stages[0].stage, Stage::Core(Operation::Connect));
    }
}
