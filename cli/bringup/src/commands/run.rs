//! `bringup run`: batch execution of named actions.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use bringup_core::{BringupReport, BringupSequencer, CommandTable, DebugServer};
use bringup_platform::PlatformProfile;

use crate::commands::{open_sequencer, render};
use crate::OutputFormat;

/// Action run when none is named.
pub const DEFAULT_ACTION: &str = "do-everything";

/// Run `actions` in order against `profile`, then release the target.
///
/// Returns the number of failed core operations and routines.
pub fn run(
    profile: &PlatformProfile,
    actions: &[String],
    hold: bool,
    format: OutputFormat,
) -> Result<usize> {
    let mut sequencer = open_sequencer(profile)?;
    let table = CommandTable::for_cores(sequencer.orchestrator().cores());

    if format == OutputFormat::Human {
        let summary = sequencer.configuration();
        let enabled: Vec<&str> = summary.enabled().collect();
        println!(
            "Profile {} ({}): {}",
            summary.profile,
            summary.variant,
            if enabled.is_empty() {
                "no cores enabled".to_string()
            } else {
                enabled.join(", ")
            }
        );
        println!();
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let reports = run_batch(
        &mut sequencer,
        &table,
        actions,
        format,
        hold.then_some(&mut input),
    )?;
    Ok(reports.iter().map(BringupReport::failure_count).sum())
}

/// Execute, print, optionally wait on `hold`, and always shut the
/// sequencer down before returning, on success or error.
pub fn run_batch<S: DebugServer, R: BufRead>(
    sequencer: &mut BringupSequencer<S>,
    table: &CommandTable,
    actions: &[String],
    format: OutputFormat,
    hold: Option<&mut R>,
) -> Result<Vec<BringupReport>> {
    let outcome = execute(sequencer, table, actions).and_then(|reports| {
        println!("{}", render(&reports, format)?);
        if let Some(input) = hold {
            wait_for_enter(input).context("waiting for Enter")?;
        }
        Ok(reports)
    });
    sequencer.shutdown();
    outcome
}

/// Check every name against `table` first, then invoke them in order.
pub fn execute<S: DebugServer>(
    sequencer: &mut BringupSequencer<S>,
    table: &CommandTable,
    actions: &[String],
) -> Result<Vec<BringupReport>> {
    let names: Vec<&str> = if actions.is_empty() {
        vec![DEFAULT_ACTION]
    } else {
        actions.iter().map(String::as_str).collect()
    };

    let unknown: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| table.get(name).is_none())
        .collect();
    if !unknown.is_empty() {
        bail!(
            "unknown action(s): {}. Use 'bringup actions' to list them.",
            unknown.join(", ")
        );
    }

    names
        .into_iter()
        .map(|name| {
            table
                .execute(name, sequencer)
                .with_context(|| format!("running '{name}'"))
        })
        .collect()
}

fn wait_for_enter(input: &mut impl BufRead) -> io::Result<()> {
    print!("Press Enter to release the target...");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use bringup_core::{CallKind, SimulatedServer, Stage};

    use super::*;

    fn sequencer() -> (BringupSequencer<SimulatedServer>, SimulatedServer, CommandTable) {
        let server = SimulatedServer::new();
        let log = server.clone();
        let seq = BringupSequencer::new(server, &PlatformProfile::tda3xx()).unwrap();
        let table = CommandTable::for_cores(seq.orchestrator().cores());
        (seq, log, table)
    }

    #[test]
    fn defaults_to_do_everything() {
        let (mut seq, _, table) = sequencer();
        let reports = execute(&mut seq, &table, &[]).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].stages[0].stage, Stage::PrintConfiguration);
        assert!(reports[0].stage(Stage::LoadAll).is_some());
    }

    #[test]
    fn runs_actions_in_order() {
        let (mut seq, log, table) = sequencer();
        let actions = ["connect/DSP_0".to_string(), "load/DSP_0".to_string()];
        let reports = execute(&mut seq, &table, &actions).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(log.count(CallKind::Connect), 1);
        assert_eq!(log.count(CallKind::LoadImage), 1);
    }

    #[test]
    fn unknown_action_runs_nothing() {
        let (mut seq, log, table) = sequencer();
        let actions = ["connect-all".to_string(), "flash-all".to_string()];
        let err = execute(&mut seq, &table, &actions).unwrap_err();
        assert!(err.to_string().contains("flash-all"));
        assert!(log.calls().is_empty());
    }

    struct ClosedInput;

    impl io::Read for ClosedInput {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        }
    }

    #[test]
    fn batch_releases_target_when_hold_fails() {
        let (mut seq, log, table) = sequencer();
        let mut input = io::BufReader::new(ClosedInput);
        let actions = ["connect-all".to_string()];
        let err = run_batch(&mut seq, &table, &actions, OutputFormat::Json, Some(&mut input))
            .unwrap_err();
        assert!(format!("{err:#}").contains("stdin closed"));
        assert!(log.count(CallKind::Connect) > 0);
        assert_eq!(log.count(CallKind::Disconnect), log.count(CallKind::Connect));
        assert_eq!(log.count(CallKind::Terminate), log.count(CallKind::OpenSession));
        assert_eq!(log.count(CallKind::Stop), 1);
    }

    #[test]
    fn batch_releases_target_on_unknown_action() {
        let (mut seq, log, table) = sequencer();
        let actions = ["flash-all".to_string()];
        assert!(run_batch::<_, io::Empty>(&mut seq, &table, &actions, OutputFormat::Human, None)
            .is_err());
        assert_eq!(log.count(CallKind::Stop), 1);
    }

    #[test]
    fn hold_consumes_one_line() {
        let mut input = io::Cursor::new("\nrest\n");
        wait_for_enter(&mut input).unwrap();
        assert_eq!(input.position(), 1);
    }

    #[test]
    fn dry_run_reports_missing_images() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vision_sdk_ipu1_0_release.xem4"), b"elf").unwrap();
        let profile = PlatformProfile::tda3xx()
            .with_base_dir(dir.path())
            .with_core_enabled("DSP_0", false)
            .unwrap()
            .with_core_enabled("DSP_1", false)
            .unwrap()
            .with_core_enabled("EVE_0", false)
            .unwrap();

        let failures = run(&profile, &["load-all".to_string()], false, OutputFormat::Json).unwrap();
        // IPU1_0's image exists; IPU1_1's does not.
        assert_eq!(failures, 1);
    }
}
