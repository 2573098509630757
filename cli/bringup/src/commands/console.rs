//! `bringup console`: interactive front end over the command table.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use bringup_core::{BringupSequencer, CommandTable, DebugServer};
use bringup_platform::PlatformProfile;

use crate::commands::{open_sequencer, render};
use crate::OutputFormat;

/// Read action names from stdin until `quit` or end of input.
///
/// Returns the number of failed core operations and routines.
pub fn run(profile: &PlatformProfile, format: OutputFormat) -> Result<usize> {
    let mut sequencer = open_sequencer(profile)?;
    let table = CommandTable::for_cores(sequencer.orchestrator().cores());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = drive(
        &mut sequencer,
        &table,
        &mut stdin.lock(),
        &mut stdout.lock(),
        format,
    );
    sequencer.shutdown();
    result
}

/// The read-eval loop, independent of the terminal.
pub fn drive<S: DebugServer>(
    sequencer: &mut BringupSequencer<S>,
    table: &CommandTable,
    input: &mut impl BufRead,
    out: &mut impl Write,
    format: OutputFormat,
) -> Result<usize> {
    writeln!(out, "Type an action name, 'list', or 'quit'.")?;
    let mut failures = 0;
    let mut line = String::new();
    loop {
        write!(out, "bringup> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "list" | "help" => {
                for command in table.commands() {
                    writeln!(out, "  {command}")?;
                }
            }
            name => match table.execute(name, sequencer) {
                Ok(report) => {
                    failures += report.failure_count();
                    writeln!(out, "{}", render(&[report], format)?)?;
                }
                Err(e) => writeln!(out, "{e}")?,
            },
        }
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use bringup_core::{CallKind, SimulatedServer};

    use super::*;

    fn drive_script(script: &str) -> (String, usize, SimulatedServer) {
        let server = SimulatedServer::new();
        let log = server.clone();
        let mut seq = BringupSequencer::new(server, &PlatformProfile::tda2ex()).unwrap();
        let table = CommandTable::for_cores(seq.orchestrator().cores());
        let mut out = Vec::new();
        let failures = drive(
            &mut seq,
            &table,
            &mut io::Cursor::new(script),
            &mut out,
            OutputFormat::Human,
        )
        .unwrap();
        (String::from_utf8(out).unwrap(), failures, log)
    }

    #[test]
    fn executes_until_quit() {
        let (out, failures, log) = drive_script("connect-all\n\nquit\nhalt-all\n");
        assert_eq!(failures, 0);
        assert!(out.contains("--- connect-all ---"));
        assert_eq!(log.count(CallKind::Connect), 4);
        assert_eq!(log.count(CallKind::Halt), 0);
    }

    #[test]
    fn list_and_unknown() {
        let (out, _, log) = drive_script("list\nreboot\n");
        assert!(out.contains("load-symbols/DSP_0"));
        assert!(out.contains("unknown command 'reboot'"));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn counts_failures() {
        let server = SimulatedServer::new();
        server.fail(".*C66xx_DSP1", CallKind::Connect, "no clock");
        let mut seq = BringupSequencer::new(server, &PlatformProfile::tda2ex()).unwrap();
        let table = CommandTable::for_cores(seq.orchestrator().cores());
        let mut out = Vec::new();
        let failures = drive(
            &mut seq,
            &table,
            &mut io::Cursor::new("connect/DSP_0\nconnect/DSP_0\n"),
            &mut out,
            OutputFormat::Human,
        )
        .unwrap();
        assert_eq!(failures, 2);
    }
}
