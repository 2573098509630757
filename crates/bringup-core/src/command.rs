//! Declarative command table.
//!
//! Maps command names to zero-argument actions over a sequencer. Built once
//! from the core registry; a console or batch front end only looks names up
//! and invokes them.

use std::fmt;

use bringup_platform::CoreDescriptor;

use crate::debug::DebugServer;
use crate::error::{BringupError, Result};
use crate::report::BringupReport;
use crate::sequencer::BringupSequencer;

/// What a command does when invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    DoEverything,
    PrintConfiguration,
    ConnectAll,
    DisconnectAll,
    ResetAll,
    RestartAll,
    LoadAll,
    RunAll,
    HaltAll,
    LoadSymbolsAll,
    Connect(String),
    LoadImage(String),
    LoadSymbols(String),
}

impl Action {
    /// Run the action against `sequencer`.
    pub fn invoke<S: DebugServer>(&self, sequencer: &mut BringupSequencer<S>) -> BringupReport {
        match self {
            Action::DoEverything => sequencer.do_everything(),
            Action::PrintConfiguration => sequencer.print_configuration(),
            Action::ConnectAll => sequencer.connect_all(),
            Action::DisconnectAll => sequencer.disconnect_all(),
            Action::ResetAll => sequencer.reset_all(),
            Action::RestartAll => sequencer.restart_all(),
            Action::LoadAll => sequencer.load_all(),
            Action::RunAll => sequencer.run_all(),
            Action::HaltAll => sequencer.halt_all(),
            Action::LoadSymbolsAll => sequencer.load_symbols_all(),
            Action::Connect(id) => sequencer.connect_one(id),
            Action::LoadImage(id) => sequencer.load_one(id),
            Action::LoadSymbols(id) => sequencer.load_symbols_one(id),
        }
    }
}

/// A named entry in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub action: Action,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<22} {}", self.name, self.description)
    }
}

/// Every command available for one registry, in menu order.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    /// Build the table for `cores`: the broadcast commands followed by the
    /// per-core connect, load, and load-symbols commands.
    pub fn for_cores<'a>(cores: impl IntoIterator<Item = &'a CoreDescriptor>) -> Self {
        let mut table = Self::default();
        table.push(
            "do-everything",
            "Halt, connect, reset, load, and run if configured",
            Action::DoEverything,
        );
        table.push(
            "print-configuration",
            "Show enabled cores and image paths",
            Action::PrintConfiguration,
        );
        table.push(
            "connect-all",
            "Connect enabled cores (routines after the anchor)",
            Action::ConnectAll,
        );
        table.push("disconnect-all", "Disconnect every held session", Action::DisconnectAll);
        table.push("reset-all", "Reset connected cores", Action::ResetAll);
        table.push("restart-all", "Restart enabled cores", Action::RestartAll);
        table.push("load-all", "Load images on enabled cores", Action::LoadAll);
        table.push("run-all", "Run enabled cores", Action::RunAll);
        table.push("halt-all", "Halt connected cores", Action::HaltAll);
        table.push("load-symbols-all", "Load symbols on enabled cores", Action::LoadSymbolsAll);

        let cores: Vec<&CoreDescriptor> = cores.into_iter().collect();
        for core in &cores {
            table.push(
                format!("connect/{}", core.id),
                format!("Connect {}", core.id),
                Action::Connect(core.id.clone()),
            );
        }
        for core in &cores {
            table.push(
                format!("load/{}", core.id),
                format!("Load image on {}", core.id),
                Action::LoadImage(core.id.clone()),
            );
        }
        for core in &cores {
            table.push(
                format!("load-symbols/{}", core.id),
                format!("Load symbols on {}", core.id),
                Action::LoadSymbols(core.id.clone()),
            );
        }
        table
    }

    fn push(&mut self, name: impl Into<String>, description: impl Into<String>, action: Action) {
        self.commands.push(Command {
            name: name.into(),
            description: description.into(),
            action,
        });
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Look up `name` and invoke it.
    pub fn execute<S: DebugServer>(
        &self,
        name: &str,
        sequencer: &mut BringupSequencer<S>,
    ) -> Result<BringupReport> {
        let command = self.get(name).ok_or_else(|| BringupError::UnknownCommand {
            name: name.to_string(),
        })?;
        Ok(command.action.invoke(sequencer))
    }
}

#[cfg(test)]
mod tests {
    use bringup_platform::PlatformProfile;

    use super::*;
    use crate::report::Stage;
    use crate::sim::SimulatedServer;

    #[test]
    fn table_has_broadcast_and_per_core_commands() {
        let cores = PlatformProfile::tda3xx().resolve_cores().unwrap();
        let table = CommandTable::for_cores(&cores);
        assert_eq!(table.commands().len(), 10 + 3 * 5);
        assert_eq!(table.commands()[0].name, "do-everything");
        assert_eq!(
            table.get("load-symbols/EVE_0").unwrap().action,
            Action::LoadSymbols("EVE_0".into())
        );
        assert!(table.get("connect/IPU1_1").is_some());
        assert!(table.get("load/A15_0").is_none());
    }

    #[test]
    fn execute_by_name() {
        let profile = PlatformProfile::tda3xx();
        let mut seq = BringupSequencer::new(SimulatedServer::new(), &profile).unwrap();
        let table = CommandTable::for_cores(seq.orchestrator().cores());
        let report = table.execute("connect-all", &mut seq).unwrap();
        assert_eq!(report.stages[0].stage, Stage::ConnectAll);
        assert!(matches!(
            table.execute("flash-all", &mut seq),
            Err(BringupError::UnknownCommand { .. })
        ));
    }
}
