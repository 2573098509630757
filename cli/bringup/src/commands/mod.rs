//! CLI command implementations.

pub mod actions;
pub mod config;
pub mod console;
pub mod init;
pub mod profile;
pub mod run;

use anyhow::{Context, Result};
use tracing::info;

use bringup_core::{BringupReport, BringupSequencer, SimulatedServer};
use bringup_platform::PlatformProfile;

use crate::OutputFormat;

/// Open a sequencer for `profile` over the simulated debug server.
///
/// Image loads check that each image exists on disk, so a run reports
/// exactly what a hardware session would be asked to load.
pub fn open_sequencer(profile: &PlatformProfile) -> Result<BringupSequencer<SimulatedServer>> {
    info!(profile = %profile.name, "opening dry-run debug server");
    let server = SimulatedServer::new().require_images(true);
    BringupSequencer::new(server, profile)
        .with_context(|| format!("preparing profile '{}'", profile.name))
}

/// Render reports in the requested format.
pub fn render(reports: &[BringupReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(reports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => {
            serde_json::to_string_pretty(reports).context("serializing reports")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_render_is_an_array() {
        let reports = vec![BringupReport::new("a"), BringupReport::new("b")];
        let json = render(&reports, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["profile"], "b");
    }

    #[test]
    fn human_render_has_headers() {
        let text = render(&[BringupReport::new("lab")], OutputFormat::Human).unwrap();
        assert!(text.contains("=== Bring-up Report: lab ==="));
    }
}
