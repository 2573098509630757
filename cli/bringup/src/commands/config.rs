//! `bringup config`: show the effective configuration without touching
//! the target.

use anyhow::Result;

use bringup_platform::PlatformProfile;

use crate::commands::{open_sequencer, render};
use crate::OutputFormat;

pub fn run(profile: &PlatformProfile, format: OutputFormat) -> Result<()> {
    let mut sequencer = open_sequencer(profile)?;
    let report = sequencer.print_configuration();
    if format == OutputFormat::Human {
        if let Some(summary) = &report.configuration {
            print!("{summary}");
            return Ok(());
        }
    }
    println!("{}", render(&[report], format)?);
    Ok(())
}
