//! `bringup actions`: list the command table for the effective profile.

use anyhow::Result;

use bringup_core::CommandTable;
use bringup_platform::PlatformProfile;

/// Print every action name with its description.
pub fn run(profile: &PlatformProfile) -> Result<()> {
    let cores = profile.resolve_cores()?;
    let table = CommandTable::for_cores(&cores);
    println!("Actions for profile '{}':", profile.name);
    println!();
    for command in table.commands() {
        println!("  {command}");
    }
    println!();
    println!("Use 'bringup run <action>...' or 'bringup console'.");
    Ok(())
}
