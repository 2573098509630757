//! `bringup profile`: listing, description, validation, and scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use bringup_platform::{
    builtin_profiles, discover_profiles, generate_template, profile_to_toml, validate_profile,
};

use crate::manifest::resolve_profile;

/// List built-in profiles and any in the project's `profiles/` directory.
pub fn list(project_dir: &Path) -> Result<()> {
    println!("Built-in profiles:");
    println!();
    for (name, description) in builtin_profiles() {
        println!("  {name:<25} {description}");
    }

    let custom = discover_profiles(project_dir)?;
    if !custom.is_empty() {
        println!();
        println!("Project profiles:");
        println!();
        for (name, path) in &custom {
            let rel = path.strip_prefix(project_dir).unwrap_or(path);
            println!("  {name:<25} {}", rel.display());
        }
    }

    println!();
    println!("Use 'bringup profile describe <name>' for details.");
    Ok(())
}

/// Describe a profile: its cores, images, and routines.
pub fn describe(name: &str, project_dir: &Path, as_toml: bool) -> Result<()> {
    let profile = resolve_profile(name, project_dir)?;
    if as_toml {
        print!("{}", profile_to_toml(&profile)?);
        return Ok(());
    }

    println!("=== Profile: {} ===", profile.name);
    if let Some(description) = &profile.description {
        println!("{description}");
    }
    println!("Image directory: {}", profile.base_dir.display());
    println!("Variant:         {}", profile.variant);
    println!(
        "Run after load:  {}",
        if profile.run_after_load { "yes" } else { "no" }
    );
    println!("Halt timeout:    {} ms", profile.halt_timeout_ms);
    if let Some(config) = &profile.target_config {
        println!("Target config:   {}", config.display());
    }
    println!();

    println!("--- Cores ---");
    for (i, core) in profile.cores.iter().enumerate() {
        let marker = if i == 0 { " (anchor)" } else { "" };
        println!(
            "  {:<8} {:<12} {:<8} {}{marker}",
            core.id,
            core.class.to_string(),
            if core.enabled { "enabled" } else { "disabled" },
            core.selector,
        );
        println!("           image: {}", core.images.file_name(profile.variant));
    }
    println!();

    println!("--- Initialization routines ---");
    if !profile.routines_active() {
        println!("  (disabled)");
        if let Some(cleanup) = profile
            .routines
            .disabled_cleanup
            .as_ref()
            .filter(|_| !profile.routines.enabled)
        {
            println!("  cleanup: {cleanup}");
        }
    } else {
        if let Some(ms) = profile.routines.timeout_ms {
            println!("  timeout: {ms} ms");
        }
        for routine in &profile.routines.routines {
            println!("  {routine}");
        }
    }
    Ok(())
}

/// Validate a profile and report every issue.
pub fn validate(name: &str, project_dir: &Path) -> Result<()> {
    let profile = resolve_profile(name, project_dir)?;
    let issues = match validate_profile(&profile) {
        Ok(()) => {
            println!("Profile '{}' is valid.", profile.name);
            return Ok(());
        }
        Err(issues) => issues,
    };

    for issue in &issues {
        println!("  {}: {}", issue.severity, issue.message);
    }
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        bail!("profile '{}' has {errors} error(s)", profile.name);
    }
    println!("Profile '{}' is valid with warnings.", profile.name);
    Ok(())
}

/// Write `profiles/<name>.profile.toml` from the template.
pub fn init(name: &str, project_dir: &Path) -> Result<()> {
    let dir = project_dir.join("profiles");
    let path = dir.join(format!("{name}.profile.toml"));
    if path.exists() {
        bail!("profile file '{}' already exists", path.display());
    }
    fs::create_dir_all(&dir).context("creating profiles/ directory")?;
    fs::write(&path, generate_template(name)?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
