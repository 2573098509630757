//! `bringup init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use bringup_platform::{profile_to_toml, resolve_builtin};

use crate::manifest::{BringupManifest, MANIFEST_FILE};

/// Create a new project directory `name` relative to the working directory.
pub fn run(name: &str, from: &str) -> Result<()> {
    create_project(Path::new(name), name, from)
}

/// Write `bringup.toml` and a project-local copy of the `from` profile.
pub(crate) fn create_project(project_dir: &Path, name: &str, from: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }
    let Some(mut profile) = resolve_builtin(from) else {
        bail!("unknown built-in profile '{from}'. Use 'bringup profile list' to see them.");
    };
    profile.name = name.to_string();
    profile.base_dir = "images".into();

    fs::create_dir_all(project_dir.join("profiles")).context("creating profiles/ directory")?;
    fs::create_dir_all(project_dir.join("images")).context("creating images/ directory")?;

    let profile_rel = format!("profiles/{name}.profile.toml");
    fs::write(project_dir.join(&profile_rel), profile_to_toml(&profile)?)
        .with_context(|| format!("writing {profile_rel}"))?;
    fs::write(
        project_dir.join(MANIFEST_FILE),
        BringupManifest::template(name, &profile_rel),
    )
    .with_context(|| format!("writing {MANIFEST_FILE}"))?;

    println!("Created project '{name}' from profile '{from}'");
    println!("  {name}/{MANIFEST_FILE}");
    println!("  {name}/{profile_rel}");
    println!("  {name}/images/");

    Ok(())
}
