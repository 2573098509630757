//! `bringup.toml` project configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use bringup_platform::{
    load_profile_toml, resolve_builtin, validate_profile, BuildMode, BuildVariant,
    PlatformProfile,
};

/// File name searched for from the working directory upward.
pub const MANIFEST_FILE: &str = "bringup.toml";

/// The top-level manifest of a bring-up project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BringupManifest {
    /// Project metadata (required).
    pub project: ProjectConfig,
    /// Adjustments applied on top of the selected profile.
    #[serde(default)]
    pub overrides: ProfileOverrides,
}

/// Project metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required).
    pub name: String,
    /// Built-in profile name, or a path to a `.profile.toml` relative to
    /// the project directory.
    #[serde(default)]
    pub profile: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Overrides layered onto a profile. Unset fields leave the profile alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileOverrides {
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub target_config: Option<PathBuf>,
    #[serde(default)]
    pub variant: Option<BuildMode>,
    #[serde(default)]
    pub testsuite: Option<bool>,
    #[serde(default)]
    pub run_after_load: Option<bool>,
    #[serde(default)]
    pub routines: Option<bool>,
    /// Core ids to enable.
    #[serde(default)]
    pub enable: Vec<String>,
    /// Core ids to disable. Applied after `enable`.
    #[serde(default)]
    pub disable: Vec<String>,
}

impl ProfileOverrides {
    /// Layer `other` on top of `self`; set fields in `other` win and core
    /// lists are concatenated.
    pub fn merged(mut self, other: ProfileOverrides) -> Self {
        self.base_dir = other.base_dir.or(self.base_dir);
        self.target_config = other.target_config.or(self.target_config);
        self.variant = other.variant.or(self.variant);
        self.testsuite = other.testsuite.or(self.testsuite);
        self.run_after_load = other.run_after_load.or(self.run_after_load);
        self.routines = other.routines.or(self.routines);
        self.enable.extend(other.enable);
        self.disable.extend(other.disable);
        self
    }

    /// Apply to `profile`. Relative paths resolve against `root`.
    /// Join relative paths to `dir`, leaving absolute ones alone.
    pub fn anchored(mut self, dir: &Path) -> Self {
        self.base_dir = self.base_dir.map(|p| dir.join(p));
        self.target_config = self.target_config.map(|p| dir.join(p));
        self
    }

    pub fn apply(&self, mut profile: PlatformProfile, root: &Path) -> Result<PlatformProfile> {
        if let Some(base_dir) = &self.base_dir {
            profile = profile.with_base_dir(root.join(base_dir));
        }
        if let Some(config) = &self.target_config {
            profile.target_config = Some(root.join(config));
        }
        if self.variant.is_some() || self.testsuite.is_some() {
            let mode = self.variant.unwrap_or(profile.variant.mode);
            let testsuite = self.testsuite.unwrap_or(profile.variant.testsuite);
            profile = profile.with_variant(BuildVariant::new(mode, testsuite));
        }
        if let Some(run) = self.run_after_load {
            profile = profile.with_run_after_load(run);
        }
        if let Some(routines) = self.routines {
            profile = profile.with_routines_enabled(routines);
        }
        for id in &self.enable {
            profile = profile.with_core_enabled(id, true)?;
        }
        for id in &self.disable {
            profile = profile.with_core_enabled(id, false)?;
        }
        Ok(profile)
    }
}

impl BringupManifest {
    /// Search upward from `start_dir` for a `bringup.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: BringupManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a manifest from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing bringup.toml")
    }

    /// Generate the default manifest for `bringup init`.
    pub fn template(name: &str, profile: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
profile = "{profile}"

[overrides]
# base-dir = "images"
# variant = "debug"
# testsuite = false
# run-after-load = true
# routines = true
# enable = []
# disable = []
"#
        )
    }
}

/// Join a profile's relative image directory and target configuration to
/// `root`.
pub fn anchor_paths(mut profile: PlatformProfile, root: &Path) -> PlatformProfile {
    if profile.base_dir.is_relative() {
        profile.base_dir = root.join(&profile.base_dir);
    }
    if let Some(config) = profile.target_config.take() {
        profile.target_config = Some(root.join(config));
    }
    profile
}

/// Resolve a profile reference: a built-in name, or a `.profile.toml` path
/// relative to `root`.
pub fn resolve_profile(reference: &str, root: &Path) -> Result<PlatformProfile> {
    if let Some(profile) = resolve_builtin(reference) {
        return Ok(profile);
    }
    let path = root.join(reference);
    if path.is_file() {
        return load_profile_toml(&path).with_context(|| format!("loading {}", path.display()));
    }
    bail!(
        "unknown profile '{reference}': not a built-in and no file at {}. \
         Use 'bringup profile list' to see available profiles.",
        path.display()
    )
}

/// Select, load, override, and validate the profile for this invocation.
///
/// The `--profile` flag wins over the manifest; flag overrides win over
/// manifest overrides.
pub fn load_effective_profile(
    cwd: &Path,
    profile_flag: Option<&str>,
    flag_overrides: ProfileOverrides,
) -> Result<PlatformProfile> {
    let found = BringupManifest::find_and_load(cwd)?;
    let (manifest, root) = match found {
        Some((manifest, dir)) => (Some(manifest), dir),
        None => (None, cwd.to_path_buf()),
    };

    let reference = match (profile_flag, manifest.as_ref()) {
        (Some(name), _) => name.to_string(),
        (None, Some(m)) => match &m.project.profile {
            Some(name) => name.clone(),
            None => bail!("{MANIFEST_FILE} does not name a profile; pass --profile"),
        },
        (None, None) => bail!("no profile selected: pass --profile or run `bringup init` first"),
    };
    // Flag paths are relative to where the user typed them; manifest
    // paths are relative to the project root.
    let profile_root = if profile_flag.is_some() { cwd } else { root.as_path() };
    let profile = anchor_paths(resolve_profile(&reference, profile_root)?, profile_root);

    let overrides = manifest
        .map(|m| m.overrides)
        .unwrap_or_default()
        .merged(flag_overrides.anchored(cwd));
    let profile = overrides.apply(profile, &root)?;

    if let Err(issues) = validate_profile(&profile) {
        let mut errors = Vec::new();
        for issue in issues {
            if issue.is_error() {
                errors.push(issue.message);
            } else {
                tracing::warn!(profile = %profile.name, "{}", issue.message);
            }
        }
        if !errors.is_empty() {
            bail!("profile '{}' is invalid:\n  {}", profile.name, errors.join("\n  "));
        }
    }
    Ok(profile)
}
