//! TOML parsing, serialization, validation, and discovery for profiles.
//!
//! Custom profiles are stored as `.profile.toml` files in the `profiles/`
//! directory of a bring-up project.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cores::is_valid_image_file_name;
use crate::error::{PlatformError, Result};
use crate::profile::PlatformProfile;

/// A validation issue found in a profile.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: "error",
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: "warning",
            message: message.into(),
        }
    }

    /// Whether this issue blocks use of the profile.
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }
}

/// Load a profile from a `.profile.toml` file.
pub fn load_profile_toml(path: &Path) -> Result<PlatformProfile> {
    if !path.exists() {
        return Err(PlatformError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_profile_toml(&content)
}

/// Parse a profile from a TOML string.
pub fn parse_profile_toml(toml_str: &str) -> Result<PlatformProfile> {
    let profile: PlatformProfile = toml::from_str(toml_str)?;
    Ok(profile)
}

/// Serialize a profile to pretty TOML.
pub fn profile_to_toml(profile: &PlatformProfile) -> Result<String> {
    let toml_str = toml::to_string_pretty(profile)?;
    Ok(toml_str)
}

/// Validate a profile for structural correctness.
///
/// Returns `Ok(())` if there are no issues, or `Err(issues)`. Warnings are
/// reported alongside errors; callers decide whether warnings block.
pub fn validate_profile(
    profile: &PlatformProfile,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if profile.cores.is_empty() {
        issues.push(ValidationIssue::error("profile declares no cores"));
    }

    let mut seen = HashSet::new();
    for core in &profile.cores {
        if core.id.trim().is_empty() {
            issues.push(ValidationIssue::error("core with empty id"));
        } else if !seen.insert(core.id.as_str()) {
            issues.push(ValidationIssue::error(format!(
                "duplicate core id '{}'",
                core.id
            )));
        }

        if core.selector.trim().is_empty() {
            issues.push(ValidationIssue::error(format!(
                "core '{}' has an empty session selector",
                core.id
            )));
        }

        for file in core.images.all() {
            if !is_valid_image_file_name(file) {
                issues.push(ValidationIssue::error(format!(
                    "core '{}' has malformed image file name '{file}'",
                    core.id
                )));
            }
        }
    }

    for (i, routine) in profile.routines.routines.iter().enumerate() {
        if routine.trim().is_empty() {
            issues.push(ValidationIssue::error(format!("routine {i} is empty")));
        }
    }

    if profile
        .routines
        .disabled_cleanup
        .as_ref()
        .is_some_and(|c| c.trim().is_empty())
    {
        issues.push(ValidationIssue::error("disabled-cleanup routine is empty"));
    }

    if !profile.cores.is_empty() && profile.enabled_cores().next().is_none() {
        issues.push(ValidationIssue::warning("no core is enabled"));
    }

    if profile.routines_active() && profile.anchor().is_some_and(|a| !a.enabled) {
        issues.push(ValidationIssue::warning(format!(
            "routines are enabled but anchor core '{}' is disabled; they will be skipped",
            profile.cores[0].id
        )));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a template `.profile.toml` for a new board.
///
/// Seeds from the tda3xx profile with the given name.
pub fn generate_template(name: &str) -> Result<String> {
    let mut profile = PlatformProfile::tda3xx();
    profile.name = name.into();
    profile.description = None;
    profile_to_toml(&profile)
}

/// Discover all `.profile.toml` files in a project's `profiles/` directory.
///
/// Returns a list of (profile_name, file_path) pairs sorted by name.
pub fn discover_profiles(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let profiles_dir = project_dir.join("profiles");
    if !profiles_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut profiles = Vec::new();
    for entry in std::fs::read_dir(&profiles_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".profile.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            profiles.push((name, path));
        }
    }
    profiles.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(profiles)
}
