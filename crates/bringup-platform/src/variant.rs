//! Build variant selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Compiler configuration a firmware image was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    #[default]
    Debug,
    Release,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Debug => f.write_str("debug"),
            BuildMode::Release => f.write_str("release"),
        }
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            other => Err(format!(
                "unknown build mode '{other}' (expected 'debug' or 'release')"
            )),
        }
    }
}

/// Which of the four image filename forms a core loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildVariant {
    /// Debug or release build.
    pub mode: BuildMode,
    /// Whether the testsuite build is selected.
    #[serde(default)]
    pub testsuite: bool,
}

impl BuildVariant {
    /// Construct a variant.
    pub fn new(mode: BuildMode, testsuite: bool) -> Self {
        Self { mode, testsuite }
    }

    /// Normal debug build.
    pub fn debug() -> Self {
        Self::new(BuildMode::Debug, false)
    }

    /// Normal release build.
    pub fn release() -> Self {
        Self::new(BuildMode::Release, false)
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.testsuite {
            write!(f, "{}-testsuite", self.mode)
        } else {
            write!(f, "{}", self.mode)
        }
    }
}
