//! Core descriptors.
//!
//! `CoreConfig` is the row a profile declares for one core; `CoreDescriptor`
//! is what the orchestrator works with once the profile's base directory and
//! build variant have been applied.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::variant::{BuildMode, BuildVariant};

/// Processor class of a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoreClass {
    /// General-purpose application processor.
    Application,
    /// Real-time microcontroller core.
    RealTime,
    Dsp,
    /// Vision/compute accelerator.
    Accelerator,
}

impl fmt::Display for CoreClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoreClass::Application => "application",
            CoreClass::RealTime => "real-time",
            CoreClass::Dsp => "dsp",
            CoreClass::Accelerator => "accelerator",
        };
        f.write_str(s)
    }
}

/// Firmware file names of one core, one per build variant.
///
/// Only some cores ship a testsuite build; the testsuite forms fall back to
/// the normal image of the same mode when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageSet {
    pub debug: String,
    pub release: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_testsuite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_testsuite: Option<String>,
}

impl ImageSet {
    /// Image set with debug and release forms only.
    pub fn new(debug: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            debug: debug.into(),
            release: release.into(),
            debug_testsuite: None,
            release_testsuite: None,
        }
    }

    /// Add testsuite forms.
    pub fn with_testsuite(
        mut self,
        debug: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        self.debug_testsuite = Some(debug.into());
        self.release_testsuite = Some(release.into());
        self
    }

    /// File name selected by `variant`.
    pub fn file_name(&self, variant: BuildVariant) -> &str {
        match (variant.mode, variant.testsuite) {
            (BuildMode::Debug, true) => self.debug_testsuite.as_deref().unwrap_or(&self.debug),
            (BuildMode::Release, true) => {
                self.release_testsuite.as_deref().unwrap_or(&self.release)
            }
            (BuildMode::Debug, false) => &self.debug,
            (BuildMode::Release, false) => &self.release,
        }
    }

    /// Every file name in the set, for validation.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        [Some(&self.debug), Some(&self.release)]
            .into_iter()
            .chain([self.debug_testsuite.as_ref(), self.release_testsuite.as_ref()])
            .flatten()
            .map(String::as_str)
    }
}

/// Whether `file` is usable as an image name: a single relative path component.
pub(crate) fn is_valid_image_file_name(file: &str) -> bool {
    let path = Path::new(file);
    !file.trim().is_empty()
        && !path.is_absolute()
        && path.components().count() == 1
        && path.file_name().is_some()
}

/// Profile entry for one core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoreConfig {
    /// Stable symbolic name (e.g., "A15_0", "IPU1_0", "EVE_2").
    pub id: String,
    pub class: CoreClass,
    /// Pattern the debug service uses to locate this core's session.
    pub selector: String,
    /// Whether broadcast operations act on this core.
    #[serde(default)]
    pub enabled: bool,
    /// Firmware file names per build variant.
    pub images: ImageSet,
}

impl CoreConfig {
    /// Construct a core entry.
    pub fn new(
        id: impl Into<String>,
        class: CoreClass,
        selector: impl Into<String>,
        enabled: bool,
        images: ImageSet,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            selector: selector.into(),
            enabled,
            images,
        }
    }

    /// Resolve this entry against a base directory and variant.
    pub fn describe(&self, base_dir: &Path, variant: BuildVariant) -> CoreDescriptor {
        CoreDescriptor {
            id: self.id.clone(),
            class: self.class,
            session_selector: self.selector.clone(),
            enabled: self.enabled,
            variant,
            image_path: base_dir.join(self.images.file_name(variant)),
        }
    }
}

/// Static identity of one core as seen by the orchestrator.
///
/// `image_path` is resolved at construction and only read by a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreDescriptor {
    pub id: String,
    pub class: CoreClass,
    pub session_selector: String,
    pub enabled: bool,
    pub variant: BuildVariant,
    pub image_path: PathBuf,
}
