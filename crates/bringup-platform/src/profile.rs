//! Complete platform profile.
//!
//! Assembles the ordered core table with the knobs that shape a bring-up
//! run. Profiles are immutable once built; every override returns a new
//! profile so that "refresh configuration" is a rebuild of the registry.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cores::{is_valid_image_file_name, CoreClass, CoreConfig, CoreDescriptor, ImageSet};
use crate::error::{PlatformError, Result};
use crate::variant::BuildVariant;

/// Default bound on a halt broadcast, in milliseconds.
pub const DEFAULT_HALT_TIMEOUT_MS: u64 = 5_000;

/// Cleanup the built-in profiles run when their routines are disabled.
pub const UNLOAD_STARTUP_SCRIPTS: &str = "GEL_UnloadAllGels()";

/// Platform-initialization routines evaluated through the anchor core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoutineConfig {
    /// Whether routines run at all for this profile.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bound applied while the routines run. `None` leaves them unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Routine expressions, evaluated in order.
    #[serde(default)]
    pub routines: Vec<String>,
    /// Evaluated through the anchor in place of the routines when they are
    /// disabled, e.g. to unload the board's startup scripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_cleanup: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: None,
            routines: Vec::new(),
            disabled_cleanup: None,
        }
    }
}

/// A complete platform profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformProfile {
    /// Profile name (e.g., "tda2xx", "tda3xx").
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target configuration handed to the debug service before any session opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_config: Option<PathBuf>,
    /// Directory holding the firmware images.
    pub base_dir: PathBuf,
    /// Start every enabled core once images are loaded.
    #[serde(default)]
    pub run_after_load: bool,
    /// Bound applied to the halt broadcast.
    #[serde(default = "default_halt_timeout")]
    pub halt_timeout_ms: u64,
    /// Selected build variant.
    #[serde(default)]
    pub variant: BuildVariant,
    #[serde(default)]
    pub routines: RoutineConfig,
    /// Cores in declaration order. The first entry is the anchor core.
    pub cores: Vec<CoreConfig>,
}

fn default_halt_timeout() -> u64 {
    DEFAULT_HALT_TIMEOUT_MS
}

impl PlatformProfile {
    /// Look up a core entry by id.
    pub fn core(&self, id: &str) -> Option<&CoreConfig> {
        self.cores.iter().find(|c| c.id == id)
    }

    /// The anchor core: first in declaration order.
    pub fn anchor(&self) -> Option<&CoreConfig> {
        self.cores.first()
    }

    /// Enabled cores in declaration order.
    pub fn enabled_cores(&self) -> impl Iterator<Item = &CoreConfig> {
        self.cores.iter().filter(|c| c.enabled)
    }

    /// Whether routines will be evaluated on connect.
    pub fn routines_active(&self) -> bool {
        self.routines.enabled && !self.routines.routines.is_empty()
    }

    /// Build core descriptors in declaration order.
    ///
    /// Fails on duplicate ids or malformed image file names.
    pub fn resolve_cores(&self) -> Result<Vec<CoreDescriptor>> {
        let mut seen = HashSet::new();
        for core in &self.cores {
            if !seen.insert(core.id.as_str()) {
                return Err(PlatformError::DuplicateCore {
                    id: core.id.clone(),
                });
            }
            for file in core.images.all() {
                check_image_file_name(&core.id, file)?;
            }
        }
        Ok(self
            .cores
            .iter()
            .map(|c| c.describe(&self.base_dir, self.variant))
            .collect())
    }

    /// Same profile with a different build variant.
    pub fn with_variant(mut self, variant: BuildVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Same profile with a different image directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Same profile with `id` enabled or disabled.
    pub fn with_core_enabled(mut self, id: &str, enabled: bool) -> Result<Self> {
        match self.cores.iter_mut().find(|c| c.id == id) {
            Some(core) => core.enabled = enabled,
            None => return Err(PlatformError::UnknownCore { id: id.into() }),
        }
        Ok(self)
    }

    /// Same profile with the run-after-load flag set.
    pub fn with_run_after_load(mut self, run: bool) -> Self {
        self.run_after_load = run;
        self
    }

    /// Same profile with initialization routines switched on or off.
    pub fn with_routines_enabled(mut self, enabled: bool) -> Self {
        self.routines.enabled = enabled;
        self
    }

    /// TDA2xx: one A15 application core, two IPU M4 cores, two C66x DSPs,
    /// four EVE accelerators.
    pub fn tda2xx() -> Self {
        Self {
            name: "tda2xx".into(),
            description: Some("TDA2xx EVM (A15 + 2x IPU1 M4 + 2x C66x + 4x EVE)".into()),
            target_config: None,
            base_dir: PathBuf::from("binaries/vision_sdk/bin/tda2xx-evm"),
            variant: BuildVariant::debug(),
            run_after_load: true,
            halt_timeout_ms: DEFAULT_HALT_TIMEOUT_MS,
            routines: RoutineConfig {
                enabled: true,
                timeout_ms: Some(30_000),
                routines: vec![
                    "DRA7xx_MULTICORE_EnableAllCores()".into(),
                    "TDA2xx_MULTICORE_EnableAllCores()".into(),
                    "TDA2xx_MULTICORE_EnableAllCores()".into(),
                    "EVE_MMU_Config()".into(),
                ],
                disabled_cleanup: Some(UNLOAD_STARTUP_SCRIPTS.into()),
            },
            cores: vec![
                a15_core(true),
                ipu_core(0, true),
                ipu_core(1, false),
                dsp_core(0, false),
                dsp_core(1, false),
                eve_core(0, false),
                eve_core(1, false),
                eve_core(2, false),
                eve_core(3, false),
            ],
        }
    }

    /// TDA2Ex: A15, two IPU M4 cores, one C66x DSP.
    pub fn tda2ex() -> Self {
        Self {
            name: "tda2ex".into(),
            description: Some("TDA2Ex EVM (A15 + 2x IPU1 M4 + C66x)".into()),
            target_config: None,
            base_dir: PathBuf::from("binaries/vision_sdk/bin/tda2ex-evm"),
            variant: BuildVariant::release(),
            run_after_load: true,
            halt_timeout_ms: DEFAULT_HALT_TIMEOUT_MS,
            routines: RoutineConfig {
                enabled: true,
                timeout_ms: Some(30_000),
                routines: vec![
                    "DRA7xx_MULTICORE_EnableAllCores()".into(),
                    "TDA2Ex_MULTICORE_EnableAllCores()".into(),
                    "TDA2Ex_MULTICORE_EnableAllCores()".into(),
                    "EVE_MMU_Config()".into(),
                ],
                disabled_cleanup: Some(UNLOAD_STARTUP_SCRIPTS.into()),
            },
            cores: vec![
                a15_core(true),
                ipu_core(0, true),
                ipu_core(1, true),
                dsp_core(0, true),
            ],
        }
    }

    /// TDA3xx: IPU1_0 is the anchor; no application core.
    pub fn tda3xx() -> Self {
        Self {
            name: "tda3xx".into(),
            description: Some("TDA3xx EVM (2x IPU1 M4 + 2x C66x + EVE)".into()),
            target_config: None,
            base_dir: PathBuf::from("binaries/vision_sdk/bin/tda3xx-evm"),
            variant: BuildVariant::release(),
            run_after_load: false,
            halt_timeout_ms: DEFAULT_HALT_TIMEOUT_MS,
            routines: RoutineConfig {
                enabled: false,
                timeout_ms: Some(2_000),
                routines: vec![
                    "DSP1SSClkEnable_API()".into(),
                    "DSP2SSClkEnable_API()".into(),
                    "EVESSClkEnable_API()".into(),
                ],
                disabled_cleanup: Some(UNLOAD_STARTUP_SCRIPTS.into()),
            },
            cores: vec![
                ipu_core(0, true),
                ipu_core(1, true),
                dsp_core(0, true),
                dsp_core(1, true),
                eve_core(0, true),
            ],
        }
    }
}

fn check_image_file_name(core: &str, file: &str) -> Result<()> {
    if !is_valid_image_file_name(file) {
        return Err(PlatformError::Validation {
            detail: format!("core '{core}' has malformed image file name '{file}'"),
        });
    }
    Ok(())
}

// The A15 image ships as a debug build only.
fn a15_core(enabled: bool) -> CoreConfig {
    CoreConfig::new(
        "A15_0",
        CoreClass::Application,
        ".*CortexA15_0",
        enabled,
        ImageSet::new("vision_sdk_a15_0_debug.xa15fg", "vision_sdk_a15_0_debug.xa15fg"),
    )
}

fn ipu_core(index: u8, enabled: bool) -> CoreConfig {
    let mut images = ImageSet::new(
        format!("vision_sdk_ipu1_{index}_debug.xem4"),
        format!("vision_sdk_ipu1_{index}_release.xem4"),
    );
    if index == 0 {
        images = images.with_testsuite(
            "vision_sdk_ipu1_0_debug_testsuite.xem4",
            "vision_sdk_ipu1_0_release_testsuite.xem4",
        );
    }
    CoreConfig::new(
        format!("IPU1_{index}"),
        CoreClass::RealTime,
        format!(".*Cortex_M4_IPU1_C{index}"),
        enabled,
        images,
    )
}

fn dsp_core(index: u8, enabled: bool) -> CoreConfig {
    let n = index + 1;
    CoreConfig::new(
        format!("DSP_{index}"),
        CoreClass::Dsp,
        format!(".*C66xx_DSP{n}"),
        enabled,
        ImageSet::new(
            format!("vision_sdk_c66xdsp_{n}_debug.xe66"),
            format!("vision_sdk_c66xdsp_{n}_release.xe66"),
        ),
    )
}

fn eve_core(index: u8, enabled: bool) -> CoreConfig {
    let n = index + 1;
    CoreConfig::new(
        format!("EVE_{index}"),
        CoreClass::Accelerator,
        format!(".*ARP32_EVE_{n}"),
        enabled,
        ImageSet::new(
            format!("vision_sdk_arp32_{n}_debug.xearp32F"),
            format!("vision_sdk_arp32_{n}_release.xearp32F"),
        ),
    )
}

/// Resolve a built-in profile name.
pub fn resolve_builtin(name: &str) -> Option<PlatformProfile> {
    match name {
        "tda2xx" => Some(PlatformProfile::tda2xx()),
        "tda2ex" => Some(PlatformProfile::tda2ex()),
        "tda3xx" => Some(PlatformProfile::tda3xx()),
        _ => None,
    }
}

/// All built-in profile names with a one-line description.
pub fn builtin_profiles() -> Vec<(&'static str, &'static str)> {
    vec![
        ("tda2xx", "TDA2xx EVM, 9 cores, anchor A15_0"),
        ("tda2ex", "TDA2Ex EVM, 4 cores, anchor A15_0"),
        ("tda3xx", "TDA3xx EVM, 5 cores, anchor IPU1_0"),
    ]
}
