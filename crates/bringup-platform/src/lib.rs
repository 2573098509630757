//! Platform profiles for multi-core bring-up.
//!
//! A profile describes one heterogeneous board: the ordered set of processor
//! cores, the debug session selector for each, which of them are enabled,
//! and which firmware file each loads for a given build variant.
//!
//! - **Variant:** debug/release crossed with normal/testsuite
//! - **Core:** identity, class, selector, enablement, image set
//! - **Profile:** cores in declaration order plus sequencing knobs

pub mod cores;
pub mod error;
pub mod parse;
pub mod profile;
pub mod variant;

pub use cores::{CoreClass, CoreConfig, CoreDescriptor, ImageSet};
pub use error::{PlatformError, Result};
pub use parse::{
    discover_profiles, generate_template, load_profile_toml, parse_profile_toml,
    profile_to_toml, validate_profile, ValidationIssue,
};
pub use profile::{builtin_profiles, resolve_builtin, PlatformProfile, RoutineConfig};
pub use variant::{BuildMode, BuildVariant};
