//! bringup: bring up a heterogeneous multi-core board through a debug server.

mod commands;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bringup_platform::{BuildMode, PlatformProfile};

use manifest::ProfileOverrides;

/// Exit code when `--strict` is set and any core operation failed.
const EXIT_FAILURES: i32 = 2;

#[derive(Parser)]
#[command(name = "bringup", version, about = "Multi-core platform bring-up")]
struct Cli {
    #[command(flatten)]
    profile: ProfileArgs,

    /// Output format for reports
    #[arg(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    /// Exit with status 2 when any core operation failed
    #[arg(long, global = true)]
    strict: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Profile selection and overrides shared by every subcommand.
#[derive(Args, Debug)]
struct ProfileArgs {
    /// Built-in profile name or path to a .profile.toml
    #[arg(long, global = true)]
    profile: Option<String>,
    /// Target configuration file handed to the debug server
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the firmware images
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Build mode of the images to load (debug, release)
    #[arg(long, global = true)]
    variant: Option<BuildMode>,
    /// Load the testsuite images
    #[arg(long, global = true)]
    testsuite: bool,
    /// Enable a core by id (repeatable)
    #[arg(long, global = true)]
    enable: Vec<String>,
    /// Disable a core by id (repeatable)
    #[arg(long, global = true)]
    disable: Vec<String>,
    /// Leave cores halted after loading
    #[arg(long, global = true)]
    no_run: bool,
    /// Skip the initialization routines
    #[arg(long, global = true)]
    no_routines: bool,
}

impl ProfileArgs {
    fn overrides(&self) -> ProfileOverrides {
        ProfileOverrides {
            base_dir: self.base_dir.clone(),
            target_config: self.config.clone(),
            variant: self.variant,
            testsuite: self.testsuite.then_some(true),
            run_after_load: self.no_run.then_some(false),
            routines: self.no_routines.then_some(false),
            enable: self.enable.clone(),
            disable: self.disable.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new bring-up project
    Init {
        /// Project name
        name: String,
        /// Profile the project starts from
        #[arg(long, default_value = "tda2xx")]
        from: String,
    },
    /// Run one or more actions, then release the target
    Run {
        /// Action names (default: do-everything)
        actions: Vec<String>,
        /// Wait for Enter before terminating sessions
        #[arg(long)]
        hold: bool,
    },
    /// Interactive console: type action names, `list`, or `quit`
    Console,
    /// List available actions
    Actions,
    /// Print the effective configuration
    Config,
    /// Manage platform profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List built-in and project profiles
    List,
    /// Show a profile in detail
    Describe {
        /// Profile name or path
        name: String,
        /// Print as TOML
        #[arg(long)]
        toml: bool,
    },
    /// Validate a profile
    Validate {
        /// Profile name or path
        name: String,
    },
    /// Write a new profile into the project's profiles/ directory
    Init {
        /// Profile name
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let effective = || -> anyhow::Result<PlatformProfile> {
        manifest::load_effective_profile(
            &cwd,
            cli.profile.profile.as_deref(),
            cli.profile.overrides(),
        )
    };

    let failures = match &cli.command {
        Commands::Init { name, from } => {
            commands::init::run(name, from)?;
            0
        }
        Commands::Run { actions, hold } => {
            commands::run::run(&effective()?, actions, *hold, cli.format)?
        }
        Commands::Console => commands::console::run(&effective()?, cli.format)?,
        Commands::Actions => {
            commands::actions::run(&effective()?)?;
            0
        }
        Commands::Config => {
            commands::config::run(&effective()?, cli.format)?;
            0
        }
        Commands::Profile { action } => {
            let project_dir = match manifest::BringupManifest::find_and_load(&cwd)? {
                Some((_, dir)) => dir,
                None => cwd.clone(),
            };
            match action {
                ProfileAction::List => commands::profile::list(&project_dir)?,
                ProfileAction::Describe { name, toml } => {
                    commands::profile::describe(name, &project_dir, *toml)?
                }
                ProfileAction::Validate { name } => {
                    commands::profile::validate(name, &project_dir)?
                }
                ProfileAction::Init { name } => commands::profile::init(name, &project_dir)?,
            }
            0
        }
    };

    if cli.strict && failures > 0 {
        return Ok(EXIT_FAILURES);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bringup",
            "run",
            "connect-all",
            "load-all",
            "--profile",
            "tda3xx",
            "--variant",
            "debug",
            "--disable",
            "EVE_0",
            "--no-run",
            "--format",
            "json",
            "--strict",
        ])
        .unwrap();
        assert!(cli.strict);
        assert_eq!(cli.format, OutputFormat::Json);
        match &cli.command {
            Commands::Run { actions, hold } => {
                assert_eq!(actions, &["connect-all", "load-all"]);
                assert!(!hold);
            }
            _ => panic!("expected run"),
        }
        let overrides = cli.profile.overrides();
        assert_eq!(overrides.variant, Some(BuildMode::Debug));
        assert_eq!(overrides.disable, ["EVE_0"]);
        assert_eq!(overrides.run_after_load, Some(false));
        assert_eq!(overrides.routines, None);
        assert_eq!(overrides.testsuite, None);
    }

    #[test]
    fn rejects_unknown_variant() {
        assert!(Cli::try_parse_from(["bringup", "config", "--variant", "fast"]).is_err());
    }
}
