//! CLI command definitions for hiera-lookup
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod check;
pub mod lookup;

use crate::settings::Settings;
use check::CheckArgs;
use clap::{Parser, Subcommand};
use lookup::LookupArgs;
use std::path::PathBuf;

/// Hierarchical data lookup
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment root directory (overrides settings)
    #[arg(short, long, global = true)]
    pub environment: Option<PathBuf>,

    /// Environment name (overrides settings)
    #[arg(long, global = true)]
    pub environment_name: Option<String>,

    /// Module directory relative to the environment root (overrides settings)
    #[arg(short, long, global = true)]
    pub module_path: Option<PathBuf>,

    /// Fail when an interpolated variable is undefined
    #[arg(long, global = true)]
    pub strict_variables: bool,

    /// Bound on nested lookups (overrides settings)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up a key and print its value
    Lookup(LookupArgs),

    /// Validate hiera.yaml descriptors and print diagnostics
    Check(CheckArgs),
}

impl Cli {
    /// Apply command-line overrides to loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(environment) = &self.environment {
            settings.environment = environment.clone();
        }
        if let Some(name) = &self.environment_name {
            settings.environment_name = name.clone();
        }
        if let Some(module_path) = &self.module_path {
            settings.module_path = module_path.clone();
        }
        if self.strict_variables {
            settings.strict_variables = true;
        }
        if let Some(max_depth) = self.max_depth {
            settings.max_depth = max_depth;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup_command() {
        let cli = Cli::try_parse_from([
            "hiera-lookup",
            "lookup",
            "ntp::servers",
            "--merge",
            "unique",
            "--var",
            "osfamily=Debian",
            "-e",
            "/srv/production",
        ])
        .unwrap();

        assert_eq!(cli.log, "2");
        assert_eq!(cli.environment, Some(PathBuf::from("/srv/production")));
        match cli.command {
            Command::Lookup(args) => {
                assert_eq!(args.key, "ntp::servers");
                assert_eq!(args.merge.as_deref(), Some("unique"));
                assert_eq!(args.vars, vec!["osfamily=Debian"]);
            }
            Command::Check(_) => panic!("expected lookup"),
        }
    }

    #[test]
    fn test_overrides_apply_to_settings() {
        let cli = Cli::try_parse_from([
            "hiera-lookup",
            "--strict-variables",
            "--max-depth",
            "8",
            "check",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_to(&mut settings);
        assert!(settings.strict_variables);
        assert_eq!(settings.max_depth, 8);
        assert_eq!(settings.environment_name, "production");
    }
}
