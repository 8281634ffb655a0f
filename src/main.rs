//! hiera-lookup command line tool.

use anyhow::Result;
use clap::Parser;
use hiera_lookup::LookupAdapter;
use hiera_lookup::cli::check::run_check;
use hiera_lookup::cli::lookup::run_lookup;
use hiera_lookup::cli::{Cli, Command};
use hiera_lookup::settings::Settings;
use std::fs::OpenOptions;
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    cli.apply_to(&mut settings);
    debug!(?settings, "effective settings");

    let adapter = LookupAdapter::from_settings(&settings);

    match cli.command {
        Command::Lookup(args) => {
            let output = run_lookup(&adapter, &args)?;
            println!("{}", output);
        }
        Command::Check(args) => {
            let report = run_check(&adapter, &args)?;
            print!("{}", report.render());
            if report.has_fatal() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
