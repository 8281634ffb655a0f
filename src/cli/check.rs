//! Check subcommand for hiera-lookup CLI
//!
//! Validates the environment's and modules' hiera.yaml files.

use crate::adapter::LookupAdapter;
use crate::config::{Diagnostic, Severity};
use anyhow::Result;
use clap::Args;

/// Arguments for the check subcommand
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only check this module (default: the environment and every module)
    #[arg(long, value_name = "NAME")]
    pub module: Option<String>,
}

/// Diagnostics found, by descriptor owner.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub sections: Vec<(String, Vec<Diagnostic>)>,
}

impl CheckReport {
    pub fn has_fatal(&self) -> bool {
        self.diagnostics().any(|d| d.severity == Severity::Fatal)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.sections.iter().flat_map(|(_, diagnostics)| diagnostics)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (owner, diagnostics) in &self.sections {
            if diagnostics.is_empty() {
                out.push_str(&format!("{}: ok\n", owner));
                continue;
            }
            for diagnostic in diagnostics {
                out.push_str(&format!("{}: {}\n", owner, diagnostic));
            }
        }
        out
    }
}

pub fn run_check(adapter: &LookupAdapter, args: &CheckArgs) -> Result<CheckReport> {
    let mut report = CheckReport::default();
    match &args.module {
        Some(module) => {
            let diagnostics = adapter.module_diagnostics(module)?;
            report.sections.push((format!("module {}", module), diagnostics));
        }
        None => {
            let environment = adapter.environment();
            report.sections.push((
                format!("environment {}", environment.name()),
                adapter.environment_diagnostics(),
            ));
            for module in environment.module_names() {
                let diagnostics = adapter.module_diagnostics(&module)?;
                report.sections.push((format!("module {}", module), diagnostics));
            }
        }
    }
    Ok(report)
}
