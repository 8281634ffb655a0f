//! Lookup subcommand for hiera-lookup CLI
//!
//! Looks up one key in the configured environment and prints the value.

use crate::adapter::LookupAdapter;
use crate::format::OutputFormat;
use crate::lookup::Lookup;
use crate::merge::MergeStrategy;
use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

/// Arguments for the lookup subcommand
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Key to look up, e.g. `ntp::servers` or `apache.ports.0`
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Merge strategy: first, unique, hash or deep (default: from lookup_options)
    #[arg(long, value_name = "STRATEGY")]
    pub merge: Option<String>,

    /// Knockout prefix for the deep merge strategy
    #[arg(long, value_name = "PREFIX")]
    pub knockout_prefix: Option<String>,

    /// Value printed when the key is not found, as JSON
    #[arg(long, value_name = "JSON")]
    pub default: Option<String>,

    /// Scope variable, repeatable
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// YAML or JSON file of scope variables
    #[arg(long, value_name = "FILE")]
    pub facts: Option<PathBuf>,

    /// Print how the value was found
    #[arg(long)]
    pub explain: bool,

    /// Output format: json (default) or yaml
    #[arg(short, long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,
}

impl LookupArgs {
    /// The merge strategy requested on the command line, if any.
    pub fn merge_strategy(&self) -> Result<Option<MergeStrategy>> {
        let strategy = match (&self.merge, &self.knockout_prefix) {
            (None, None) => return Ok(None),
            (Some(name), None) => MergeStrategy::from_name(name)?,
            (name, Some(prefix)) => MergeStrategy::from_value(&json!({
                "strategy": name.as_deref().unwrap_or("deep"),
                "knockout_prefix": prefix,
            }))?,
        };
        Ok(Some(strategy))
    }

    /// Scope variables from `--facts`, then `--var` on top.
    pub fn scope(&self) -> Result<Map<String, Value>> {
        let mut scope = match &self.facts {
            Some(path) => read_facts(path)?,
            None => Map::new(),
        };
        for var in &self.vars {
            let (name, value) = parse_var(var)?;
            scope.insert(name, value);
        }
        Ok(scope)
    }

    fn default_value(&self) -> Result<Option<Value>> {
        self.default
            .as_deref()
            .map(|text| {
                serde_json::from_str(text).with_context(|| format!("Invalid --default value: {}", text))
            })
            .transpose()
    }
}

/// Parse `name=value`. The value is read as a YAML scalar, so `true` and
/// `42` keep their types and anything else is a string.
fn parse_var(var: &str) -> Result<(String, Value)> {
    let (name, raw) = var
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --var '{}': expected NAME=VALUE", var))?;
    let name = name.trim().trim_start_matches("::");
    if name.is_empty() {
        bail!("Invalid --var '{}': empty variable name", var);
    }
    let value = match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::String(raw.to_string()),
    };
    Ok((name.to_string(), value))
}

fn read_facts(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts file {}", path.display()))?;
    let facts: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse facts file {}", path.display()))?;
    match facts {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => bail!("Facts file {} must contain a mapping", path.display()),
    }
}

/// Run the lookup and return the text to print.
pub fn run_lookup(adapter: &LookupAdapter, args: &LookupArgs) -> Result<String> {
    let scope = args.scope()?;
    let mut call = Lookup::new(adapter, &scope).explain(args.explain);
    if let Some(merge) = args.merge_strategy()? {
        call = call.merge(merge);
    }
    if let Some(default) = args.default_value()? {
        call = call.default_value(default);
    }

    let (result, explainer) = call.run_explained(&args.key);
    let mut output = String::new();
    if let Some(explainer) = explainer {
        output.push_str(&explainer.render());
    }
    let value = match result {
        Ok(value) => value,
        Err(err) if args.explain && err.is_not_found() => return Ok(output),
        Err(err) => return Err(err.into()),
    };
    output.push_str(&args.format.render(&value)?);
    Ok(output)
}
