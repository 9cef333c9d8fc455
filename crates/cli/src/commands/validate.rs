//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, SubscriberConfig};
use contracts::{Capability, CatalogSpec};
use dispatcher::Transport;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    catalog_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<CatalogSummary>,
}

#[derive(Serialize)]
struct CatalogSummary {
    databases: usize,
    retention_policies: usize,
    subscriptions: usize,
    destinations: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(
        config = %args.config.display(),
        catalog = %args.catalog.display(),
        "Validating configuration"
    );

    let result = validate(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate(args: &ValidateArgs) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let config = match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => Some(config),
        Err(e) => {
            errors.push(format!("{}: {}", args.config.display(), e));
            None
        }
    };

    let catalog = match ConfigLoader::load_catalog_from_path(&args.catalog) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            errors.push(format!("{}: {}", args.catalog.display(), e));
            None
        }
    };

    if let Some(ref config) = config {
        warnings.extend(config_warnings(config));
    }

    let summary = catalog.as_ref().map(|catalog| {
        errors.extend(catalog_errors(catalog));
        warnings.extend(catalog_warnings(catalog));
        summarize(catalog)
    });

    ValidationResult {
        valid: errors.is_empty(),
        config_path: args.config.display().to_string(),
        catalog_path: args.catalog.display().to_string(),
        errors,
        warnings,
        summary,
    }
}

/// Subscriptions that would fail to build a writer
fn catalog_errors(catalog: &CatalogSpec) -> Vec<String> {
    let mut errors: Vec<String> = config_loader::subscription_issues(catalog)
        .into_iter()
        .map(|(db, rp, sub, e)| format!("{db}.{rp}.{sub}: {e}"))
        .collect();

    for db in &catalog.databases {
        for rp in &db.retention_policies {
            for sub in &rp.subscriptions {
                let capabilities: Vec<Capability> = sub
                    .destinations
                    .iter()
                    .filter_map(|d| Transport::classify(d).ok())
                    .map(|(transport, _)| transport.capability())
                    .collect();
                if capabilities.windows(2).any(|w| w[0] != w[1]) {
                    errors.push(format!(
                        "{}.{}.{}: destinations mix line protocol and columnar transports",
                        db.name, rp.name, sub.name
                    ));
                }
            }
        }
    }
    errors
}

/// Non-fatal issues
fn config_warnings(config: &SubscriberConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.enabled {
        warnings.push("enabled = false - writes will not be forwarded".to_string());
    }
    if config.insecure_skip_verify {
        warnings.push("insecure_skip_verify = true - HTTPS certificates are not checked".to_string());
    }
    warnings
}

fn catalog_warnings(catalog: &CatalogSpec) -> Vec<String> {
    let mut warnings = Vec::new();
    if catalog.subscription_count() == 0 {
        warnings.push("No subscriptions configured - nothing will be forwarded".to_string());
    }
    for db in &catalog.databases {
        for rp in &db.retention_policies {
            for sub in &rp.subscriptions {
                if sub.mode == "ANY" && sub.destinations.len() == 1 {
                    warnings.push(format!(
                        "{}.{}.{}: ANY with a single destination behaves like ALL",
                        db.name, rp.name, sub.name
                    ));
                }
            }
        }
    }
    warnings
}

fn summarize(catalog: &CatalogSpec) -> CatalogSummary {
    let rps = || catalog.databases.iter().flat_map(|db| db.retention_policies.iter());
    CatalogSummary {
        databases: catalog.databases.len(),
        retention_policies: rps().count(),
        subscriptions: catalog.subscription_count(),
        destinations: rps()
            .flat_map(|rp| rp.subscriptions.iter())
            .map(|sub| sub.destinations.len())
            .sum(),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!(
            "✓ Configuration is valid: {} + {}",
            result.config_path, result.catalog_path
        );

        if let Some(ref summary) = result.summary {
            println!("\n  Databases: {}", summary.databases);
            println!("  Retention policies: {}", summary.retention_policies);
            println!("  Subscriptions: {}", summary.subscriptions);
            println!("  Destinations: {}", summary.destinations);
        }
    } else {
        println!(
            "✗ Configuration is invalid: {} + {}",
            result.config_path, result.catalog_path
        );
        for error in &result.errors {
            println!("  Error: {}", error);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }
}
