//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::CatalogSpec;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Subscription row for JSON output
#[derive(Serialize)]
struct SubscriptionRow {
    db: String,
    rp: String,
    default_rp: bool,
    name: String,
    mode: String,
    destination_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    destinations: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(catalog = %args.catalog.display(), "Loading catalog info");

    let catalog = config_loader::ConfigLoader::load_catalog_from_path(&args.catalog)
        .with_context(|| format!("Failed to load catalog from {}", args.catalog.display()))?;

    if args.json {
        let rows = build_rows(&catalog, args.destinations);
        let json =
            serde_json::to_string_pretty(&rows).context("Failed to serialize catalog info")?;
        println!("{}", json);
    } else {
        print_catalog(&catalog, args.destinations);
    }

    Ok(())
}

fn build_rows(catalog: &CatalogSpec, with_destinations: bool) -> Vec<SubscriptionRow> {
    let mut rows = Vec::new();
    for db in &catalog.databases {
        for rp in &db.retention_policies {
            for sub in &rp.subscriptions {
                rows.push(SubscriptionRow {
                    db: db.name.clone(),
                    rp: rp.name.clone(),
                    default_rp: rp.name == db.default_retention_policy,
                    name: sub.name.clone(),
                    mode: sub.mode.clone(),
                    destination_count: sub.destinations.len(),
                    destinations: if with_destinations {
                        sub.destinations.clone()
                    } else {
                        Vec::new()
                    },
                });
            }
        }
    }
    rows
}

fn print_catalog(catalog: &CatalogSpec, with_destinations: bool) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Subscription Catalog                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    for db in &catalog.databases {
        println!("🗄  {} (default rp: {})", db.name, db.default_retention_policy);
        for (i, rp) in db.retention_policies.iter().enumerate() {
            let is_last = i == db.retention_policies.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };

            println!("   {} {} ({} subscriptions)", prefix, rp.name, rp.subscriptions.len());
            for (j, sub) in rp.subscriptions.iter().enumerate() {
                let sub_is_last = j == rp.subscriptions.len() - 1;
                let sub_prefix = if sub_is_last { "└─" } else { "├─" };
                println!(
                    "   {}  {} {} [{}] → {} destinations",
                    child_prefix,
                    sub_prefix,
                    sub.name,
                    sub.mode,
                    sub.destinations.len()
                );
                if with_destinations {
                    let dest_prefix = if sub_is_last { "   " } else { "│  " };
                    for dest in &sub.destinations {
                        println!("   {}  {}    {}", child_prefix, dest_prefix, dest);
                    }
                }
            }
        }
        println!();
    }

    println!("Total subscriptions: {}", catalog.subscription_count());
}
