//! Configuration validation
//!
//! Rules:
//! - timeout / concurrency / buffer size > 0
//! - certificate path, when set, not empty
//! - database names unique, rp names unique per database
//! - default retention policy exists
//! - subscription names unique per retention policy
//!
//! Per-subscription problems (mode, destinations) are reported separately
//! by [`subscription_issues`]: at runtime they only disable that subscription.

use std::collections::HashSet;

use contracts::{
    CatalogSpec, ContractError, SubscriberConfig, SubscriptionInfo, SubscriptionMode,
    SUPPORTED_SCHEMES,
};

/// Validate SubscriberConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate_config(config: &SubscriberConfig) -> Result<(), ContractError> {
    if config.http_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "http_timeout_ms",
            "http_timeout_ms must be > 0",
        ));
    }
    if config.write_concurrency == 0 {
        return Err(ContractError::config_validation(
            "write_concurrency",
            "write_concurrency must be > 0",
        ));
    }
    if config.write_buffer_size == 0 {
        return Err(ContractError::config_validation(
            "write_buffer_size",
            "write_buffer_size must be > 0",
        ));
    }
    if let Some(path) = &config.https_certificate {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                "https_certificate",
                "certificate path cannot be empty",
            ));
        }
    }
    Ok(())
}

/// Validate catalog structure
pub fn validate_catalog(catalog: &CatalogSpec) -> Result<(), ContractError> {
    let mut databases = HashSet::new();
    for db in &catalog.databases {
        if db.name.is_empty() {
            return Err(ContractError::config_validation(
                "databases[].name",
                "database name cannot be empty",
            ));
        }
        if !databases.insert(&db.name) {
            return Err(ContractError::config_validation(
                format!("databases[name={}]", db.name),
                "duplicate database name",
            ));
        }

        let mut rps = HashSet::new();
        for rp in &db.retention_policies {
            if !rps.insert(&rp.name) {
                return Err(ContractError::config_validation(
                    format!("databases[{}].retention_policies[name={}]", db.name, rp.name),
                    "duplicate retention policy name",
                ));
            }

            let mut subs = HashSet::new();
            for sub in &rp.subscriptions {
                if !subs.insert(&sub.name) {
                    return Err(ContractError::config_validation(
                        format!(
                            "databases[{}].retention_policies[{}].subscriptions[name={}]",
                            db.name, rp.name, sub.name
                        ),
                        "duplicate subscription name",
                    ));
                }
            }
        }

        if db.retention_policy(&db.default_retention_policy).is_none() {
            return Err(ContractError::config_validation(
                format!("databases[{}].default_retention_policy", db.name),
                format!(
                    "default retention policy '{}' is not defined",
                    db.default_retention_policy
                ),
            ));
        }
    }
    Ok(())
}

/// Collect every subscription that could not be turned into a writer
///
/// Returns `(db, rp, subscription, error)` tuples.
pub fn subscription_issues(catalog: &CatalogSpec) -> Vec<(String, String, String, ContractError)> {
    let mut issues = Vec::new();
    for db in &catalog.databases {
        for rp in &db.retention_policies {
            for sub in &rp.subscriptions {
                if let Err(e) = check_subscription(sub) {
                    issues.push((db.name.clone(), rp.name.clone(), sub.name.clone(), e));
                }
            }
        }
    }
    issues
}

/// Check a single subscription's mode and destinations
pub fn check_subscription(sub: &SubscriptionInfo) -> Result<(), ContractError> {
    sub.mode.parse::<SubscriptionMode>()?;
    if sub.destinations.is_empty() {
        return Err(ContractError::config_validation(
            format!("subscriptions[{}].destinations", sub.name),
            "at least one destination is required",
        ));
    }
    for dest in &sub.destinations {
        let url = url::Url::parse(dest)
            .map_err(|e| ContractError::invalid_destination(dest, e.to_string()))?;
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(ContractError::UnknownScheme {
                destination: dest.clone(),
                scheme: url.scheme().to_string(),
            });
        }
    }
    Ok(())
}
