//! Account-wide defaults kept in the secret store.
//!
//! The secret holds a flat JSON object. Values that are not strings are
//! stringified; arrays become comma-separated lists so that, for example,
//! `"subnets": ["subnet-a", "subnet-b"]` resolves like `--subnets subnet-a,subnet-b`.
//!
//! Example secret:
//! ```json
//! {
//!   "cluster": "fargate-cluster",
//!   "listenerArn": "arn:aws:elasticloadbalancing:...",
//!   "subnets": ["subnet-a", "subnet-b"]
//! }
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{keys, CommandLineOptions};
use crate::constants::naming;
use crate::errors::{DeployError, Result};
use crate::remote::SecretStore;

/// Name of the defaults secret: `--secretName`, then `FARGATE_HELPER_SECRET`,
/// then the built-in name. Empty values count as absent.
pub fn secret_name(options: &CommandLineOptions, environment: &BTreeMap<String, String>) -> String {
    options
        .get(keys::SECRET_NAME)
        .filter(|name| !name.is_empty())
        .or_else(|| {
            environment
                .get(naming::DEFAULTS_SECRET_ENV)
                .map(String::as_str)
                .filter(|name| !name.is_empty())
        })
        .unwrap_or(naming::DEFAULTS_SECRET_NAME)
        .to_string()
}

/// Fetches and flattens the defaults secret.
/// Returns an empty map if the secret doesn't exist.
pub async fn load_defaults(store: &dyn SecretStore, secret_name: &str) -> Result<BTreeMap<String, String>> {
    let Some(content) = store.get_secret_string(secret_name).await? else {
        warn!(
            "Defaults secret {} not found, configuration must come from arguments or environment",
            secret_name
        );
        return Ok(BTreeMap::new());
    };

    let defaults = parse_defaults(&content)?;
    info!("Loaded {} defaults from secret {}", defaults.len(), secret_name);
    Ok(defaults)
}

pub fn parse_defaults(content: &str) -> Result<BTreeMap<String, String>> {
    let value: Value = serde_json::from_str(content).map_err(|e| DeployError::InvalidValue {
        key: "defaults secret".to_string(),
        reason: e.to_string(),
    })?;

    let Value::Object(object) = value else {
        return Err(DeployError::InvalidValue {
            key: "defaults secret".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };

    Ok(object
        .into_iter()
        .filter_map(|(key, value)| flatten(value).map(|v| (key, v)))
        .collect())
}

fn flatten(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(flatten)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}
