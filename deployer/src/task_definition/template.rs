//! Text-level placeholder substitution.
//!
//! Tokens such as `${image}` are replaced in the raw template before it is
//! parsed. Values are escaped as JSON string content, so a quote inside a value
//! stays inside its string. A token written unquoted (`${containerPort}`) is
//! inserted as-is and must itself be valid JSON at that position.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::errors::{DeployError, Result};

/// Template used when no `taskDefinition` path is configured
pub const BUILTIN_TEMPLATE: &str = include_str!("../../templates/task_definition.json");

/// Recognised placeholder names
pub mod tokens {
    use crate::config::keys;

    pub const COMMAND: &str = keys::COMMAND;
    pub const CONTAINER_PORT: &str = keys::CONTAINER_PORT;
    pub const CPU: &str = keys::CPU;
    pub const DOCKER_HUB_SECRET_ARN: &str = keys::DOCKER_HUB_SECRET_ARN;
    pub const IMAGE: &str = keys::IMAGE;
    pub const LAUNCH_TYPE: &str = keys::LAUNCH_TYPE;
    pub const LOG_GROUP: &str = keys::LOG_GROUP;
    pub const MEMORY: &str = keys::MEMORY;
    pub const REGION: &str = "region";
    pub const ROLE_ARN: &str = keys::ROLE_ARN;
    pub const SERVICE_NAME: &str = keys::SERVICE_NAME;
}

/// Values available for substitution; `None` marks a token with no value and no default
pub type TemplateValues = BTreeMap<&'static str, Option<String>>;

pub fn template_values(config: &ServiceConfig) -> TemplateValues {
    BTreeMap::from([
        (tokens::COMMAND, config.command.clone()),
        (tokens::CONTAINER_PORT, Some(config.container_port.to_string())),
        (tokens::CPU, Some(config.cpu.clone())),
        (tokens::DOCKER_HUB_SECRET_ARN, config.docker_hub_secret_arn.clone()),
        (tokens::IMAGE, config.image.clone()),
        (tokens::LAUNCH_TYPE, Some(config.launch_type.clone())),
        (tokens::LOG_GROUP, Some(config.log_group.clone())),
        (tokens::MEMORY, Some(config.memory.clone())),
        (tokens::REGION, Some(config.region.clone())),
        (tokens::ROLE_ARN, config.role_arn.clone()),
        (tokens::SERVICE_NAME, Some(config.service_name.clone())),
    ])
}

/// Loads the configured template file, or the built-in template
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            info!("Reading task definition template: {}", path.display());
            std::fs::read_to_string(path).map_err(|e| DeployError::TemplateRead {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
        None => Ok(BUILTIN_TEMPLATE.to_string()),
    }
}

/// Replaces every occurrence of each referenced token.
/// A referenced token without a value fails with `MissingConfiguration`.
pub fn substitute(template: &str, values: &TemplateValues) -> Result<String> {
    let mut output = template.to_string();

    for (token, value) in values {
        let placeholder = format!("${{{}}}", token);
        if !output.contains(&placeholder) {
            continue;
        }

        let value = value.as_deref().ok_or_else(|| DeployError::missing(token))?;
        debug!("Substituting {}", placeholder);
        output = output.replace(&placeholder, &escape_json_content(value));
    }

    Ok(output)
}

fn escape_json_content(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
