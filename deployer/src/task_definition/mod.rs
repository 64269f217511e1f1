//! Task definition materialization
//!
//! Turns a template plus the resolved configuration into a concrete
//! [`TaskSpecification`]:
//!
//! 1. Load the template (configured file or built-in)
//! 2. Substitute placeholder tokens in the raw text
//! 3. Parse into the typed document
//! 4. Append the composed environment to the first container
//! 5. Write the result to the inspection artifact
//!
//! Identical inputs always produce identical output; the environment list is
//! ordered by variable name.

pub mod model;
pub mod template;

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub use model::{ContainerDefinition, EnvironmentVariable, TaskSpecification};

use crate::config::ServiceConfig;
use crate::constants::files;
use crate::errors::{DeployError, Result};

pub struct Materializer {
    artifact_path: PathBuf,
    inherited_env: BTreeMap<String, String>,
}

impl Materializer {
    pub fn new(artifact_path: impl Into<PathBuf>, inherited_env: BTreeMap<String, String>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            inherited_env,
        }
    }

    /// Materializer writing to the default artifact file and inheriting this process's environment
    pub fn from_process_env() -> Self {
        Self::new(files::TASK_DEFINITION_ARTIFACT, std::env::vars().collect())
    }

    /// Builds the task specification for `config` and writes the inspection artifact
    pub fn prepare(&self, config: &ServiceConfig) -> Result<TaskSpecification> {
        let template = template::load_template(config.task_definition_template.as_deref())?;
        let spec = self.materialize(&template, config)?;
        self.write_artifact(&spec);
        Ok(spec)
    }

    pub fn materialize(&self, template: &str, config: &ServiceConfig) -> Result<TaskSpecification> {
        let values = template::template_values(config);
        let document = template::substitute(template, &values)?;

        let mut spec: TaskSpecification =
            serde_json::from_str(&document).map_err(|e| DeployError::TemplateParse {
                reason: e.to_string(),
            })?;

        let environment = compose_environment(config.pass_env, &self.inherited_env, &config.env_overrides);

        let container = spec
            .container_definitions
            .first_mut()
            .ok_or_else(|| DeployError::TemplateParse {
                reason: "template defines no container".to_string(),
            })?;

        debug!(
            "Appending {} environment variables to container {}",
            environment.len(),
            container.name
        );
        container.environment.extend(
            environment
                .into_iter()
                .map(|(name, value)| EnvironmentVariable { name, value }),
        );

        Ok(spec)
    }

    /// Failures are logged and do not abort the action
    fn write_artifact(&self, spec: &TaskSpecification) {
        let rendered = match serde_json::to_string_pretty(spec) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("Failed to render task definition artifact: {}", e);
                return;
            }
        };

        match std::fs::write(&self.artifact_path, rendered) {
            Ok(()) => info!("Task definition written to {}", self.artifact_path.display()),
            Err(e) => warn!(
                "Failed to write task definition to {}: {}",
                self.artifact_path.display(),
                e
            ),
        }
    }
}

/// Starts empty, seeds from `inherited` when `pass_env` is set, then applies overrides.
/// Keys are case-sensitive and an override always replaces an inherited value.
pub fn compose_environment(
    pass_env: bool,
    inherited: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = if pass_env {
        inherited.clone()
    } else {
        BTreeMap::new()
    };

    for (key, value) in overrides {
        debug!("Override env: {}", key);
        env.insert(key.clone(), value.clone());
    }

    env
}
