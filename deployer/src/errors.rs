//! Error types for the deployer
//!
//! Every failure aborts the current action. Nothing is retried and steps that
//! already completed are not rolled back.

use thiserror::Error;

/// Main error type for deployment actions
#[derive(Debug, Error)]
pub enum DeployError {
    /// A required key is absent from every configuration source
    #[error("Value must be specified for: {key}. Pass it as an argument, store it in the defaults secret or set it as an environment variable")]
    MissingConfiguration { key: String },

    /// A key is present but its value cannot be used
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Malformed command line or env file
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The task definition template could not be loaded
    #[error("Failed to read task definition template '{path}': {reason}")]
    TemplateRead { path: String, reason: String },

    /// Substitution produced a document that is not a valid task definition
    #[error("Failed to parse task definition: {reason}")]
    TemplateParse { reason: String },

    #[error("Service already exists: {service}. Delete or update instead")]
    ServiceAlreadyExists { service: String },

    /// `deleted` is set when the platform still reports the service as INACTIVE
    #[error("{}", not_found_message(service, *deleted))]
    ServiceNotFound { service: String, deleted: bool },

    #[error("Service {service} is still draining. Cannot update")]
    ServiceDraining { service: String },

    /// No event in the service history names the target group it registered with
    #[error("Could not find target group associated with service: {service}")]
    LinkageNotFound { service: String },

    /// The target group stayed attached to a load balancer for the whole settle window
    #[error("Target group {target_group} still in use after waiting {waited_seconds}s")]
    SettleTimeout {
        target_group: String,
        waited_seconds: u64,
    },

    /// Opaque failure reported by a remote collaborator
    #[error("{operation} failed: {message}")]
    RemoteCall {
        operation: &'static str,
        message: String,
    },
}

fn not_found_message(service: &str, deleted: bool) -> String {
    if deleted {
        format!("Service {} has been deleted. Try creating it again instead", service)
    } else {
        format!("Service does not exist: {}. Create instead", service)
    }
}

impl DeployError {
    pub fn missing(key: &str) -> Self {
        DeployError::MissingConfiguration {
            key: key.to_string(),
        }
    }

    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        DeployError::RemoteCall {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
