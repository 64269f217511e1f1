//! Recovers the target group a service is bound to.
//!
//! The platform keeps no queryable reference from a service to its target
//! group, so the link is read back from the service event log, where the
//! orchestrator reports `(service X) registered N targets in (target-group ARN)`.
//! Any change to that wording upstream breaks the lookup; it then fails
//! loudly rather than guessing.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::errors::{DeployError, Result};
use crate::remote::ServiceEvent;

static REGISTERED_TARGETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(service [^)]+\) registered \d+ targets? in \(target-group ([^)\s]+)\)")
        .expect("target registration pattern is valid")
});

pub trait LinkageResolver: Send + Sync {
    /// Returns the target group identifier for `service_name` or `LinkageNotFound`
    fn resolve_target_group(&self, service_name: &str, events: &[ServiceEvent]) -> Result<String>;
}

/// Scans events in the order the platform returns them (newest first); the first match wins
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogResolver;

impl LinkageResolver for EventLogResolver {
    fn resolve_target_group(&self, service_name: &str, events: &[ServiceEvent]) -> Result<String> {
        debug!("Scanning {} events of {} for target registration", events.len(), service_name);

        let target_group = events.iter().find_map(|event| {
            REGISTERED_TARGETS
                .captures(&event.message)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string())
        });

        match target_group {
            Some(arn) => {
                info!("Service {} is registered in target group {}", service_name, arn);
                Ok(arn)
            }
            None => Err(DeployError::LinkageNotFound {
                service: service_name.to_string(),
            }),
        }
    }
}
