//! Waiting for a target group to become deletable.
//!
//! The load balancer acknowledges rule deletion before the target group is
//! released, and rejects target group deletion until it is. Instead of a fixed
//! sleep, poll the group with exponential backoff until no load balancer
//! references it or the timeout expires.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::constants::settle;
use crate::errors::{DeployError, Result};
use crate::remote::LoadBalancer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl SettlePolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            initial_delay: settle::INITIAL_DELAY,
            max_delay: settle::MAX_DELAY,
            timeout,
        }
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(settle::TIMEOUT_SECONDS))
    }
}

/// How a target group stopped blocking deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Still exists, no load balancer references it
    Detached,
    /// No longer reported at all
    Gone,
}

/// Returns once `target_group_arn` is unattached or gone; `SettleTimeout` otherwise
pub async fn wait_until_deletable(
    load_balancer: &dyn LoadBalancer,
    target_group_arn: &str,
    policy: &SettlePolicy,
) -> Result<Released> {
    let started = Instant::now();
    let mut delay = policy.initial_delay;

    loop {
        sleep(delay).await;

        match load_balancer.describe_target_group(target_group_arn).await? {
            None => {
                debug!("Target group {} no longer reported", target_group_arn);
                return Ok(Released::Gone);
            }
            Some(info) if info.is_deletable() => {
                debug!(
                    "Target group {} released after {:?}",
                    target_group_arn,
                    started.elapsed()
                );
                return Ok(Released::Detached);
            }
            Some(info) => {
                let waited = started.elapsed();
                if waited >= policy.timeout {
                    return Err(DeployError::SettleTimeout {
                        target_group: target_group_arn.to_string(),
                        waited_seconds: waited.as_secs(),
                    });
                }

                delay = (delay * 2)
                    .min(policy.max_delay)
                    .min(policy.timeout.saturating_sub(waited));
                info!(
                    "Target group {} still referenced by {} load balancer(s), checking again in {:?}",
                    target_group_arn,
                    info.load_balancer_arns.len(),
                    delay
                );
            }
        }
    }
}
