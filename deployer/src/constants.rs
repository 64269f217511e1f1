//! Fixed values shared by the deployer: naming conventions, file locations,
//! configuration defaults and the settle policy used while tearing services down.

use std::time::Duration;

/// Naming conventions applied to the resources a deployment creates
pub mod naming {
    /// Domain appended to the service name when no hostname override is given
    pub const DEFAULT_DOMAIN: &str = "bespoken.io";

    /// Secret holding the JSON object with per-account configuration defaults
    pub const DEFAULTS_SECRET_NAME: &str = "fargate-helper";

    /// Environment variable that points the resolver at a different defaults secret
    pub const DEFAULTS_SECRET_ENV: &str = "FARGATE_HELPER_SECRET";

    /// Region used when `AWS_DEFAULT_REGION` is unset
    pub const DEFAULT_REGION: &str = "us-east-1";
}

/// Local files written by the deployer
pub mod files {
    /// The materialized task definition, kept for operator inspection only
    pub const TASK_DEFINITION_ARTIFACT: &str = "TaskDefinition.out";
}

/// Default configuration values
pub mod defaults {
    pub const CONTAINER_PORT: u16 = 3000;
    pub const CPU: &str = "512";
    pub const MEMORY: &str = "1024";
    pub const LAUNCH_TYPE: &str = "FARGATE";
    pub const LOG_GROUP: &str = "fargate-cluster";
    pub const DESIRED_COUNT: i32 = 1;

    pub const HEALTH_CHECK_ENABLED: bool = true;
    pub const HEALTH_CHECK_INTERVAL_SECONDS: i32 = 30;
    pub const HEALTH_CHECK_PATH: &str = "/";
    pub const HEALTH_CHECK_PROTOCOL: &str = "HTTP";
    pub const HEALTH_CHECK_TIMEOUT_SECONDS: i32 = 5;
    pub const HEALTHY_THRESHOLD_COUNT: i32 = 3;
    pub const UNHEALTHY_THRESHOLD_COUNT: i32 = 3;
}

/// Timing of the wait between listener rule removal and target group deletion
pub mod settle {
    use super::Duration;

    /// Delay before the first deletability check
    pub const INITIAL_DELAY: Duration = Duration::from_secs(2);

    /// Upper bound for a single backoff step
    pub const MAX_DELAY: Duration = Duration::from_secs(15);

    /// Default total wait before giving up on the target group
    pub const TIMEOUT_SECONDS: u64 = 120;
}
