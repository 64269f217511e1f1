pub mod options;
pub mod secrets;
pub mod sources;

use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use options::CommandLineOptions;
pub use sources::{ConfigSources, Source};

use crate::constants::{defaults, naming, settle};
use crate::errors::{DeployError, Result};

/// Option names as they appear on the command line, in the defaults secret and
/// in the environment
pub mod keys {
    pub const SERVICE_NAME: &str = "serviceName";
    pub const CLUSTER: &str = "cluster";
    pub const CLUSTER_ARN: &str = "clusterArn";
    pub const IMAGE: &str = "image";
    pub const COMMAND: &str = "command";
    pub const CONTAINER_PORT: &str = "containerPort";
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const ROLE_ARN: &str = "roleArn";
    pub const DOCKER_HUB_SECRET_ARN: &str = "dockerHubSecretArn";
    pub const LAUNCH_TYPE: &str = "launchType";
    pub const LOG_GROUP: &str = "logGroup";
    pub const SUBNETS: &str = "subnets";
    pub const SECURITY_GROUP: &str = "securityGroup";
    pub const VPC_ID: &str = "vpcId";
    pub const LISTENER_ARN: &str = "listenerArn";
    pub const HOSTNAME: &str = "hostname";
    pub const DOMAIN: &str = "domain";
    pub const TASK_DEFINITION: &str = "taskDefinition";
    pub const PASS_ENV: &str = "passEnv";
    pub const DESIRED_COUNT: &str = "desiredCount";
    pub const CRON: &str = "cron";
    pub const SCHEDULE_ROLE: &str = "scheduleRole";
    pub const SECRET_NAME: &str = "secretName";
    pub const REGION: &str = "AWS_DEFAULT_REGION";
    pub const SETTLE_TIMEOUT_SECONDS: &str = "settleTimeoutSeconds";

    pub const HEALTH_CHECK_ENABLED: &str = "healthCheckEnabled";
    pub const HEALTH_CHECK_INTERVAL_SECONDS: &str = "healthCheckIntervalSeconds";
    pub const HEALTH_CHECK_PATH: &str = "healthCheckPath";
    pub const HEALTH_CHECK_PROTOCOL: &str = "healthCheckProtocol";
    pub const HEALTH_CHECK_TIMEOUT_SECONDS: &str = "healthCheckTimeoutSeconds";
    pub const HEALTHY_THRESHOLD_COUNT: &str = "healthyThresholdCount";
    pub const UNHEALTHY_THRESHOLD_COUNT: &str = "unhealthyThresholdCount";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Register a task definition and create the service behind the load balancer
    Create,
    /// Roll an existing service onto a new task definition
    Update,
    /// Remove the service together with its listener rule and target group
    Delete,
    /// Update the service if it exists, otherwise create it
    Service,
    /// Run the task definition on a cron schedule
    Schedule,
}

impl Action {
    /// Keys that must resolve before the action touches any remote resource.
    /// Keys only a task definition template needs are checked while materializing.
    pub fn required_keys(&self) -> &'static [&'static str] {
        use keys::*;
        match self {
            Action::Create => &[SERVICE_NAME, CLUSTER, IMAGE, LISTENER_ARN, VPC_ID, SUBNETS, SECURITY_GROUP],
            Action::Update => &[SERVICE_NAME, CLUSTER, IMAGE],
            Action::Delete => &[SERVICE_NAME, CLUSTER, LISTENER_ARN],
            Action::Service => &[SERVICE_NAME, CLUSTER, IMAGE, LISTENER_ARN, VPC_ID, SUBNETS, SECURITY_GROUP],
            Action::Schedule => &[SERVICE_NAME, IMAGE, CRON, SCHEDULE_ROLE, CLUSTER_ARN, SUBNETS, SECURITY_GROUP],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Service => "service",
            Action::Schedule => "schedule",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub interval_seconds: i32,
    pub path: String,
    pub protocol: String,
    pub timeout_seconds: i32,
    pub healthy_threshold_count: i32,
    pub unhealthy_threshold_count: i32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::HEALTH_CHECK_ENABLED,
            interval_seconds: defaults::HEALTH_CHECK_INTERVAL_SECONDS,
            path: defaults::HEALTH_CHECK_PATH.to_string(),
            protocol: defaults::HEALTH_CHECK_PROTOCOL.to_string(),
            timeout_seconds: defaults::HEALTH_CHECK_TIMEOUT_SECONDS,
            healthy_threshold_count: defaults::HEALTHY_THRESHOLD_COUNT,
            unhealthy_threshold_count: defaults::UNHEALTHY_THRESHOLD_COUNT,
        }
    }
}

/// Resolved parameters for one invocation. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub action: Action,
    pub service_name: String,
    pub cluster: Option<String>,
    pub cluster_arn: Option<String>,
    pub image: Option<String>,
    pub command: Option<String>,
    pub container_port: u16,
    pub cpu: String,
    pub memory: String,
    pub role_arn: Option<String>,
    pub docker_hub_secret_arn: Option<String>,
    pub launch_type: String,
    pub log_group: String,
    pub region: String,
    pub subnets: Vec<String>,
    pub security_group: Option<String>,
    pub vpc_id: Option<String>,
    pub listener_arn: Option<String>,
    pub hostname: Option<String>,
    pub domain: String,
    pub task_definition_template: Option<PathBuf>,
    pub pass_env: bool,
    pub env_overrides: BTreeMap<String, String>,
    pub desired_count: i32,
    pub cron: Option<String>,
    pub schedule_role: Option<String>,
    pub health_check: HealthCheckConfig,
    pub settle_timeout: Duration,
}

impl ServiceConfig {
    /// Resolves every key for `action` from the layered sources.
    /// Fails on the first required key, in `Action::required_keys` order, that no source supplies.
    pub fn resolve(action: Action, sources: &ConfigSources) -> Result<Self> {
        for key in action.required_keys() {
            sources.required(key)?;
        }

        let health_check = HealthCheckConfig {
            enabled: sources.bool_or(keys::HEALTH_CHECK_ENABLED, defaults::HEALTH_CHECK_ENABLED),
            interval_seconds: sources
                .parse_or(keys::HEALTH_CHECK_INTERVAL_SECONDS, defaults::HEALTH_CHECK_INTERVAL_SECONDS)?,
            path: sources.str_or(keys::HEALTH_CHECK_PATH, defaults::HEALTH_CHECK_PATH),
            protocol: sources.str_or(keys::HEALTH_CHECK_PROTOCOL, defaults::HEALTH_CHECK_PROTOCOL),
            timeout_seconds: sources
                .parse_or(keys::HEALTH_CHECK_TIMEOUT_SECONDS, defaults::HEALTH_CHECK_TIMEOUT_SECONDS)?,
            healthy_threshold_count: sources
                .parse_or(keys::HEALTHY_THRESHOLD_COUNT, defaults::HEALTHY_THRESHOLD_COUNT)?,
            unhealthy_threshold_count: sources
                .parse_or(keys::UNHEALTHY_THRESHOLD_COUNT, defaults::UNHEALTHY_THRESHOLD_COUNT)?,
        };

        let settle_timeout_seconds: u64 =
            sources.parse_or(keys::SETTLE_TIMEOUT_SECONDS, settle::TIMEOUT_SECONDS)?;

        Ok(Self {
            action,
            service_name: sources.required(keys::SERVICE_NAME)?,
            cluster: sources.str(keys::CLUSTER),
            cluster_arn: sources.str(keys::CLUSTER_ARN),
            image: sources.str(keys::IMAGE),
            command: sources.str(keys::COMMAND),
            container_port: sources.parse_or(keys::CONTAINER_PORT, defaults::CONTAINER_PORT)?,
            cpu: sources.str_or(keys::CPU, defaults::CPU),
            memory: sources.str_or(keys::MEMORY, defaults::MEMORY),
            role_arn: sources.str(keys::ROLE_ARN),
            docker_hub_secret_arn: sources.str(keys::DOCKER_HUB_SECRET_ARN),
            launch_type: sources.str_or(keys::LAUNCH_TYPE, defaults::LAUNCH_TYPE),
            log_group: sources.str_or(keys::LOG_GROUP, defaults::LOG_GROUP),
            region: sources.str_or(keys::REGION, naming::DEFAULT_REGION),
            subnets: sources.str(keys::SUBNETS).map(|s| split_list(&s)).unwrap_or_default(),
            security_group: sources.str(keys::SECURITY_GROUP),
            vpc_id: sources.str(keys::VPC_ID),
            listener_arn: sources.str(keys::LISTENER_ARN),
            hostname: sources.str(keys::HOSTNAME),
            domain: sources.str_or(keys::DOMAIN, naming::DEFAULT_DOMAIN),
            task_definition_template: sources.str(keys::TASK_DEFINITION).map(PathBuf::from),
            pass_env: sources.bool_or(keys::PASS_ENV, false),
            env_overrides: sources.options.env.clone(),
            desired_count: sources.parse_or(keys::DESIRED_COUNT, defaults::DESIRED_COUNT)?,
            cron: sources.str(keys::CRON),
            schedule_role: sources.str(keys::SCHEDULE_ROLE),
            health_check,
            settle_timeout: Duration::from_secs(settle_timeout_seconds),
        })
    }

    pub fn cluster(&self) -> Result<&str> {
        required(&self.cluster, keys::CLUSTER)
    }

    pub fn cluster_arn(&self) -> Result<&str> {
        required(&self.cluster_arn, keys::CLUSTER_ARN)
    }

    pub fn security_group(&self) -> Result<&str> {
        required(&self.security_group, keys::SECURITY_GROUP)
    }

    pub fn vpc_id(&self) -> Result<&str> {
        required(&self.vpc_id, keys::VPC_ID)
    }

    pub fn listener_arn(&self) -> Result<&str> {
        required(&self.listener_arn, keys::LISTENER_ARN)
    }

    pub fn cron(&self) -> Result<&str> {
        required(&self.cron, keys::CRON)
    }

    pub fn schedule_role(&self) -> Result<&str> {
        required(&self.schedule_role, keys::SCHEDULE_ROLE)
    }

    pub fn subnets(&self) -> Result<&[String]> {
        if self.subnets.is_empty() {
            return Err(DeployError::missing(keys::SUBNETS));
        }
        Ok(&self.subnets)
    }

    /// Host header the listener rule matches: the override, or `<serviceName>.<domain>`
    pub fn rule_hostname(&self) -> String {
        match &self.hostname {
            Some(hostname) => hostname.clone(),
            None => format!("{}.{}", self.service_name, self.domain),
        }
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| DeployError::missing(key))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
