//! Command-line options that follow the action keyword.
//!
//! Every recognised configuration key is a `--key value` flag and anything
//! else is rejected. `--env KEY=VALUE` may repeat and `--envFile path` loads a
//! file of `KEY=VALUE` lines; both feed the explicit environment overrides
//! rather than the option map. Env files are applied first, so `--env` wins.

use clap::{Args, Parser};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::keys;
use crate::errors::{DeployError, Result};

/// Flags accepted by every action. Values stay strings here; typing and
/// defaults are applied after the sources are layered.
#[derive(Debug, Clone, Default, Args)]
pub struct OptionArgs {
    /// Service, task family, target group and scheduled rule name
    #[arg(long = "serviceName", visible_alias = "name")]
    pub service_name: Option<String>,

    /// ECS cluster name
    #[arg(long = "cluster")]
    pub cluster: Option<String>,

    /// ECS cluster ARN, used as the scheduled rule target
    #[arg(long = "clusterArn")]
    pub cluster_arn: Option<String>,

    /// Container image reference
    #[arg(long = "image")]
    pub image: Option<String>,

    /// Shell command run by the container's `sh -c` entry point
    #[arg(long = "command", allow_hyphen_values = true)]
    pub command: Option<String>,

    #[arg(long = "containerPort")]
    pub container_port: Option<String>,

    #[arg(long = "cpu")]
    pub cpu: Option<String>,

    #[arg(long = "memory")]
    pub memory: Option<String>,

    /// Execution and task role ARN
    #[arg(long = "roleArn")]
    pub role_arn: Option<String>,

    /// Secret holding registry credentials
    #[arg(long = "dockerHubSecretArn")]
    pub docker_hub_secret_arn: Option<String>,

    #[arg(long = "launchType")]
    pub launch_type: Option<String>,

    #[arg(long = "logGroup")]
    pub log_group: Option<String>,

    /// Comma-separated subnet ids
    #[arg(long = "subnets")]
    pub subnets: Option<String>,

    #[arg(long = "securityGroup")]
    pub security_group: Option<String>,

    #[arg(long = "vpcId")]
    pub vpc_id: Option<String>,

    /// Listener that receives the host-header rule
    #[arg(long = "listenerArn")]
    pub listener_arn: Option<String>,

    /// Host header to route instead of `<serviceName>.<domain>`
    #[arg(long = "hostname")]
    pub hostname: Option<String>,

    #[arg(long = "domain")]
    pub domain: Option<String>,

    /// Path to a task definition template
    #[arg(long = "taskDefinition")]
    pub task_definition: Option<String>,

    /// `true` to copy this process's environment into the container
    #[arg(long = "passEnv")]
    pub pass_env: Option<String>,

    #[arg(long = "desiredCount")]
    pub desired_count: Option<String>,

    /// Schedule expression for the `schedule` action
    #[arg(long = "cron")]
    pub cron: Option<String>,

    /// Role the scheduler assumes to run the task
    #[arg(long = "scheduleRole")]
    pub schedule_role: Option<String>,

    /// Name of the secret holding configuration defaults
    #[arg(long = "secretName")]
    pub secret_name: Option<String>,

    /// Upper bound on waiting for a target group to be released
    #[arg(long = "settleTimeoutSeconds")]
    pub settle_timeout_seconds: Option<String>,

    #[arg(long = "healthCheckEnabled")]
    pub health_check_enabled: Option<String>,

    #[arg(long = "healthCheckIntervalSeconds")]
    pub health_check_interval_seconds: Option<String>,

    #[arg(long = "healthCheckPath")]
    pub health_check_path: Option<String>,

    #[arg(long = "healthCheckProtocol")]
    pub health_check_protocol: Option<String>,

    #[arg(long = "healthCheckTimeoutSeconds")]
    pub health_check_timeout_seconds: Option<String>,

    #[arg(long = "healthyThresholdCount")]
    pub healthy_threshold_count: Option<String>,

    #[arg(long = "unhealthyThresholdCount")]
    pub unhealthy_threshold_count: Option<String>,

    /// Container environment variable; may repeat
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// File of `KEY=VALUE` lines added to the container environment; may repeat
    #[arg(long = "envFile", value_name = "PATH")]
    pub env_files: Vec<PathBuf>,
}

impl OptionArgs {
    fn into_values(self) -> [(&'static str, Option<String>); 32] {
        [
            (keys::SERVICE_NAME, self.service_name),
            (keys::CLUSTER, self.cluster),
            (keys::CLUSTER_ARN, self.cluster_arn),
            (keys::IMAGE, self.image),
            (keys::COMMAND, self.command),
            (keys::CONTAINER_PORT, self.container_port),
            (keys::CPU, self.cpu),
            (keys::MEMORY, self.memory),
            (keys::ROLE_ARN, self.role_arn),
            (keys::DOCKER_HUB_SECRET_ARN, self.docker_hub_secret_arn),
            (keys::LAUNCH_TYPE, self.launch_type),
            (keys::LOG_GROUP, self.log_group),
            (keys::SUBNETS, self.subnets),
            (keys::SECURITY_GROUP, self.security_group),
            (keys::VPC_ID, self.vpc_id),
            (keys::LISTENER_ARN, self.listener_arn),
            (keys::HOSTNAME, self.hostname),
            (keys::DOMAIN, self.domain),
            (keys::TASK_DEFINITION, self.task_definition),
            (keys::PASS_ENV, self.pass_env),
            (keys::DESIRED_COUNT, self.desired_count),
            (keys::CRON, self.cron),
            (keys::SCHEDULE_ROLE, self.schedule_role),
            (keys::SECRET_NAME, self.secret_name),
            (keys::SETTLE_TIMEOUT_SECONDS, self.settle_timeout_seconds),
            (keys::HEALTH_CHECK_ENABLED, self.health_check_enabled),
            (keys::HEALTH_CHECK_INTERVAL_SECONDS, self.health_check_interval_seconds),
            (keys::HEALTH_CHECK_PATH, self.health_check_path),
            (keys::HEALTH_CHECK_PROTOCOL, self.health_check_protocol),
            (keys::HEALTH_CHECK_TIMEOUT_SECONDS, self.health_check_timeout_seconds),
            (keys::HEALTHY_THRESHOLD_COUNT, self.healthy_threshold_count),
            (keys::UNHEALTHY_THRESHOLD_COUNT, self.unhealthy_threshold_count),
        ]
    }
}

/// Standalone parser for the option flags, without an action keyword
#[derive(Debug, Parser)]
#[command(name = "fargate-helper")]
struct OptionsOnly {
    #[command(flatten)]
    options: OptionArgs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineOptions {
    pub values: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

impl CommandLineOptions {
    /// Parses option flags given without the program name or action
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let parsed = OptionsOnly::try_parse_from(
            std::iter::once("fargate-helper").chain(args.iter().map(|arg| arg.as_ref())),
        )
        .map_err(|e| DeployError::InvalidArgument(e.to_string().trim_end().to_string()))?;

        Self::from_args(parsed.options)
    }

    pub fn from_args(args: OptionArgs) -> Result<Self> {
        let mut options = Self::default();

        for path in &args.env_files {
            for (name, value) in read_env_file(path)? {
                options.env.insert(name, value);
            }
        }

        for pair in &args.env {
            let (name, value) = split_env_pair(pair).ok_or_else(|| {
                DeployError::InvalidArgument(format!("--env expects KEY=VALUE, found '{}'", pair))
            })?;
            options.env.insert(name.to_string(), value.to_string());
        }

        for (key, value) in args.into_values() {
            if let Some(value) = value {
                debug!("Option {} = {}", key, value);
                options.values.insert(key.to_string(), value);
            }
        }

        Ok(options)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }
}

fn split_env_pair(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Reads a newline-delimited `KEY=VALUE` file. Lines without `=` and comments are skipped.
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DeployError::InvalidArgument(format!("failed to read env file {}: {}", path.display(), e))
    })?;

    Ok(parse_env_lines(&content))
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(split_env_pair)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
