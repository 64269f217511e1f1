//! Remote collaborators
//!
//! The orchestrator drives three managed services and reads defaults from a
//! fourth. Each is reached through a narrow async trait so the lifecycle logic
//! can run against the AWS-backed clients in production and recording fakes in
//! tests.
//!
//! ```text
//! Orchestrator ─┬─ ContainerOrchestrator (ECS)
//!               ├─ LoadBalancer          (ELBv2)
//!               └─ EventScheduler        (CloudWatch Events)
//! Config ─────── SecretStore             (Secrets Manager)
//! ```
//!
//! Every call is awaited in sequence; none is retried.

pub mod aws;
pub mod ecs;
pub mod elb;
pub mod events;
pub mod secrets;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::config::HealthCheckConfig;
use crate::errors::Result;
use crate::task_definition::TaskSpecification;

pub use aws::AwsCollaborators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    Draining,
    Inactive,
}

impl ServiceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(ServiceStatus::Active),
            "DRAINING" => Some(ServiceStatus::Draining),
            "INACTIVE" => Some(ServiceStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Active => write!(f, "ACTIVE"),
            ServiceStatus::Draining => write!(f, "DRAINING"),
            ServiceStatus::Inactive => write!(f, "INACTIVE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub message: String,
}

/// Service as reported by the container orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    pub name: String,
    pub status: ServiceStatus,
    pub task_definition: Option<String>,
    pub desired_count: i32,
    /// Newest first, as delivered by the platform
    pub events: Vec<ServiceEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateServiceRequest {
    pub cluster: String,
    pub service_name: String,
    pub task_definition_arn: String,
    pub target_group_arn: String,
    pub container_port: u16,
    pub desired_count: i32,
    pub launch_type: String,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub subnets: Vec<String>,
    pub security_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRule {
    pub arn: String,
    /// `None` for the listener's default rule
    pub priority: Option<i32>,
    pub target_group_arns: Vec<String>,
}

impl ListenerRule {
    pub fn forwards_to(&self, target_group_arn: &str) -> bool {
        self.target_group_arns.iter().any(|arn| arn == target_group_arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRuleRequest {
    pub listener_arn: String,
    pub target_group_arn: String,
    pub priority: i32,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTargetGroupRequest {
    pub name: String,
    pub port: u16,
    pub vpc_id: String,
    pub health_check: HealthCheckConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupInfo {
    pub arn: String,
    pub load_balancer_arns: Vec<String>,
}

impl TargetGroupInfo {
    /// The load balancer refuses deletion while any listener still routes here
    pub fn is_deletable(&self) -> bool {
        self.load_balancer_arns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTarget {
    pub rule_name: String,
    pub cluster_arn: String,
    pub task_definition_arn: String,
    pub role_arn: String,
    pub launch_type: String,
    pub network: NetworkConfig,
}

#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    /// Returns the ARN of the new task definition revision
    async fn register_task_definition(&self, spec: &TaskSpecification) -> Result<String>;

    /// `None` when the platform has no record of the service
    async fn describe_service(&self, cluster: &str, service_name: &str) -> Result<Option<ServiceState>>;

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceState>;

    async fn update_service(&self, cluster: &str, service_name: &str, task_definition_arn: &str) -> Result<ServiceState>;

    async fn set_desired_count(&self, cluster: &str, service_name: &str, desired_count: i32) -> Result<()>;

    async fn delete_service(&self, cluster: &str, service_name: &str) -> Result<()>;
}

#[async_trait]
pub trait LoadBalancer: Send + Sync {
    async fn describe_rules(&self, listener_arn: &str) -> Result<Vec<ListenerRule>>;

    async fn create_rule(&self, request: &CreateRuleRequest) -> Result<ListenerRule>;

    async fn delete_rule(&self, rule_arn: &str) -> Result<()>;

    /// Returns the ARN of the new target group
    async fn create_target_group(&self, request: &CreateTargetGroupRequest) -> Result<String>;

    /// `None` when the target group no longer exists
    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroupInfo>>;

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<()>;
}

#[async_trait]
pub trait EventScheduler: Send + Sync {
    async fn put_rule(&self, rule_name: &str, schedule_expression: &str) -> Result<()>;

    async fn put_targets(&self, target: &ScheduledTarget) -> Result<()>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `None` when no secret with that name exists
    async fn get_secret_string(&self, secret_name: &str) -> Result<Option<String>>;
}
