//! Service lifecycle orchestration
//!
//! One action per invocation, every remote call awaited in sequence.
//!
//! | Action   | Observed state      | Result                                     |
//! |----------|---------------------|--------------------------------------------|
//! | create   | absent / INACTIVE   | task definition, target group, rule, service |
//! | update   | ACTIVE              | new task definition rolled onto the service |
//! | delete   | any                 | rule, target group and service removed      |
//! | service  | any                 | update if the service is live, else create  |
//! | schedule | n/a                 | task definition run by a cron rule          |
//!
//! Errors abort the action immediately. Completed steps are not rolled back,
//! so a failed `create` can leave a target group or rule behind.
//!
//! Rule priorities are claimed as `max + 1` without any lock: two concurrent
//! `create` runs against the same listener can race for the same priority.

pub mod settle;

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub use settle::{wait_until_deletable, Released, SettlePolicy};

use crate::config::{Action, ServiceConfig};
use crate::errors::{DeployError, Result};
use crate::linkage::{EventLogResolver, LinkageResolver};
use crate::remote::{
    ContainerOrchestrator, CreateRuleRequest, CreateServiceRequest, CreateTargetGroupRequest, EventScheduler,
    ListenerRule, LoadBalancer, NetworkConfig, ScheduledTarget, ServiceState, ServiceStatus,
};
use crate::task_definition::Materializer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(ServiceState),
    Updated(ServiceState),
    Deleted {
        service_name: String,
        target_group_arn: String,
    },
    Scheduled {
        rule_name: String,
        task_definition_arn: String,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created(state) => write!(f, "Created service {} ({})", state.name, state.status),
            Outcome::Updated(state) => write!(
                f,
                "Updated service {} to {}",
                state.name,
                state.task_definition.as_deref().unwrap_or("new task definition")
            ),
            Outcome::Deleted {
                service_name,
                target_group_arn,
            } => write!(f, "Deleted service {} and target group {}", service_name, target_group_arn),
            Outcome::Scheduled {
                rule_name,
                task_definition_arn,
            } => write!(f, "Rule {} scheduled to run {}", rule_name, task_definition_arn),
        }
    }
}

pub struct ServiceOrchestrator {
    config: Arc<ServiceConfig>,
    containers: Arc<dyn ContainerOrchestrator>,
    load_balancer: Arc<dyn LoadBalancer>,
    scheduler: Arc<dyn EventScheduler>,
    materializer: Materializer,
    linkage: Box<dyn LinkageResolver>,
    settle_policy: SettlePolicy,
}

impl ServiceOrchestrator {
    pub fn new(
        config: Arc<ServiceConfig>,
        containers: Arc<dyn ContainerOrchestrator>,
        load_balancer: Arc<dyn LoadBalancer>,
        scheduler: Arc<dyn EventScheduler>,
        materializer: Materializer,
    ) -> Self {
        let settle_policy = SettlePolicy::with_timeout(config.settle_timeout);
        Self {
            config,
            containers,
            load_balancer,
            scheduler,
            materializer,
            linkage: Box::new(EventLogResolver),
            settle_policy,
        }
    }

    pub fn with_settle_policy(mut self, settle_policy: SettlePolicy) -> Self {
        self.settle_policy = settle_policy;
        self
    }

    /// Runs the action the configuration was resolved for
    pub async fn run(&self) -> Result<Outcome> {
        info!("Running {} for service {}", self.config.action, self.config.service_name);

        match self.config.action {
            Action::Create => self.create().await.map(Outcome::Created),
            Action::Update => self.update().await.map(Outcome::Updated),
            Action::Delete => self.delete().await,
            Action::Service => self.reconcile().await,
            Action::Schedule => self.schedule().await,
        }
    }

    pub async fn create(&self) -> Result<ServiceState> {
        let observed = self.observe().await?;
        self.create_from(observed.as_ref()).await
    }

    pub async fn update(&self) -> Result<ServiceState> {
        let observed = self.observe().await?;
        self.update_from(observed.as_ref()).await
    }

    /// Updates a live service, creates one otherwise. A DRAINING service is
    /// handed to update, which rejects it.
    pub async fn reconcile(&self) -> Result<Outcome> {
        let observed = self.observe().await?;

        match observed.as_ref().map(|s| s.status) {
            Some(ServiceStatus::Active) | Some(ServiceStatus::Draining) => {
                info!("Service {} exists, updating", self.config.service_name);
                self.update_from(observed.as_ref()).await.map(Outcome::Updated)
            }
            Some(ServiceStatus::Inactive) | None => {
                info!("Service {} does not exist, creating", self.config.service_name);
                self.create_from(observed.as_ref()).await.map(Outcome::Created)
            }
        }
    }

    pub async fn delete(&self) -> Result<Outcome> {
        let name = &self.config.service_name;
        let cluster = self.config.cluster()?;
        let listener_arn = self.config.listener_arn()?;

        info!("delete step 1/6: finding target group of {}", name);
        let events = self
            .observe()
            .await?
            .map(|state| state.events)
            .unwrap_or_default();
        let target_group_arn = self.linkage.resolve_target_group(name, &events)?;

        info!("delete step 2/6: finding listener rule for {}", target_group_arn);
        let rules = self.load_balancer.describe_rules(listener_arn).await?;
        let rule = find_rule_for(&rules, &target_group_arn);

        match rule {
            Some(rule) => {
                info!("delete step 3/6: deleting rule {}", rule.arn);
                self.load_balancer.delete_rule(&rule.arn).await?;
            }
            None => warn!(
                "delete step 3/6: no rule on {} forwards to {}, skipping",
                listener_arn, target_group_arn
            ),
        }

        info!("delete step 4/6: waiting for {} to be released", target_group_arn);
        match wait_until_deletable(self.load_balancer.as_ref(), &target_group_arn, &self.settle_policy).await? {
            Released::Detached => {
                info!("delete step 5/6: deleting target group {}", target_group_arn);
                self.load_balancer.delete_target_group(&target_group_arn).await?;
            }
            Released::Gone => warn!("delete step 5/6: target group {} already gone, skipping", target_group_arn),
        }

        info!("delete step 6/6: draining and deleting service {}", name);
        self.containers.set_desired_count(cluster, name, 0).await?;
        self.containers.delete_service(cluster, name).await?;

        Ok(Outcome::Deleted {
            service_name: name.clone(),
            target_group_arn,
        })
    }

    pub async fn schedule(&self) -> Result<Outcome> {
        let name = &self.config.service_name;
        let cron = self.config.cron()?;
        let cluster_arn = self.config.cluster_arn()?;
        let role_arn = self.config.schedule_role()?;
        let network = self.network()?;

        info!("schedule step 1/2: registering task definition for {}", name);
        let task_definition_arn = self.register_task_definition().await?;

        info!("schedule step 2/2: scheduling {} with {}", name, cron);
        self.scheduler.put_rule(name, cron).await?;
        self.scheduler
            .put_targets(&ScheduledTarget {
                rule_name: name.clone(),
                cluster_arn: cluster_arn.to_string(),
                task_definition_arn: task_definition_arn.clone(),
                role_arn: role_arn.to_string(),
                launch_type: self.config.launch_type.clone(),
                network,
            })
            .await?;

        Ok(Outcome::Scheduled {
            rule_name: name.clone(),
            task_definition_arn,
        })
    }

    async fn observe(&self) -> Result<Option<ServiceState>> {
        let state = self
            .containers
            .describe_service(self.config.cluster()?, &self.config.service_name)
            .await?;

        match &state {
            Some(state) => info!("Service {} is {}", state.name, state.status),
            None => info!("Service {} not found", self.config.service_name),
        }
        Ok(state)
    }

    async fn create_from(&self, observed: Option<&ServiceState>) -> Result<ServiceState> {
        let name = &self.config.service_name;

        if observed.is_some_and(|s| s.status != ServiceStatus::Inactive) {
            return Err(DeployError::ServiceAlreadyExists {
                service: name.clone(),
            });
        }

        // Resolve everything the later steps need before mutating anything
        let cluster = self.config.cluster()?;
        let listener_arn = self.config.listener_arn()?;
        let network = self.network()?;
        let vpc_id = self.config.vpc_id()?;

        info!("create step 1/5: materializing task definition for {}", name);
        let spec = self.materializer.prepare(&self.config)?;

        info!("create step 2/5: registering task definition {}", spec.family);
        let task_definition_arn = self.containers.register_task_definition(&spec).await?;

        info!("create step 3/5: creating target group {}", name);
        let target_group_arn = self
            .load_balancer
            .create_target_group(&CreateTargetGroupRequest {
                name: name.clone(),
                port: self.config.container_port,
                vpc_id: vpc_id.to_string(),
                health_check: self.config.health_check.clone(),
            })
            .await?;

        let rules = self.load_balancer.describe_rules(listener_arn).await?;
        let priority = next_rule_priority(&rules);
        let hostname = self.config.rule_hostname();
        info!("create step 4/5: routing {} at priority {}", hostname, priority);
        self.load_balancer
            .create_rule(&CreateRuleRequest {
                listener_arn: listener_arn.to_string(),
                target_group_arn: target_group_arn.clone(),
                priority,
                hostname,
            })
            .await?;

        info!("create step 5/5: creating service {}", name);
        self.containers
            .create_service(&CreateServiceRequest {
                cluster: cluster.to_string(),
                service_name: name.clone(),
                task_definition_arn,
                target_group_arn,
                container_port: self.config.container_port,
                desired_count: self.config.desired_count,
                launch_type: self.config.launch_type.clone(),
                network,
            })
            .await
    }

    async fn update_from(&self, observed: Option<&ServiceState>) -> Result<ServiceState> {
        let name = &self.config.service_name;

        match observed.map(|s| s.status) {
            None => {
                return Err(DeployError::ServiceNotFound {
                    service: name.clone(),
                    deleted: false,
                })
            }
            Some(ServiceStatus::Inactive) => {
                return Err(DeployError::ServiceNotFound {
                    service: name.clone(),
                    deleted: true,
                })
            }
            Some(ServiceStatus::Draining) => {
                return Err(DeployError::ServiceDraining {
                    service: name.clone(),
                })
            }
            Some(ServiceStatus::Active) => {}
        }

        let cluster = self.config.cluster()?;

        info!("update step 1/2: registering task definition for {}", name);
        let task_definition_arn = self.register_task_definition().await?;

        info!("update step 2/2: rolling {} onto {}", name, task_definition_arn);
        self.containers
            .update_service(cluster, name, &task_definition_arn)
            .await
    }

    async fn register_task_definition(&self) -> Result<String> {
        let spec = self.materializer.prepare(&self.config)?;
        self.containers.register_task_definition(&spec).await
    }

    fn network(&self) -> Result<NetworkConfig> {
        Ok(NetworkConfig {
            subnets: self.config.subnets()?.to_vec(),
            security_group: self.config.security_group()?.to_string(),
        })
    }
}

/// One above the highest numbered priority on the listener; 1 when there is none
pub fn next_rule_priority(rules: &[ListenerRule]) -> i32 {
    rules.iter().filter_map(|r| r.priority).max().unwrap_or(0) + 1
}

/// First rule, in listener order, with an action forwarding to `target_group_arn`
pub fn find_rule_for<'a>(rules: &'a [ListenerRule], target_group_arn: &str) -> Option<&'a ListenerRule> {
    rules.iter().find(|rule| rule.forwards_to(target_group_arn))
}
