//! In-memory stand-in for the container orchestrator, load balancer and
//! event scheduler. Every call is appended to a shared log so tests can assert
//! on ordering and on the absence of mutations.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use deployer::errors::{DeployError, Result};
use deployer::remote::{
    ContainerOrchestrator, CreateRuleRequest, CreateServiceRequest, CreateTargetGroupRequest, EventScheduler,
    ListenerRule, LoadBalancer, ScheduledTarget, ServiceEvent, ServiceState, ServiceStatus, TargetGroupInfo,
};
use deployer::TaskSpecification;

pub const TASK_DEFINITION_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition/api:7";
pub const TARGET_GROUP_ARN: &str = "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/api/abc123";
pub const LOAD_BALANCER_ARN: &str = "arn:aws:elasticloadbalancing:us-east-1:123456789012:loadbalancer/app/shared/1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterTaskDefinition { family: String },
    DescribeService { cluster: String, service_name: String },
    CreateService(CreateServiceRequest),
    UpdateService { service_name: String, task_definition_arn: String },
    SetDesiredCount { service_name: String, desired_count: i32 },
    DeleteService { service_name: String },
    DescribeRules { listener_arn: String },
    CreateRule(CreateRuleRequest),
    DeleteRule { rule_arn: String },
    CreateTargetGroup(CreateTargetGroupRequest),
    DescribeTargetGroup { target_group_arn: String },
    DeleteTargetGroup { target_group_arn: String },
    PutRule { rule_name: String, schedule_expression: String },
    PutTargets(ScheduledTarget),
}

impl Call {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::DescribeService { .. } | Call::DescribeRules { .. } | Call::DescribeTargetGroup { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Call::RegisterTaskDefinition { .. } => "RegisterTaskDefinition",
            Call::DescribeService { .. } => "DescribeService",
            Call::CreateService(_) => "CreateService",
            Call::UpdateService { .. } => "UpdateService",
            Call::SetDesiredCount { .. } => "SetDesiredCount",
            Call::DeleteService { .. } => "DeleteService",
            Call::DescribeRules { .. } => "DescribeRules",
            Call::CreateRule(_) => "CreateRule",
            Call::DeleteRule { .. } => "DeleteRule",
            Call::CreateTargetGroup(_) => "CreateTargetGroup",
            Call::DescribeTargetGroup { .. } => "DescribeTargetGroup",
            Call::DeleteTargetGroup { .. } => "DeleteTargetGroup",
            Call::PutRule { .. } => "PutRule",
            Call::PutTargets(_) => "PutTargets",
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    service: Option<ServiceState>,
    rules: Vec<ListenerRule>,
    /// Successive `describe_target_group` answers; the last one repeats
    target_group_attachments: VecDeque<Vec<String>>,
    registered_specs: Vec<TaskSpecification>,
    fail_operation: Option<&'static str>,
    target_group_gone: bool,
}

#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(self, status: ServiceStatus, events: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.service = Some(ServiceState {
                name: "api".to_string(),
                status,
                task_definition: Some("arn:aws:ecs:us-east-1:123456789012:task-definition/api:6".to_string()),
                desired_count: 1,
                events: events
                    .iter()
                    .enumerate()
                    .map(|(i, message)| ServiceEvent {
                        id: Some(format!("event-{}", i)),
                        created_at: None,
                        message: message.to_string(),
                    })
                    .collect(),
            });
        }
        self
    }

    pub fn with_rule(self, arn: &str, priority: Option<i32>, target_groups: &[&str]) -> Self {
        self.state.lock().unwrap().rules.push(ListenerRule {
            arn: arn.to_string(),
            priority,
            target_group_arns: target_groups.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Queues one `describe_target_group` answer listing these load balancers
    pub fn with_target_group_attached_to(self, load_balancers: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .target_group_attachments
            .push_back(load_balancers.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Makes `describe_target_group` report the group as absent
    pub fn with_target_group_gone(self) -> Self {
        self.state.lock().unwrap().target_group_gone = true;
        self
    }

    /// Makes the named operation fail with a remote error
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.state.lock().unwrap().fail_operation = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::name).collect()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn registered_specs(&self) -> Vec<TaskSpecification> {
        self.state.lock().unwrap().registered_specs.clone()
    }

    pub fn containers(&self) -> Arc<dyn ContainerOrchestrator> {
        Arc::new(self.clone())
    }

    pub fn load_balancer(&self) -> Arc<dyn LoadBalancer> {
        Arc::new(self.clone())
    }

    pub fn scheduler(&self) -> Arc<dyn EventScheduler> {
        Arc::new(self.clone())
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let name = call.name();
        state.calls.push(call);
        match state.fail_operation {
            Some(failing) if failing == name => Err(DeployError::remote(failing, "injected failure")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ContainerOrchestrator for FakeCloud {
    async fn register_task_definition(&self, spec: &TaskSpecification) -> Result<String> {
        self.record(Call::RegisterTaskDefinition {
            family: spec.family.clone(),
        })?;
        self.state.lock().unwrap().registered_specs.push(spec.clone());
        Ok(TASK_DEFINITION_ARN.to_string())
    }

    async fn describe_service(&self, cluster: &str, service_name: &str) -> Result<Option<ServiceState>> {
        self.record(Call::DescribeService {
            cluster: cluster.to_string(),
            service_name: service_name.to_string(),
        })?;
        Ok(self.state.lock().unwrap().service.clone())
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceState> {
        self.record(Call::CreateService(request.clone()))?;
        Ok(ServiceState {
            name: request.service_name.clone(),
            status: ServiceStatus::Active,
            task_definition: Some(request.task_definition_arn.clone()),
            desired_count: request.desired_count,
            events: Vec::new(),
        })
    }

    async fn update_service(&self, _cluster: &str, service_name: &str, task_definition_arn: &str) -> Result<ServiceState> {
        self.record(Call::UpdateService {
            service_name: service_name.to_string(),
            task_definition_arn: task_definition_arn.to_string(),
        })?;
        Ok(ServiceState {
            name: service_name.to_string(),
            status: ServiceStatus::Active,
            task_definition: Some(task_definition_arn.to_string()),
            desired_count: 1,
            events: Vec::new(),
        })
    }

    async fn set_desired_count(&self, _cluster: &str, service_name: &str, desired_count: i32) -> Result<()> {
        self.record(Call::SetDesiredCount {
            service_name: service_name.to_string(),
            desired_count,
        })
    }

    async fn delete_service(&self, _cluster: &str, service_name: &str) -> Result<()> {
        self.record(Call::DeleteService {
            service_name: service_name.to_string(),
        })
    }
}

#[async_trait]
impl LoadBalancer for FakeCloud {
    async fn describe_rules(&self, listener_arn: &str) -> Result<Vec<ListenerRule>> {
        self.record(Call::DescribeRules {
            listener_arn: listener_arn.to_string(),
        })?;
        Ok(self.state.lock().unwrap().rules.clone())
    }

    async fn create_rule(&self, request: &CreateRuleRequest) -> Result<ListenerRule> {
        self.record(Call::CreateRule(request.clone()))?;
        Ok(ListenerRule {
            arn: format!("{}/rule/{}", request.listener_arn, request.priority),
            priority: Some(request.priority),
            target_group_arns: vec![request.target_group_arn.clone()],
        })
    }

    async fn delete_rule(&self, rule_arn: &str) -> Result<()> {
        self.record(Call::DeleteRule {
            rule_arn: rule_arn.to_string(),
        })
    }

    async fn create_target_group(&self, request: &CreateTargetGroupRequest) -> Result<String> {
        self.record(Call::CreateTargetGroup(request.clone()))?;
        Ok(TARGET_GROUP_ARN.to_string())
    }

    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroupInfo>> {
        self.record(Call::DescribeTargetGroup {
            target_group_arn: target_group_arn.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        if state.target_group_gone {
            return Ok(None);
        }
        let attachments = if state.target_group_attachments.len() > 1 {
            state.target_group_attachments.pop_front()
        } else {
            state.target_group_attachments.front().cloned()
        };

        Ok(Some(TargetGroupInfo {
            arn: target_group_arn.to_string(),
            load_balancer_arns: attachments.unwrap_or_default(),
        }))
    }

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<()> {
        self.record(Call::DeleteTargetGroup {
            target_group_arn: target_group_arn.to_string(),
        })
    }
}

#[async_trait]
impl EventScheduler for FakeCloud {
    async fn put_rule(&self, rule_name: &str, schedule_expression: &str) -> Result<()> {
        self.record(Call::PutRule {
            rule_name: rule_name.to_string(),
            schedule_expression: schedule_expression.to_string(),
        })
    }

    async fn put_targets(&self, target: &ScheduledTarget) -> Result<()> {
        self.record(Call::PutTargets(target.clone()))
    }
}
