use async_trait::async_trait;
use aws_sdk_cloudwatchevents::types::{
    AssignPublicIp, AwsVpcConfiguration, EcsParameters, LaunchType, NetworkConfiguration, Target,
};
use aws_sdk_cloudwatchevents::Client;
use tracing::info;

use super::aws::sdk_error;
use super::{EventScheduler, ScheduledTarget};
use crate::errors::{DeployError, Result};

const PLATFORM_VERSION: &str = "LATEST";
const TASK_COUNT: i32 = 1;

pub struct CloudWatchScheduler {
    client: Client,
}

impl CloudWatchScheduler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventScheduler for CloudWatchScheduler {
    async fn put_rule(&self, rule_name: &str, schedule_expression: &str) -> Result<()> {
        self.client
            .put_rule()
            .name(rule_name)
            .schedule_expression(schedule_expression)
            .send()
            .await
            .map_err(sdk_error("PutRule"))?;

        info!("Scheduled rule {} with {}", rule_name, schedule_expression);
        Ok(())
    }

    async fn put_targets(&self, target: &ScheduledTarget) -> Result<()> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(target.network.subnets.clone()))
            .security_groups(&target.network.security_group)
            .assign_public_ip(AssignPublicIp::Disabled)
            .build()
            .map_err(sdk_error("PutTargets"))?;

        let ecs_parameters = EcsParameters::builder()
            .task_definition_arn(&target.task_definition_arn)
            .task_count(TASK_COUNT)
            .launch_type(LaunchType::from(target.launch_type.as_str()))
            .network_configuration(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
            .platform_version(PLATFORM_VERSION)
            .group(&target.rule_name)
            .build()
            .map_err(sdk_error("PutTargets"))?;

        let sdk_target = Target::builder()
            .id(&target.rule_name)
            .arn(&target.cluster_arn)
            .role_arn(&target.role_arn)
            .ecs_parameters(ecs_parameters)
            .build()
            .map_err(sdk_error("PutTargets"))?;

        let output = self
            .client
            .put_targets()
            .rule(&target.rule_name)
            .targets(sdk_target)
            .send()
            .await
            .map_err(sdk_error("PutTargets"))?;

        if let Some(failed) = output.failed_entries().first() {
            return Err(DeployError::remote(
                "PutTargets",
                format!(
                    "{}: {}",
                    failed.error_code().unwrap_or("unknown"),
                    failed.error_message().unwrap_or("target rejected")
                ),
            ));
        }

        info!("Rule {} now runs {}", target.rule_name, target.task_definition_arn);
        Ok(())
    }
}
