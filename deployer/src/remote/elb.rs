use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{
    Action, ActionTypeEnum, Matcher, ProtocolEnum, Rule, RuleCondition, TargetTypeEnum,
};
use aws_sdk_elasticloadbalancingv2::Client;
use tracing::{debug, info};

use super::aws::sdk_error;
use super::{CreateRuleRequest, CreateTargetGroupRequest, ListenerRule, LoadBalancer, TargetGroupInfo};
use crate::errors::{DeployError, Result};

const HOST_HEADER_FIELD: &str = "host-header";
const HEALTHY_HTTP_CODE: &str = "200";

pub struct ElbLoadBalancer {
    client: Client,
}

impl ElbLoadBalancer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LoadBalancer for ElbLoadBalancer {
    async fn describe_rules(&self, listener_arn: &str) -> Result<Vec<ListenerRule>> {
        let mut rules = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_rules()
                .listener_arn(listener_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_error("DescribeRules"))?;

            rules.extend(output.rules().iter().map(to_listener_rule));

            match output.next_marker() {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }

        debug!("Listener {} has {} rules", listener_arn, rules.len());
        Ok(rules)
    }

    async fn create_rule(&self, request: &CreateRuleRequest) -> Result<ListenerRule> {
        let action = Action::builder()
            .r#type(ActionTypeEnum::Forward)
            .target_group_arn(&request.target_group_arn)
            .build();

        let condition = RuleCondition::builder()
            .field(HOST_HEADER_FIELD)
            .values(&request.hostname)
            .build();

        let output = self
            .client
            .create_rule()
            .listener_arn(&request.listener_arn)
            .priority(request.priority)
            .actions(action)
            .conditions(condition)
            .send()
            .await
            .map_err(sdk_error("CreateRule"))?;

        let rule = output
            .rules()
            .first()
            .map(to_listener_rule)
            .ok_or_else(|| DeployError::remote("CreateRule", "response carried no rule"))?;

        info!("Created rule {} for {} at priority {}", rule.arn, request.hostname, request.priority);
        Ok(rule)
    }

    async fn delete_rule(&self, rule_arn: &str) -> Result<()> {
        self.client
            .delete_rule()
            .rule_arn(rule_arn)
            .send()
            .await
            .map_err(sdk_error("DeleteRule"))?;
        Ok(())
    }

    async fn create_target_group(&self, request: &CreateTargetGroupRequest) -> Result<String> {
        let health = &request.health_check;

        let output = self
            .client
            .create_target_group()
            .name(&request.name)
            .protocol(ProtocolEnum::Http)
            .port(i32::from(request.port))
            .vpc_id(&request.vpc_id)
            .target_type(TargetTypeEnum::Ip)
            .health_check_enabled(health.enabled)
            .health_check_interval_seconds(health.interval_seconds)
            .health_check_path(&health.path)
            .health_check_port(request.port.to_string())
            .health_check_protocol(ProtocolEnum::from(health.protocol.as_str()))
            .health_check_timeout_seconds(health.timeout_seconds)
            .healthy_threshold_count(health.healthy_threshold_count)
            .unhealthy_threshold_count(health.unhealthy_threshold_count)
            .matcher(Matcher::builder().http_code(HEALTHY_HTTP_CODE).build())
            .send()
            .await
            .map_err(sdk_error("CreateTargetGroup"))?;

        let arn = output
            .target_groups()
            .first()
            .and_then(|tg| tg.target_group_arn())
            .ok_or_else(|| DeployError::remote("CreateTargetGroup", "response carried no target group"))?;

        info!("Created target group {}", arn);
        Ok(arn.to_string())
    }

    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroupInfo>> {
        let result = self
            .client
            .describe_target_groups()
            .target_group_arns(target_group_arn)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_target_group_not_found_exception()) =>
            {
                return Ok(None);
            }
            Err(err) => return Err(sdk_error("DescribeTargetGroups")(err)),
        };

        Ok(output.target_groups().first().map(|tg| TargetGroupInfo {
            arn: tg.target_group_arn().unwrap_or(target_group_arn).to_string(),
            load_balancer_arns: tg.load_balancer_arns().to_vec(),
        }))
    }

    async fn delete_target_group(&self, target_group_arn: &str) -> Result<()> {
        self.client
            .delete_target_group()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(sdk_error("DeleteTargetGroup"))?;
        Ok(())
    }
}

fn to_listener_rule(rule: &Rule) -> ListenerRule {
    let mut target_group_arns: Vec<String> = Vec::new();

    for action in rule.actions() {
        let forwarded = action
            .forward_config()
            .map(|config| config.target_groups())
            .unwrap_or_default()
            .iter()
            .filter_map(|tuple| tuple.target_group_arn());

        for arn in action.target_group_arn().into_iter().chain(forwarded) {
            if !target_group_arns.iter().any(|known| known == arn) {
                target_group_arns.push(arn.to_string());
            }
        }
    }

    ListenerRule {
        arn: rule.rule_arn().unwrap_or_default().to_string(),
        // The default rule reports "default" rather than a number
        priority: rule.priority().and_then(|p| p.parse().ok()),
        target_group_arns,
    }
}
