//! Mock AWS endpoint for the SDK-backed collaborators
//!
//! Secrets Manager, ECS and CloudWatch Events speak `application/x-amz-json-1.1`:
//! every request is a POST to `/` whose operation is named by the
//! `x-amz-target` header. The load balancer API is form-encoded with an
//! `Action=` field and answers in XML.

use serde_json::{json, Value};
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use aws_sdk_ecs::config::retry::RetryConfig;
use aws_sdk_ecs::config::{BehaviorVersion, Credentials, Region};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const ECS_TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const SECRETS_TARGET_PREFIX: &str = "secretsmanager";
const EVENTS_TARGET_PREFIX: &str = "AWSEvents";
const ELB_NAMESPACE: &str = "http://elasticloadbalancing.amazonaws.com/doc/2015-12-01/";

/// Listener rule as rendered into a DescribeRules page
pub struct RuleXml<'a> {
    pub arn: &'a str,
    pub priority: &'a str,
    pub target_group: Option<&'a str>,
    pub forwarded: &'a [&'a str],
}

impl RuleXml<'_> {
    fn render(&self) -> String {
        let target_group = self
            .target_group
            .map(|arn| format!("<TargetGroupArn>{}</TargetGroupArn>", arn))
            .unwrap_or_default();
        let forward = if self.forwarded.is_empty() {
            String::new()
        } else {
            let tuples: String = self
                .forwarded
                .iter()
                .map(|arn| format!("<member><TargetGroupArn>{}</TargetGroupArn><Weight>1</Weight></member>", arn))
                .collect();
            format!("<ForwardConfig><TargetGroups>{}</TargetGroups></ForwardConfig>", tuples)
        };

        format!(
            "<member><RuleArn>{}</RuleArn><Priority>{}</Priority><IsDefault>{}</IsDefault>\
             <Actions><member><Type>forward</Type>{}{}</member></Actions></member>",
            self.arn,
            self.priority,
            self.priority == "default",
            target_group,
            forward
        )
    }
}

pub struct MockAwsServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockAwsServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    pub fn secrets_client(&self) -> aws_sdk_secretsmanager::Client {
        let config = aws_sdk_secretsmanager::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(test_credentials())
            .endpoint_url(&self.base_url)
            .retry_config(RetryConfig::disabled())
            .build();
        aws_sdk_secretsmanager::Client::from_conf(config)
    }

    pub fn ecs_client(&self) -> aws_sdk_ecs::Client {
        let config = aws_sdk_ecs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(test_credentials())
            .endpoint_url(&self.base_url)
            .retry_config(RetryConfig::disabled())
            .build();
        aws_sdk_ecs::Client::from_conf(config)
    }

    pub fn elb_client(&self) -> aws_sdk_elasticloadbalancingv2::Client {
        let config = aws_sdk_elasticloadbalancingv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(test_credentials())
            .endpoint_url(&self.base_url)
            .retry_config(RetryConfig::disabled())
            .build();
        aws_sdk_elasticloadbalancingv2::Client::from_conf(config)
    }

    pub fn events_client(&self) -> aws_sdk_cloudwatchevents::Client {
        let config = aws_sdk_cloudwatchevents::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(test_credentials())
            .endpoint_url(&self.base_url)
            .retry_config(RetryConfig::disabled())
            .build();
        aws_sdk_cloudwatchevents::Client::from_conf(config)
    }

    /// Secret whose `SecretString` is `secret_string`
    pub async fn mock_secret(&self, secret_string: &str) {
        self.respond(
            &format!("{}.GetSecretValue", SECRETS_TARGET_PREFIX),
            200,
            json!({
                "ARN": "arn:aws:secretsmanager:us-east-1:123456789012:secret:fargate-helper-AbCdEf",
                "Name": "fargate-helper",
                "SecretString": secret_string,
            }),
        )
        .await;
    }

    pub async fn mock_secret_not_found(&self) {
        self.respond(
            &format!("{}.GetSecretValue", SECRETS_TARGET_PREFIX),
            400,
            json!({
                "__type": "ResourceNotFoundException",
                "message": "Secrets Manager can't find the specified secret.",
            }),
        )
        .await;
    }

    pub async fn mock_secret_access_denied(&self) {
        self.respond(
            &format!("{}.GetSecretValue", SECRETS_TARGET_PREFIX),
            400,
            json!({
                "__type": "AccessDeniedException",
                "message": "User is not authorized to perform secretsmanager:GetSecretValue",
            }),
        )
        .await;
    }

    /// DescribeServices answering with a single service, events newest first
    pub async fn mock_service(&self, name: &str, status: &str, events: &[&str]) {
        let events: Vec<Value> = events
            .iter()
            .enumerate()
            .map(|(i, message)| {
                json!({
                    "id": format!("event-{}", i),
                    "createdAt": 1_700_000_000 - (i as i64) * 60,
                    "message": message,
                })
            })
            .collect();

        self.respond(
            &format!("{}.DescribeServices", ECS_TARGET_PREFIX),
            200,
            json!({
                "services": [{
                    "serviceArn": format!("arn:aws:ecs:us-east-1:123456789012:service/main/{}", name),
                    "serviceName": name,
                    "status": status,
                    "desiredCount": 1,
                    "taskDefinition": format!("arn:aws:ecs:us-east-1:123456789012:task-definition/{}:3", name),
                    "events": events,
                }],
                "failures": [],
            }),
        )
        .await;
    }

    pub async fn mock_service_missing(&self, name: &str) {
        self.respond(
            &format!("{}.DescribeServices", ECS_TARGET_PREFIX),
            200,
            json!({
                "services": [],
                "failures": [{
                    "arn": format!("arn:aws:ecs:us-east-1:123456789012:service/main/{}", name),
                    "reason": "MISSING",
                }],
            }),
        )
        .await;
    }

    pub async fn mock_register_task_definition(&self, arn: &str) {
        self.respond(
            &format!("{}.RegisterTaskDefinition", ECS_TARGET_PREFIX),
            200,
            json!({ "taskDefinition": { "taskDefinitionArn": arn } }),
        )
        .await;
    }

    /// JSON body of the first request sent for `operation` on a JSON-protocol API
    pub async fn request_body(&self, target: &str) -> Option<Value> {
        self.server
            .received_requests()
            .await?
            .into_iter()
            .find(|request| {
                request
                    .headers
                    .get("x-amz-target")
                    .is_some_and(|value| value.as_bytes() == target.as_bytes())
            })
            .and_then(|request| serde_json::from_slice(&request.body).ok())
    }

    /// First DescribeRules page; `next_marker` asks the client for another page
    pub async fn mock_rules_page(&self, rules: &[RuleXml<'_>], next_marker: Option<&str>) {
        let body = rules_response(rules, next_marker);
        self.respond_xml("DescribeRules", None, 200, body).await;
    }

    /// DescribeRules page served only to requests carrying `marker`
    pub async fn mock_rules_after(&self, marker: &str, rules: &[RuleXml<'_>]) {
        let body = rules_response(rules, None);
        self.respond_xml("DescribeRules", Some(&format!("Marker={}", marker)), 200, body)
            .await;
    }

    pub async fn mock_target_group(&self, arn: &str, load_balancer_arns: &[&str]) {
        let load_balancers: String = load_balancer_arns
            .iter()
            .map(|lb| format!("<member>{}</member>", lb))
            .collect();
        let body = format!(
            "<DescribeTargetGroupsResponse xmlns=\"{}\"><DescribeTargetGroupsResult><TargetGroups>\
             <member><TargetGroupArn>{}</TargetGroupArn><LoadBalancerArns>{}</LoadBalancerArns></member>\
             </TargetGroups></DescribeTargetGroupsResult></DescribeTargetGroupsResponse>",
            ELB_NAMESPACE, arn, load_balancers
        );
        self.respond_xml("DescribeTargetGroups", None, 200, body).await;
    }

    pub async fn mock_target_group_not_found(&self) {
        self.respond_xml("DescribeTargetGroups", None, 400, elb_error("TargetGroupNotFound", "One or more target groups not found"))
            .await;
    }

    pub async fn mock_target_group_throttled(&self) {
        self.respond_xml("DescribeTargetGroups", None, 400, elb_error("Throttling", "Rate exceeded"))
            .await;
    }

    /// PutTargets accepting every target, or rejecting one with `failure` as (code, message)
    pub async fn mock_put_targets(&self, failure: Option<(&str, &str)>) {
        let body = match failure {
            None => json!({ "FailedEntryCount": 0, "FailedEntries": [] }),
            Some((code, message)) => json!({
                "FailedEntryCount": 1,
                "FailedEntries": [{ "TargetId": "api", "ErrorCode": code, "ErrorMessage": message }],
            }),
        };
        self.respond(&format!("{}.PutTargets", EVENTS_TARGET_PREFIX), 200, body)
            .await;
    }

    async fn respond_xml(&self, action: &str, extra: Option<&str>, status: u16, body: String) {
        let response = ResponseTemplate::new(status)
            .insert_header("content-type", "text/xml")
            .set_body_string(body);
        let builder = Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains(format!("Action={}", action)));

        let mock = match extra {
            // More specific pages win over the catch-all first page
            Some(extra) => builder.and(body_string_contains(extra)).respond_with(response).with_priority(1),
            None => builder.respond_with(response),
        };
        mock.mount(&self.server).await;
    }

    async fn respond(&self, target: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", target))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("content-type", AMZ_JSON)
                    .set_body_string(body.to_string()),
            )
            .mount(&self.server)
            .await;
    }
}

fn rules_response(rules: &[RuleXml<'_>], next_marker: Option<&str>) -> String {
    let members: String = rules.iter().map(RuleXml::render).collect();
    let marker = next_marker
        .map(|m| format!("<NextMarker>{}</NextMarker>", m))
        .unwrap_or_default();
    format!(
        "<DescribeRulesResponse xmlns=\"{}\"><DescribeRulesResult><Rules>{}</Rules>{}</DescribeRulesResult>\
         <ResponseMetadata><RequestId>rules-request</RequestId></ResponseMetadata></DescribeRulesResponse>",
        ELB_NAMESPACE, members, marker
    )
}

fn elb_error(code: &str, message: &str) -> String {
    format!(
        "<ErrorResponse xmlns=\"{}\"><Error><Type>Sender</Type><Code>{}</Code><Message>{}</Message></Error>\
         <RequestId>error-request</RequestId></ErrorResponse>",
        ELB_NAMESPACE, code, message
    )
}

fn test_credentials() -> Credentials {
    Credentials::new("AKIDTEST", "test-secret", None, None, "mock-aws")
}
