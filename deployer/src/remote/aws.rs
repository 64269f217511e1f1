use aws_config::{BehaviorVersion, Region};
use aws_smithy_types::error::display::DisplayErrorContext;
use std::error::Error;
use std::sync::Arc;
use tracing::info;

use super::ecs::EcsOrchestrator;
use super::elb::ElbLoadBalancer;
use super::events::CloudWatchScheduler;
use super::secrets::SecretsManagerStore;
use super::{ContainerOrchestrator, EventScheduler, LoadBalancer, SecretStore};
use crate::errors::DeployError;

/// Production collaborators sharing one SDK configuration
pub struct AwsCollaborators {
    pub containers: Arc<dyn ContainerOrchestrator>,
    pub load_balancer: Arc<dyn LoadBalancer>,
    pub scheduler: Arc<dyn EventScheduler>,
    pub secrets: Arc<dyn SecretStore>,
}

impl AwsCollaborators {
    /// Credentials come from the default provider chain
    pub async fn connect(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        info!("AWS clients configured for region {}", region);

        Self {
            containers: Arc::new(EcsOrchestrator::new(aws_sdk_ecs::Client::new(&sdk_config))),
            load_balancer: Arc::new(ElbLoadBalancer::new(
                aws_sdk_elasticloadbalancingv2::Client::new(&sdk_config),
            )),
            scheduler: Arc::new(CloudWatchScheduler::new(
                aws_sdk_cloudwatchevents::Client::new(&sdk_config),
            )),
            secrets: Arc::new(SecretsManagerStore::new(
                aws_sdk_secretsmanager::Client::new(&sdk_config),
            )),
        }
    }
}

/// Maps any SDK failure into `RemoteCall`, keeping the full error chain in the message
pub(crate) fn sdk_error<E>(operation: &'static str) -> impl FnOnce(E) -> DeployError
where
    E: Error + 'static,
{
    move |err| DeployError::remote(operation, DisplayErrorContext(&err).to_string())
}
