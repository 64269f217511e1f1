use async_trait::async_trait;
use aws_sdk_ecs::primitives::DateTime as SdkDateTime;
use aws_sdk_ecs::types::{
    AwsVpcConfiguration, Compatibility, ContainerCondition, ContainerDefinition as EcsContainerDefinition,
    ContainerDependency, EfsTransitEncryption, EfsVolumeConfiguration, HealthCheck, KeyValuePair, LaunchType,
    LoadBalancer as EcsLoadBalancer, LogConfiguration, LogDriver, MountPoint, NetworkConfiguration, NetworkMode,
    PortMapping, RepositoryCredentials, Secret, Service, TransportProtocol, Volume,
};
use aws_sdk_ecs::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::aws::sdk_error;
use super::{ContainerOrchestrator, CreateServiceRequest, ServiceEvent, ServiceState, ServiceStatus};
use crate::errors::{DeployError, Result};
use crate::task_definition::model;
use crate::task_definition::{ContainerDefinition, TaskSpecification};

const REGISTER: &str = "RegisterTaskDefinition";

pub struct EcsOrchestrator {
    client: Client,
}

impl EcsOrchestrator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContainerOrchestrator for EcsOrchestrator {
    async fn register_task_definition(&self, spec: &TaskSpecification) -> Result<String> {
        let containers = spec
            .container_definitions
            .iter()
            .map(to_sdk_container)
            .collect::<Result<Vec<_>>>()?;

        let compatibilities = spec
            .requires_compatibilities
            .iter()
            .map(|c| Compatibility::from(c.as_str()))
            .collect();

        let volumes = spec.volumes.iter().map(to_sdk_volume).collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .register_task_definition()
            .family(&spec.family)
            .set_container_definitions(Some(containers))
            .set_cpu(spec.cpu.clone())
            .set_memory(spec.memory.clone())
            .set_network_mode(spec.network_mode.as_deref().map(NetworkMode::from))
            .set_requires_compatibilities(Some(compatibilities))
            .set_execution_role_arn(spec.execution_role_arn.clone())
            .set_task_role_arn(spec.task_role_arn.clone())
            .set_volumes(Some(volumes))
            .send()
            .await
            .map_err(sdk_error(REGISTER))?;

        let arn = output
            .task_definition()
            .and_then(|td| td.task_definition_arn())
            .ok_or_else(|| DeployError::remote(REGISTER, "response carried no task definition ARN"))?;

        info!("Registered task definition {}", arn);
        Ok(arn.to_string())
    }

    async fn describe_service(&self, cluster: &str, service_name: &str) -> Result<Option<ServiceState>> {
        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service_name)
            .send()
            .await
            .map_err(sdk_error("DescribeServices"))?;

        for failure in output.failures() {
            debug!(
                "DescribeServices failure for {}: {}",
                failure.arn().unwrap_or(service_name),
                failure.reason().unwrap_or("unknown")
            );
        }

        output
            .services()
            .first()
            .map(|service| to_service_state("DescribeServices", service))
            .transpose()
    }

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<ServiceState> {
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(request.network.subnets.clone()))
            .security_groups(&request.network.security_group)
            .build()
            .map_err(sdk_error("CreateService"))?;

        let load_balancer = EcsLoadBalancer::builder()
            .container_name(&request.service_name)
            .container_port(i32::from(request.container_port))
            .target_group_arn(&request.target_group_arn)
            .build();

        let output = self
            .client
            .create_service()
            .cluster(&request.cluster)
            .service_name(&request.service_name)
            .task_definition(&request.task_definition_arn)
            .desired_count(request.desired_count)
            .launch_type(LaunchType::from(request.launch_type.as_str()))
            .load_balancers(load_balancer)
            .network_configuration(NetworkConfiguration::builder().awsvpc_configuration(vpc).build())
            .send()
            .await
            .map_err(sdk_error("CreateService"))?;

        let service = output
            .service()
            .ok_or_else(|| DeployError::remote("CreateService", "response carried no service"))?;
        to_service_state("CreateService", service)
    }

    async fn update_service(&self, cluster: &str, service_name: &str, task_definition_arn: &str) -> Result<ServiceState> {
        let output = self
            .client
            .update_service()
            .cluster(cluster)
            .service(service_name)
            .task_definition(task_definition_arn)
            .send()
            .await
            .map_err(sdk_error("UpdateService"))?;

        let service = output
            .service()
            .ok_or_else(|| DeployError::remote("UpdateService", "response carried no service"))?;
        to_service_state("UpdateService", service)
    }

    async fn set_desired_count(&self, cluster: &str, service_name: &str, desired_count: i32) -> Result<()> {
        self.client
            .update_service()
            .cluster(cluster)
            .service(service_name)
            .desired_count(desired_count)
            .send()
            .await
            .map_err(sdk_error("UpdateService"))?;
        Ok(())
    }

    async fn delete_service(&self, cluster: &str, service_name: &str) -> Result<()> {
        self.client
            .delete_service()
            .cluster(cluster)
            .service(service_name)
            .send()
            .await
            .map_err(sdk_error("DeleteService"))?;
        Ok(())
    }
}

fn to_sdk_container(container: &ContainerDefinition) -> Result<EcsContainerDefinition> {
    let log_configuration = container
        .log_configuration
        .as_ref()
        .map(|log| {
            LogConfiguration::builder()
                .log_driver(LogDriver::from(log.log_driver.as_str()))
                .set_options(Some(log.options.clone().into_iter().collect()))
                .build()
        })
        .transpose()
        .map_err(sdk_error(REGISTER))?;

    let repository_credentials = container
        .repository_credentials
        .as_ref()
        .map(|creds| {
            RepositoryCredentials::builder()
                .credentials_parameter(&creds.credentials_parameter)
                .build()
        })
        .transpose()
        .map_err(sdk_error(REGISTER))?;

    let environment = container
        .environment
        .iter()
        .map(|var| KeyValuePair::builder().name(&var.name).value(&var.value).build())
        .collect();

    let port_mappings = container
        .port_mappings
        .iter()
        .map(|mapping| {
            PortMapping::builder()
                .container_port(mapping.container_port)
                .set_host_port(mapping.host_port)
                .set_protocol(mapping.protocol.as_deref().map(TransportProtocol::from))
                .build()
        })
        .collect();

    let secrets = container
        .secrets
        .iter()
        .map(|secret| {
            Secret::builder()
                .name(&secret.name)
                .value_from(&secret.value_from)
                .build()
                .map_err(sdk_error(REGISTER))
        })
        .collect::<Result<Vec<_>>>()?;

    let mount_points = container
        .mount_points
        .iter()
        .map(|mount| {
            MountPoint::builder()
                .set_source_volume(mount.source_volume.clone())
                .set_container_path(mount.container_path.clone())
                .set_read_only(mount.read_only)
                .build()
        })
        .collect();

    let health_check = container
        .health_check
        .as_ref()
        .map(|check| {
            HealthCheck::builder()
                .set_command(Some(check.command.clone()))
                .set_interval(check.interval)
                .set_timeout(check.timeout)
                .set_retries(check.retries)
                .set_start_period(check.start_period)
                .build()
        })
        .transpose()
        .map_err(sdk_error(REGISTER))?;

    let depends_on = container
        .depends_on
        .iter()
        .map(|dependency| {
            ContainerDependency::builder()
                .container_name(&dependency.container_name)
                .condition(ContainerCondition::from(dependency.condition.as_str()))
                .build()
                .map_err(sdk_error(REGISTER))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EcsContainerDefinition::builder()
        .name(&container.name)
        .image(&container.image)
        .set_entry_point(container.entry_point.clone())
        .set_command(container.command.clone())
        .set_working_directory(container.working_directory.clone())
        .set_environment(Some(environment))
        .set_secrets(Some(secrets))
        .set_essential(container.essential)
        .set_cpu(container.cpu)
        .set_memory(container.memory)
        .set_memory_reservation(container.memory_reservation)
        .set_log_configuration(log_configuration)
        .set_port_mappings(Some(port_mappings))
        .set_mount_points(Some(mount_points))
        .set_health_check(health_check)
        .set_depends_on(Some(depends_on))
        .set_repository_credentials(repository_credentials)
        .build())
}

fn to_sdk_volume(volume: &model::Volume) -> Result<Volume> {
    let efs = volume
        .efs_volume_configuration
        .as_ref()
        .map(|efs| {
            EfsVolumeConfiguration::builder()
                .file_system_id(&efs.file_system_id)
                .set_root_directory(efs.root_directory.clone())
                .set_transit_encryption(efs.transit_encryption.as_deref().map(EfsTransitEncryption::from))
                .build()
        })
        .transpose()
        .map_err(sdk_error(REGISTER))?;

    Ok(Volume::builder()
        .name(&volume.name)
        .set_efs_volume_configuration(efs)
        .build())
}

fn to_service_state(operation: &'static str, service: &Service) -> Result<ServiceState> {
    let raw_status = service.status().unwrap_or_default();
    let status = ServiceStatus::parse(raw_status)
        .ok_or_else(|| DeployError::remote(operation, format!("unexpected service status '{}'", raw_status)))?;

    let events = service
        .events()
        .iter()
        .map(|event| ServiceEvent {
            id: event.id().map(str::to_string),
            created_at: event.created_at().and_then(to_utc),
            message: event.message().unwrap_or_default().to_string(),
        })
        .collect();

    Ok(ServiceState {
        name: service.service_name().unwrap_or_default().to_string(),
        status,
        task_definition: service.task_definition().map(str::to_string),
        desired_count: service.desired_count(),
        events,
    })
}

fn to_utc(timestamp: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
