//! ECS task definition and service operations
//!
//! Task definitions are always Fargate, `awsvpc`, X86_64/Linux, with a
//! single container. [`TaskDefinitionSpec`] carries only the parts that
//! vary between deployments and updates.

use super::context::{AwsContext, FromAwsContext};
use super::error::{AwsError, classify_sdk_error};
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, Compatibility, ContainerDefinition, CpuArchitecture,
    HealthCheck, LaunchType, LoadBalancer, LogConfiguration, LogDriver, NetworkConfiguration,
    NetworkMode, OsFamily, PortMapping, RuntimePlatform, Tag, TransportProtocol,
};
use ecs_deploy_common::{ServiceId, TargetGroupId, TaskDefinitionId, TaskSize};
use std::collections::BTreeMap;
use tracing::debug;

/// Container log routing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLogging {
    /// Log driver name (e.g. "awslogs")
    pub driver: String,
    pub options: BTreeMap<String, String>,
}

/// Container health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHealthCheck {
    pub command: Vec<String>,
    pub interval_secs: Option<i32>,
    pub timeout_secs: Option<i32>,
    pub retries: Option<i32>,
    pub start_period_secs: Option<i32>,
}

/// The single container of a task definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Container-level CPU units (0 lets the task-level value apply)
    pub cpu: i32,
    /// TCP ports, each mapped to the same host port
    pub ports: Vec<i32>,
    pub essential: bool,
    pub logging: Option<ContainerLogging>,
    pub health_check: Option<ContainerHealthCheck>,
}

/// Parameters for registering a task definition revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub container: ContainerSpec,
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
    pub size: TaskSize,
    pub tags: Vec<(String, String)>,
}

/// A registered task definition revision as described by ECS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionInfo {
    pub id: TaskDefinitionId,
    pub family: String,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub containers: Vec<ContainerSpec>,
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
}

/// Parameters for creating a Fargate service behind a target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub cluster: String,
    pub name: String,
    pub task_definition: TaskDefinitionId,
    pub target_group: TargetGroupId,
    pub container_name: String,
    pub container_port: i32,
    pub desired_count: i32,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub enable_execute_command: bool,
}

/// Trait for ECS operations that can be mocked in tests.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait EcsOperations: Send + Sync {
    /// Register a new task definition revision
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<TaskDefinitionId, AwsError>;

    /// Describe a task definition revision
    async fn describe_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<TaskDefinitionInfo, AwsError>;

    /// ARNs of the family's revisions, oldest first
    async fn list_task_definitions(&self, family: &str)
    -> Result<Vec<TaskDefinitionId>, AwsError>;

    /// Deregister a task definition revision
    async fn deregister_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError>;

    /// Create a service
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, AwsError>;

    /// Point a service at another task definition revision
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError>;

    /// Delete a service even if it still runs tasks
    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), AwsError>;
}

/// ECS client wrapper
pub struct EcsClient {
    client: aws_sdk_ecs::Client,
}

impl FromAwsContext for EcsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ecs_client(),
        }
    }
}

fn invalid_request(err: aws_sdk_ecs::error::BuildError) -> AwsError {
    AwsError::InvalidRequest(err.to_string())
}

fn container_definition(spec: &ContainerSpec) -> Result<ContainerDefinition, AwsError> {
    let port_mappings = spec
        .ports
        .iter()
        .map(|port| {
            PortMapping::builder()
                .container_port(*port)
                .host_port(*port)
                .protocol(TransportProtocol::Tcp)
                .build()
        })
        .collect();

    let logging = spec
        .logging
        .as_ref()
        .map(|l| {
            LogConfiguration::builder()
                .log_driver(LogDriver::from(l.driver.as_str()))
                .set_options(Some(l.options.clone().into_iter().collect()))
                .build()
        })
        .transpose()
        .map_err(invalid_request)?;

    let health_check = spec
        .health_check
        .as_ref()
        .map(|h| {
            HealthCheck::builder()
                .set_command(Some(h.command.clone()))
                .set_interval(h.interval_secs)
                .set_timeout(h.timeout_secs)
                .set_retries(h.retries)
                .set_start_period(h.start_period_secs)
                .build()
        })
        .transpose()
        .map_err(invalid_request)?;

    Ok(ContainerDefinition::builder()
        .name(&spec.name)
        .image(&spec.image)
        .cpu(spec.cpu)
        .essential(spec.essential)
        .set_port_mappings(Some(port_mappings))
        .set_log_configuration(logging)
        .set_health_check(health_check)
        .build())
}

fn container_spec(def: &ContainerDefinition) -> ContainerSpec {
    ContainerSpec {
        name: def.name().unwrap_or_default().to_string(),
        image: def.image().unwrap_or_default().to_string(),
        cpu: def.cpu(),
        ports: def
            .port_mappings()
            .iter()
            .filter_map(|p| p.container_port())
            .collect(),
        essential: def.essential().unwrap_or(true),
        logging: def.log_configuration().map(|l| ContainerLogging {
            driver: l.log_driver().as_str().to_string(),
            options: l
                .options()
                .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
        }),
        health_check: def.health_check().map(|h| ContainerHealthCheck {
            command: h.command().to_vec(),
            interval_secs: h.interval(),
            timeout_secs: h.timeout(),
            retries: h.retries(),
            start_period_secs: h.start_period(),
        }),
    }
}

impl EcsOperations for EcsClient {
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<TaskDefinitionId, AwsError> {
        let tags = spec
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect();

        let response = self
            .client
            .register_task_definition()
            .family(&spec.family)
            .network_mode(NetworkMode::Awsvpc)
            .container_definitions(container_definition(&spec.container)?)
            .set_task_role_arn(spec.task_role_arn.clone())
            .set_execution_role_arn(spec.execution_role_arn.clone())
            .requires_compatibilities(Compatibility::Fargate)
            .cpu(spec.size.cpu_str())
            .memory(spec.size.memory_str())
            .runtime_platform(
                RuntimePlatform::builder()
                    .cpu_architecture(CpuArchitecture::X8664)
                    .operating_system_family(OsFamily::Linux)
                    .build(),
            )
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        response
            .task_definition()
            .and_then(|td| td.task_definition_arn())
            .map(TaskDefinitionId::from)
            .ok_or(AwsError::MalformedResponse("a task definition ARN"))
    }

    async fn describe_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<TaskDefinitionInfo, AwsError> {
        let response = self
            .client
            .describe_task_definition()
            .task_definition(task_definition.as_str())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let td = response
            .task_definition()
            .ok_or(AwsError::MalformedResponse("a task definition"))?;

        Ok(TaskDefinitionInfo {
            id: td
                .task_definition_arn()
                .map(TaskDefinitionId::from)
                .unwrap_or_else(|| task_definition.clone()),
            family: td
                .family()
                .ok_or(AwsError::MalformedResponse("a task definition family"))?
                .to_string(),
            cpu: td.cpu().map(str::to_string),
            memory: td.memory().map(str::to_string),
            containers: td.container_definitions().iter().map(container_spec).collect(),
            task_role_arn: td.task_role_arn().map(str::to_string),
            execution_role_arn: td.execution_role_arn().map(str::to_string),
        })
    }

    async fn list_task_definitions(
        &self,
        family: &str,
    ) -> Result<Vec<TaskDefinitionId>, AwsError> {
        let mut arns = Vec::new();
        let mut next_token = None;

        loop {
            let page = self
                .client
                .list_task_definitions()
                .family_prefix(family)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            arns.extend(
                page.task_definition_arns()
                    .iter()
                    .map(|arn| TaskDefinitionId::from(arn.as_str())),
            );

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(family = %family, count = arns.len(), "Listed task definitions");
        Ok(arns)
    }

    async fn deregister_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError> {
        self.client
            .deregister_task_definition()
            .task_definition(task_definition.as_str())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, AwsError> {
        let network = AwsVpcConfiguration::builder()
            .set_subnets(Some(spec.subnets.clone()))
            .set_security_groups(Some(spec.security_groups.clone()))
            .assign_public_ip(AssignPublicIp::Disabled)
            .build()
            .map_err(invalid_request)?;

        let response = self
            .client
            .create_service()
            .cluster(&spec.cluster)
            .service_name(&spec.name)
            .task_definition(spec.task_definition.as_str())
            .load_balancers(
                LoadBalancer::builder()
                    .target_group_arn(spec.target_group.as_str())
                    .container_name(&spec.container_name)
                    .container_port(spec.container_port)
                    .build(),
            )
            .desired_count(spec.desired_count)
            .launch_type(LaunchType::Fargate)
            .network_configuration(
                NetworkConfiguration::builder()
                    .awsvpc_configuration(network)
                    .build(),
            )
            .enable_execute_command(spec.enable_execute_command)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        response
            .service()
            .and_then(|s| s.service_arn())
            .map(ServiceId::from)
            .ok_or(AwsError::MalformedResponse("a service ARN"))
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError> {
        self.client
            .update_service()
            .cluster(cluster)
            .service(service)
            .task_definition(task_definition.as_str())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), AwsError> {
        self.client
            .delete_service()
            .cluster(cluster)
            .service(service)
            .force(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }
}
