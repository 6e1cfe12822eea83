//! Resource specifications derived from configuration

use crate::aws::ecs::{
    ContainerHealthCheck, ContainerLogging, ContainerSpec, ServiceSpec, TaskDefinitionSpec,
};
use crate::aws::elb::{TargetGroupSpec, TargetHealthCheck};
use crate::config::DeployConfig;
use chrono::{DateTime, Utc};
use ecs_deploy_common::defaults::{
    CONTAINER_HEALTH_COMMAND, CONTAINER_HEALTH_INTERVAL_SECS, CONTAINER_HEALTH_RETRIES,
    CONTAINER_HEALTH_START_PERIOD_SECS, CONTAINER_HEALTH_TIMEOUT_SECS, HEALTH_CHECK_INTERVAL_SECS,
    HEALTH_CHECK_MATCHER, HEALTH_CHECK_PATH, HEALTH_CHECK_TIMEOUT_SECS, HEALTHY_THRESHOLD,
    HTTPS_PORT, LOG_STREAM_PREFIX, SERVICE_DESIRED_COUNT, UNHEALTHY_THRESHOLD, container_name,
    task_family,
};
use ecs_deploy_common::tags::task_definition_tags;
use ecs_deploy_common::{
    DeploymentManifest, ListenerId, LoadBalancerId, LogGroupName, RuleId, TargetGroupId,
    TaskDefinitionId, ZoneId,
};
use std::collections::BTreeMap;
use std::fmt;

/// What one deployment run creates, fixed before the first call
#[derive(Clone)]
pub struct DeploymentPlan {
    pub project: String,
    pub region: String,
    pub cluster: String,
    pub log_group: LogGroupName,
    pub load_balancer: LoadBalancerId,
    pub load_balancer_dns_name: String,
    pub domain_name: String,
    pub dns_zone: ZoneId,
    pub dns_api_token: String,
    pub target_group: TargetGroupSpec,
    pub task_definition: TaskDefinitionSpec,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
}

impl fmt::Debug for DeploymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentPlan")
            .field("project", &self.project)
            .field("region", &self.region)
            .field("cluster", &self.cluster)
            .field("domain_name", &self.domain_name)
            .field("target_group", &self.target_group)
            .field("task_definition", &self.task_definition)
            .finish_non_exhaustive()
    }
}

impl DeploymentPlan {
    pub fn from_config(config: &DeployConfig) -> Self {
        let project = config.project_name.clone();

        let target_group = TargetGroupSpec {
            name: project.clone(),
            vpc_id: config.vpc_id.clone(),
            port: HTTPS_PORT,
            health_check: TargetHealthCheck {
                path: HEALTH_CHECK_PATH.to_string(),
                interval_secs: HEALTH_CHECK_INTERVAL_SECS,
                timeout_secs: HEALTH_CHECK_TIMEOUT_SECS,
                healthy_threshold: HEALTHY_THRESHOLD,
                unhealthy_threshold: UNHEALTHY_THRESHOLD,
                matcher: HEALTH_CHECK_MATCHER.to_string(),
            },
        };

        let log_options = BTreeMap::from([
            ("awslogs-group".to_string(), config.log_group.to_string()),
            ("awslogs-region".to_string(), config.region.clone()),
            (
                "awslogs-stream-prefix".to_string(),
                LOG_STREAM_PREFIX.to_string(),
            ),
        ]);

        let task_definition = TaskDefinitionSpec {
            family: task_family(&project),
            container: ContainerSpec {
                name: container_name(&project),
                image: config.image(),
                cpu: 0,
                ports: vec![HTTPS_PORT],
                essential: true,
                logging: Some(ContainerLogging {
                    driver: "awslogs".to_string(),
                    options: log_options,
                }),
                health_check: Some(ContainerHealthCheck {
                    command: vec![
                        "CMD-SHELL".to_string(),
                        CONTAINER_HEALTH_COMMAND.to_string(),
                    ],
                    interval_secs: Some(CONTAINER_HEALTH_INTERVAL_SECS),
                    timeout_secs: Some(CONTAINER_HEALTH_TIMEOUT_SECS),
                    retries: Some(CONTAINER_HEALTH_RETRIES),
                    start_period_secs: Some(CONTAINER_HEALTH_START_PERIOD_SECS),
                }),
            },
            task_role_arn: Some(config.task_role_arn.clone()),
            execution_role_arn: Some(config.execution_role_arn.clone()),
            size: config.task_size,
            tags: task_definition_tags(&project),
        };

        Self {
            region: config.region.clone(),
            cluster: config.cluster.clone(),
            log_group: config.log_group.clone(),
            load_balancer: config.load_balancer.clone(),
            load_balancer_dns_name: config.load_balancer_dns_name.clone(),
            domain_name: config.domain_name.clone(),
            dns_zone: config.dns_zone.clone(),
            dns_api_token: config.dns_api_token.clone(),
            subnets: config.subnets.clone(),
            security_groups: config.security_groups.clone(),
            target_group,
            task_definition,
            project,
        }
    }

    /// Service bound to a registered task definition and target group
    pub fn service_spec(
        &self,
        task_definition: &TaskDefinitionId,
        target_group: &TargetGroupId,
    ) -> ServiceSpec {
        ServiceSpec {
            cluster: self.cluster.clone(),
            name: self.project.clone(),
            task_definition: task_definition.clone(),
            target_group: target_group.clone(),
            container_name: self.task_definition.container.name.clone(),
            container_port: HTTPS_PORT,
            desired_count: SERVICE_DESIRED_COUNT,
            subnets: self.subnets.clone(),
            security_groups: self.security_groups.clone(),
            enable_execute_command: true,
        }
    }

    /// Manifest recording the resources of a completed run
    pub fn manifest(
        &self,
        task_definition: TaskDefinitionId,
        target_group: TargetGroupId,
        listener: ListenerId,
        rules: Vec<RuleId>,
        created_at: DateTime<Utc>,
    ) -> DeploymentManifest {
        DeploymentManifest {
            ecs_cluster: self.cluster.clone(),
            service_name: self.project.clone(),
            task_definition,
            target_group,
            listener: Some(listener),
            rules,
            domain_name: self.domain_name.clone(),
            dns_api_token: self.dns_api_token.clone(),
            dns_zone: self.dns_zone.clone(),
            load_balancer_dns_name: Some(self.load_balancer_dns_name.clone()),
            region: Some(self.region.clone()),
            created_at: Some(created_at),
        }
    }
}
