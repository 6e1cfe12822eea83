//! Resource provisioners
//!
//! Each provisioner wraps one create call (plus its existence check or
//! follow-up call), logs the outcome, and returns the created identifier.
//! Follow-up calls that only decorate a resource (retention, stickiness,
//! tags) log a warning on failure and never unwind the resource.

use super::error::{DeployError, ProvisionError};
use super::priority::next_priority;
use crate::aws::ecs::{ServiceSpec, TaskDefinitionSpec};
use crate::aws::elb::{RuleSpec, TargetGroupSpec};
use crate::aws::{AwsError, EcsOperations, ElbOperations, LogsOperations};
use crate::dns::{DnsError, DnsOperations};
use ecs_deploy_common::defaults::{HTTPS_PORT, LOG_RETENTION_DAYS, STICKINESS_DURATION_SECS};
use ecs_deploy_common::tags::TAG_NAME;
use ecs_deploy_common::{
    DnsRecordId, ListenerId, LoadBalancerId, LogGroupName, ResourceKind, RuleId, ServiceId,
    TargetGroupId, TaskDefinitionId, ZoneId,
};
use tracing::{error, info, warn};

/// Log an AWS failure for `resource` and wrap it
fn failed(resource: ResourceKind) -> impl FnOnce(AwsError) -> ProvisionError {
    move |source| {
        match source.suggestion() {
            Some(hint) => error!(resource = %resource, error = %source, hint, "Provisioning failed"),
            None => error!(resource = %resource, error = %source, "Provisioning failed"),
        }
        ProvisionError::Aws { resource, source }
    }
}

/// Target group attributes enabling load-balancer cookie stickiness
pub fn stickiness_attributes() -> Vec<(String, String)> {
    vec![
        ("stickiness.enabled".to_string(), "true".to_string()),
        (
            "stickiness.lb_cookie.duration_seconds".to_string(),
            STICKINESS_DURATION_SECS.to_string(),
        ),
    ]
}

/// Make sure the log group exists, creating it with a retention policy if not.
///
/// Idempotent: an existing group is left untouched.
pub async fn ensure_log_group<L: LogsOperations>(
    logs: &L,
    name: &LogGroupName,
) -> Result<LogGroupName, ProvisionError> {
    let existing = logs
        .list_log_groups(name.as_str())
        .await
        .map_err(failed(ResourceKind::LogGroup))?;

    if existing.iter().any(|g| g == name.as_str()) {
        info!(log_group = %name, "Log group already exists");
        return Ok(name.clone());
    }

    logs.create_log_group(name.as_str())
        .await
        .map_err(failed(ResourceKind::LogGroup))?;
    info!(log_group = %name, "Log group created");

    match logs.put_retention_policy(name.as_str(), LOG_RETENTION_DAYS).await {
        Ok(()) => info!(log_group = %name, days = LOG_RETENTION_DAYS, "Retention policy set"),
        Err(e) => warn!(log_group = %name, error = %e, "Failed to set retention policy"),
    }

    Ok(name.clone())
}

/// Create the target group and enable stickiness on it
pub async fn create_target_group<E: ElbOperations>(
    elb: &E,
    spec: &TargetGroupSpec,
) -> Result<TargetGroupId, ProvisionError> {
    let target_group = elb
        .create_target_group(spec)
        .await
        .map_err(failed(ResourceKind::TargetGroup))?;
    info!(name = %spec.name, target_group = %target_group, "Target group created");

    match elb
        .modify_target_group_attributes(&target_group, stickiness_attributes())
        .await
    {
        Ok(()) => info!(
            target_group = %target_group,
            duration_secs = STICKINESS_DURATION_SECS,
            "Stickiness enabled"
        ),
        Err(e) => warn!(
            target_group = %target_group,
            error = %e,
            "Failed to enable stickiness, target group kept without it"
        ),
    }

    Ok(target_group)
}

/// Find the load balancer's HTTPS listener
pub async fn resolve_https_listener<E: ElbOperations>(
    elb: &E,
    load_balancer: &LoadBalancerId,
) -> Result<ListenerId, DeployError> {
    let listeners = elb
        .describe_listeners(load_balancer)
        .await
        .map_err(|source| DeployError::ListenerLookup {
            load_balancer: load_balancer.clone(),
            source,
        })?;

    let listener = listeners
        .into_iter()
        .find(|l| l.port == Some(HTTPS_PORT))
        .map(|l| l.id)
        .ok_or_else(|| DeployError::ListenerNotFound(load_balancer.clone()))?;

    info!(load_balancer = %load_balancer, listener = %listener, "HTTPS listener resolved");
    Ok(listener)
}

/// Create a host-header rule forwarding `domain` to the target group.
///
/// Returns the new rule; the caller records it.
pub async fn create_rule<E: ElbOperations>(
    elb: &E,
    listener: &ListenerId,
    target_group: &TargetGroupId,
    domain: &str,
) -> Result<RuleId, ProvisionError> {
    let priority = next_priority(elb, listener).await;
    let spec = RuleSpec {
        listener: listener.clone(),
        target_group: target_group.clone(),
        host: domain.to_string(),
        priority,
    };

    let rule = elb
        .create_rule(&spec)
        .await
        .map_err(failed(ResourceKind::ListenerRule))?;
    info!(rule = %rule, priority, host = %domain, "Listener rule created");

    if let Err(e) = elb
        .add_tags(
            rule.as_str(),
            vec![(TAG_NAME.to_string(), domain.to_string())],
        )
        .await
    {
        warn!(rule = %rule, error = %e, "Failed to tag listener rule");
    }

    Ok(rule)
}

/// Register the task definition
pub async fn register_task_definition<C: EcsOperations>(
    ecs: &C,
    spec: &TaskDefinitionSpec,
) -> Result<TaskDefinitionId, ProvisionError> {
    let task_definition = ecs
        .register_task_definition(spec)
        .await
        .map_err(failed(ResourceKind::TaskDefinition))?;
    info!(
        task_definition = %task_definition,
        image = %spec.container.image,
        size = %spec.size,
        "Task definition registered"
    );
    Ok(task_definition)
}

/// Create the service
pub async fn create_service<C: EcsOperations>(
    ecs: &C,
    spec: &ServiceSpec,
) -> Result<ServiceId, ProvisionError> {
    let service = ecs
        .create_service(spec)
        .await
        .map_err(failed(ResourceKind::Service))?;
    info!(cluster = %spec.cluster, service = %spec.name, "Service created");
    Ok(service)
}

/// Point `domain` at the load balancer with a CNAME record
pub async fn create_dns_record<D: DnsOperations>(
    dns: &D,
    zone: &ZoneId,
    domain: &str,
    target: &str,
) -> Result<DnsRecordId, ProvisionError> {
    let record = dns
        .create_cname(zone, domain, target)
        .await
        .map_err(|e: DnsError| {
            error!(domain = %domain, error = %e, "Failed to create CNAME record");
            ProvisionError::Dns(e)
        })?;
    info!(domain = %domain, target = %target, record = %record, "CNAME record created");
    Ok(record)
}
