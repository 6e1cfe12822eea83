//! Application load balancer operations
//!
//! Target groups, listeners, and host-header listener rules.

use super::context::{AwsContext, FromAwsContext};
use super::error::{AwsError, classify_sdk_error};
use aws_sdk_elasticloadbalancingv2::types::{
    Action, ActionTypeEnum, HostHeaderConditionConfig, Matcher, ProtocolEnum, RuleCondition, Tag,
    TargetGroupAttribute, TargetTypeEnum,
};
use ecs_deploy_common::{ListenerId, LoadBalancerId, RuleId, TargetGroupId};
use tracing::debug;

/// Target group health check settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHealthCheck {
    pub path: String,
    pub interval_secs: i32,
    pub timeout_secs: i32,
    pub healthy_threshold: i32,
    pub unhealthy_threshold: i32,
    /// HTTP codes treated as healthy (e.g. "200-499")
    pub matcher: String,
}

/// Parameters for creating an HTTPS, IP-target target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupSpec {
    pub name: String,
    pub vpc_id: String,
    pub port: i32,
    pub health_check: TargetHealthCheck,
}

/// Parameters for a host-header rule forwarding to a target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub listener: ListenerId,
    pub target_group: TargetGroupId,
    pub host: String,
    pub priority: u32,
}

/// A listener as described by the load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub port: Option<i32>,
}

/// A listener rule as described by the load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: RuleId,
    /// Numeric string, or "default" for the listener's default rule
    pub priority: String,
    pub is_default: bool,
}

/// Trait for load balancer operations that can be mocked in tests.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait ElbOperations: Send + Sync {
    /// Create a target group
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<TargetGroupId, AwsError>;

    /// Set target group attributes (key/value pairs)
    async fn modify_target_group_attributes(
        &self,
        target_group: &TargetGroupId,
        attributes: Vec<(String, String)>,
    ) -> Result<(), AwsError>;

    /// Delete a target group
    async fn delete_target_group(&self, target_group: &TargetGroupId) -> Result<(), AwsError>;

    /// List the listeners of a load balancer
    async fn describe_listeners(
        &self,
        load_balancer: &LoadBalancerId,
    ) -> Result<Vec<ListenerInfo>, AwsError>;

    /// List the rules of a listener, including the default rule
    async fn describe_rules(&self, listener: &ListenerId) -> Result<Vec<RuleInfo>, AwsError>;

    /// Create a listener rule
    async fn create_rule(&self, spec: &RuleSpec) -> Result<RuleId, AwsError>;

    /// Tag a load balancer resource by ARN
    async fn add_tags(
        &self,
        resource_arn: &str,
        tags: Vec<(String, String)>,
    ) -> Result<(), AwsError>;

    /// Delete a listener rule
    async fn delete_rule(&self, rule: &RuleId) -> Result<(), AwsError>;
}

/// ELBv2 client wrapper
pub struct ElbClient {
    client: aws_sdk_elasticloadbalancingv2::Client,
}

impl FromAwsContext for ElbClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.elb_client(),
        }
    }
}

impl ElbOperations for ElbClient {
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<TargetGroupId, AwsError> {
        let hc = &spec.health_check;
        let response = self
            .client
            .create_target_group()
            .name(&spec.name)
            .protocol(ProtocolEnum::Https)
            .port(spec.port)
            .vpc_id(&spec.vpc_id)
            .target_type(TargetTypeEnum::Ip)
            .health_check_protocol(ProtocolEnum::Https)
            .health_check_port("traffic-port")
            .health_check_path(&hc.path)
            .health_check_interval_seconds(hc.interval_secs)
            .health_check_timeout_seconds(hc.timeout_secs)
            .healthy_threshold_count(hc.healthy_threshold)
            .unhealthy_threshold_count(hc.unhealthy_threshold)
            .matcher(Matcher::builder().http_code(&hc.matcher).build())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        response
            .target_groups()
            .first()
            .and_then(|tg| tg.target_group_arn())
            .map(TargetGroupId::from)
            .ok_or(AwsError::MalformedResponse("a target group ARN"))
    }

    async fn modify_target_group_attributes(
        &self,
        target_group: &TargetGroupId,
        attributes: Vec<(String, String)>,
    ) -> Result<(), AwsError> {
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| TargetGroupAttribute::builder().key(key).value(value).build())
            .collect();

        self.client
            .modify_target_group_attributes()
            .target_group_arn(target_group.as_str())
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_target_group(&self, target_group: &TargetGroupId) -> Result<(), AwsError> {
        self.client
            .delete_target_group()
            .target_group_arn(target_group.as_str())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn describe_listeners(
        &self,
        load_balancer: &LoadBalancerId,
    ) -> Result<Vec<ListenerInfo>, AwsError> {
        let mut listeners = Vec::new();
        let mut marker = None;

        loop {
            let page = self
                .client
                .describe_listeners()
                .load_balancer_arn(load_balancer.as_str())
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            listeners.extend(page.listeners().iter().filter_map(|l| {
                l.listener_arn().map(|arn| ListenerInfo {
                    id: ListenerId::from(arn),
                    port: l.port(),
                })
            }));

            marker = page.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        debug!(load_balancer = %load_balancer, count = listeners.len(), "Described listeners");
        Ok(listeners)
    }

    async fn describe_rules(&self, listener: &ListenerId) -> Result<Vec<RuleInfo>, AwsError> {
        let mut rules = Vec::new();
        let mut marker = None;

        loop {
            let page = self
                .client
                .describe_rules()
                .listener_arn(listener.as_str())
                .set_marker(marker)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            rules.extend(page.rules().iter().filter_map(|r| {
                r.rule_arn().map(|arn| RuleInfo {
                    id: RuleId::from(arn),
                    priority: r.priority().unwrap_or_default().to_string(),
                    is_default: r.is_default().unwrap_or(false),
                })
            }));

            marker = page.next_marker().map(str::to_string);
            if marker.is_none() {
                break;
            }
        }

        debug!(listener = %listener, count = rules.len(), "Described rules");
        Ok(rules)
    }

    async fn create_rule(&self, spec: &RuleSpec) -> Result<RuleId, AwsError> {
        let priority = i32::try_from(spec.priority)
            .map_err(|_| AwsError::InvalidRequest(format!("priority {} out of range", spec.priority)))?;

        let condition = RuleCondition::builder()
            .field("host-header")
            .host_header_config(
                HostHeaderConditionConfig::builder()
                    .values(&spec.host)
                    .build(),
            )
            .build();

        let action = Action::builder()
            .r#type(ActionTypeEnum::Forward)
            .target_group_arn(spec.target_group.as_str())
            .build();

        let response = self
            .client
            .create_rule()
            .listener_arn(spec.listener.as_str())
            .conditions(condition)
            .actions(action)
            .priority(priority)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        response
            .rules()
            .first()
            .and_then(|r| r.rule_arn())
            .map(RuleId::from)
            .ok_or(AwsError::MalformedResponse("a rule ARN"))
    }

    async fn add_tags(
        &self,
        resource_arn: &str,
        tags: Vec<(String, String)>,
    ) -> Result<(), AwsError> {
        let tags = tags
            .into_iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect::<Vec<_>>();

        self.client
            .add_tags()
            .resource_arns(resource_arn)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_rule(&self, rule: &RuleId) -> Result<(), AwsError> {
        self.client
            .delete_rule()
            .rule_arn(rule.as_str())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }
}
