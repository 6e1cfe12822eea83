//! In-memory cloud for end-to-end tests
//!
//! [`FakeCloud`] implements every operation trait against shared state, so a
//! deploy followed by a rollback can be checked by counting what is left.
//! It enforces the constraints the real services do where the orchestrators
//! depend on them: unique target group names and rule priorities, default
//! rules that cannot be deleted, and target groups that cannot be deleted
//! while a rule still forwards to them.

use crate::aws::ecs::{ServiceSpec, TaskDefinitionInfo, TaskDefinitionSpec};
use crate::aws::elb::{ListenerInfo, RuleInfo, RuleSpec, TargetGroupSpec};
use crate::aws::{AwsError, EcsOperations, ElbOperations, LogsOperations};
use crate::dns::{DnsError, DnsOperations};
use ecs_deploy_common::{
    DnsRecordId, ListenerId, LoadBalancerId, RuleId, ServiceId, TargetGroupId, TaskDefinitionId,
    ZoneId,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

pub const HTTPS_LISTENER: &str = "arn:fake:listener/https";
pub const HTTP_LISTENER: &str = "arn:fake:listener/http";

#[derive(Debug, Clone)]
struct FakeRule {
    listener: ListenerId,
    target_group: Option<TargetGroupId>,
    priority: String,
    is_default: bool,
}

#[derive(Debug, Clone)]
struct FakeTaskDefinition {
    info: TaskDefinitionInfo,
    active: bool,
}

#[derive(Debug, Default)]
struct State {
    log_groups: BTreeMap<String, Option<i32>>,
    target_groups: BTreeMap<TargetGroupId, String>,
    target_group_attributes: BTreeMap<TargetGroupId, Vec<(String, String)>>,
    listeners: Vec<ListenerInfo>,
    rules: BTreeMap<RuleId, FakeRule>,
    tags: BTreeMap<String, Vec<(String, String)>>,
    task_definitions: Vec<FakeTaskDefinition>,
    services: BTreeMap<(String, String), TaskDefinitionId>,
    records: BTreeMap<DnsRecordId, (String, String)>,
    failures: HashSet<String>,
    mutations: usize,
    next_id: usize,
}

impl State {
    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, operation: &str) -> Result<(), AwsError> {
        if self.failures.contains(operation) {
            return Err(AwsError::Sdk {
                code: Some("InjectedFailure".to_string()),
                message: format!("injected failure in {operation}"),
            });
        }
        Ok(())
    }
}

fn not_found(code: &str, what: impl std::fmt::Display) -> AwsError {
    AwsError::NotFound {
        code: code.to_string(),
        message: format!("{what} not found"),
    }
}

/// Shared in-memory stand-in for CloudWatch Logs, ELBv2, ECS, and the DNS provider
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct FakeCloud {
    state: Arc<Mutex<State>>,
}

impl FakeCloud {
    /// A load balancer with an HTTP listener and an HTTPS listener on 443,
    /// each carrying its default rule
    pub fn with_https_listener() -> Self {
        let cloud = Self::default();
        {
            let mut state = cloud.state();
            for (arn, port) in [(HTTP_LISTENER, 80), (HTTPS_LISTENER, 443)] {
                let id = ListenerId::new(arn);
                state.listeners.push(ListenerInfo {
                    id: id.clone(),
                    port: Some(port),
                });
                state.rules.insert(
                    RuleId::new(format!("{arn}/rule/default")),
                    FakeRule {
                        listener: id,
                        target_group: None,
                        priority: "default".to_string(),
                        is_default: true,
                    },
                );
            }
        }
        cloud
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make every later call of `operation` fail
    pub fn fail_on(&self, operation: &str) {
        self.state().failures.insert(operation.to_string());
    }

    /// The HTTPS listener's default rule, adding it if absent
    pub fn default_rule(&self) -> RuleId {
        let id = RuleId::new(format!("{HTTPS_LISTENER}/rule/default"));
        let mut state = self.state();
        state.rules.entry(id.clone()).or_insert_with(|| FakeRule {
            listener: ListenerId::new(HTTPS_LISTENER),
            target_group: None,
            priority: "default".to_string(),
            is_default: true,
        });
        id
    }

    /// Add a numbered rule to the HTTPS listener, as another deployment would
    pub fn seed_rule(&self) -> RuleId {
        let mut state = self.state();
        let n = state.next_id();
        let id = RuleId::new(format!("{HTTPS_LISTENER}/rule/{n}"));
        state.rules.insert(
            id.clone(),
            FakeRule {
                listener: ListenerId::new(HTTPS_LISTENER),
                target_group: None,
                priority: (10 + n).to_string(),
                is_default: false,
            },
        );
        id
    }

    /// Count of successful mutating calls
    pub fn mutation_count(&self) -> usize {
        self.state().mutations
    }

    pub fn log_group_count(&self) -> usize {
        self.state().log_groups.len()
    }

    pub fn log_group_retention(&self, name: &str) -> Option<i32> {
        self.state().log_groups.get(name).copied().flatten()
    }

    pub fn target_group_count(&self) -> usize {
        self.state().target_groups.len()
    }

    pub fn target_group_attributes(&self, id: &TargetGroupId) -> Vec<(String, String)> {
        self.state()
            .target_group_attributes
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rules other than listener defaults
    pub fn rule_count(&self) -> usize {
        self.state().rules.values().filter(|r| !r.is_default).count()
    }

    pub fn tags_of(&self, arn: &str) -> Vec<(String, String)> {
        self.state().tags.get(arn).cloned().unwrap_or_default()
    }

    /// Every revision ever registered, active or not
    pub fn task_definition_count(&self) -> usize {
        self.state().task_definitions.len()
    }

    pub fn active_task_definition_count(&self) -> usize {
        self.state()
            .task_definitions
            .iter()
            .filter(|t| t.active)
            .count()
    }

    pub fn service_count(&self) -> usize {
        self.state().services.len()
    }

    pub fn service_task_definition(&self, cluster: &str, service: &str) -> Option<TaskDefinitionId> {
        self.state()
            .services
            .get(&(cluster.to_string(), service.to_string()))
            .cloned()
    }

    pub fn has_cname(&self, name: &str) -> bool {
        self.state().records.values().any(|(n, _)| n == name)
    }
}

impl LogsOperations for FakeCloud {
    async fn list_log_groups(&self, prefix: &str) -> Result<Vec<String>, AwsError> {
        let state = self.state();
        state.check("list_log_groups")?;
        Ok(state
            .log_groups
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn create_log_group(&self, name: &str) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("create_log_group")?;
        if state.log_groups.contains_key(name) {
            return Err(AwsError::AlreadyExists {
                code: "ResourceAlreadyExistsException".to_string(),
                message: format!("log group {name} already exists"),
            });
        }
        state.log_groups.insert(name.to_string(), None);
        state.mutations += 1;
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("put_retention_policy")?;
        let retention = state
            .log_groups
            .get_mut(name)
            .ok_or_else(|| not_found("ResourceNotFoundException", name))?;
        *retention = Some(days);
        state.mutations += 1;
        Ok(())
    }
}

impl ElbOperations for FakeCloud {
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<TargetGroupId, AwsError> {
        let mut state = self.state();
        state.check("create_target_group")?;
        if state.target_groups.values().any(|name| *name == spec.name) {
            return Err(AwsError::AlreadyExists {
                code: "DuplicateTargetGroupName".to_string(),
                message: format!("target group {} already exists", spec.name),
            });
        }
        let n = state.next_id();
        let id = TargetGroupId::new(format!("arn:fake:targetgroup/{}/{n}", spec.name));
        state.target_groups.insert(id.clone(), spec.name.clone());
        state.mutations += 1;
        Ok(id)
    }

    async fn modify_target_group_attributes(
        &self,
        target_group: &TargetGroupId,
        attributes: Vec<(String, String)>,
    ) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("modify_target_group_attributes")?;
        if !state.target_groups.contains_key(target_group) {
            return Err(not_found("TargetGroupNotFound", target_group));
        }
        state
            .target_group_attributes
            .entry(target_group.clone())
            .or_default()
            .extend(attributes);
        state.mutations += 1;
        Ok(())
    }

    async fn delete_target_group(&self, target_group: &TargetGroupId) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("delete_target_group")?;
        if !state.target_groups.contains_key(target_group) {
            return Err(not_found("TargetGroupNotFound", target_group));
        }
        if state
            .rules
            .values()
            .any(|r| r.target_group.as_ref() == Some(target_group))
        {
            return Err(AwsError::Sdk {
                code: Some("ResourceInUse".to_string()),
                message: format!("target group {target_group} is in use by a listener rule"),
            });
        }
        state.target_groups.remove(target_group);
        state.target_group_attributes.remove(target_group);
        state.mutations += 1;
        Ok(())
    }

    async fn describe_listeners(
        &self,
        _load_balancer: &LoadBalancerId,
    ) -> Result<Vec<ListenerInfo>, AwsError> {
        let state = self.state();
        state.check("describe_listeners")?;
        Ok(state.listeners.clone())
    }

    async fn describe_rules(&self, listener: &ListenerId) -> Result<Vec<RuleInfo>, AwsError> {
        let state = self.state();
        state.check("describe_rules")?;
        Ok(state
            .rules
            .iter()
            .filter(|(_, r)| r.listener == *listener)
            .map(|(id, r)| RuleInfo {
                id: id.clone(),
                priority: r.priority.clone(),
                is_default: r.is_default,
            })
            .collect())
    }

    async fn create_rule(&self, spec: &RuleSpec) -> Result<RuleId, AwsError> {
        let mut state = self.state();
        state.check("create_rule")?;
        if !state.listeners.iter().any(|l| l.id == spec.listener) {
            return Err(not_found("ListenerNotFound", &spec.listener));
        }
        let priority = spec.priority.to_string();
        if state
            .rules
            .values()
            .any(|r| r.listener == spec.listener && r.priority == priority)
        {
            return Err(AwsError::Sdk {
                code: Some("PriorityInUse".to_string()),
                message: format!("priority {priority} is in use"),
            });
        }
        let n = state.next_id();
        let id = RuleId::new(format!("{}/rule/{n}", spec.listener));
        state.rules.insert(
            id.clone(),
            FakeRule {
                listener: spec.listener.clone(),
                target_group: Some(spec.target_group.clone()),
                priority,
                is_default: false,
            },
        );
        state.mutations += 1;
        Ok(id)
    }

    async fn add_tags(
        &self,
        resource_arn: &str,
        tags: Vec<(String, String)>,
    ) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("add_tags")?;
        state
            .tags
            .entry(resource_arn.to_string())
            .or_default()
            .extend(tags);
        state.mutations += 1;
        Ok(())
    }

    async fn delete_rule(&self, rule: &RuleId) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("delete_rule")?;
        let is_default = state
            .rules
            .get(rule)
            .map(|r| r.is_default)
            .ok_or_else(|| not_found("RuleNotFound", rule))?;
        if is_default {
            return Err(AwsError::NotPermitted {
                message: "Default rules cannot be deleted".to_string(),
            });
        }
        state.rules.remove(rule);
        state.tags.remove(rule.as_str());
        state.mutations += 1;
        Ok(())
    }
}

impl EcsOperations for FakeCloud {
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<TaskDefinitionId, AwsError> {
        let mut state = self.state();
        state.check("register_task_definition")?;
        let revision = state
            .task_definitions
            .iter()
            .filter(|t| t.info.family == spec.family)
            .count()
            + 1;
        let id = TaskDefinitionId::new(format!(
            "arn:fake:task-definition/{}:{revision}",
            spec.family
        ));
        state.task_definitions.push(FakeTaskDefinition {
            info: TaskDefinitionInfo {
                id: id.clone(),
                family: spec.family.clone(),
                cpu: Some(spec.size.cpu_str()),
                memory: Some(spec.size.memory_str()),
                containers: vec![spec.container.clone()],
                task_role_arn: spec.task_role_arn.clone(),
                execution_role_arn: spec.execution_role_arn.clone(),
            },
            active: true,
        });
        state.mutations += 1;
        Ok(id)
    }

    async fn describe_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<TaskDefinitionInfo, AwsError> {
        let state = self.state();
        state.check("describe_task_definition")?;
        state
            .task_definitions
            .iter()
            .find(|t| t.info.id == *task_definition)
            .map(|t| t.info.clone())
            .ok_or_else(|| not_found("ResourceNotFoundException", task_definition))
    }

    async fn list_task_definitions(
        &self,
        family: &str,
    ) -> Result<Vec<TaskDefinitionId>, AwsError> {
        let state = self.state();
        state.check("list_task_definitions")?;
        Ok(state
            .task_definitions
            .iter()
            .filter(|t| t.active && t.info.family == family)
            .map(|t| t.info.id.clone())
            .collect())
    }

    async fn deregister_task_definition(
        &self,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("deregister_task_definition")?;
        let entry = state
            .task_definitions
            .iter_mut()
            .find(|t| t.active && t.info.id == *task_definition)
            .ok_or_else(|| not_found("ResourceNotFoundException", task_definition))?;
        entry.active = false;
        state.mutations += 1;
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceId, AwsError> {
        let mut state = self.state();
        state.check("create_service")?;
        let key = (spec.cluster.clone(), spec.name.clone());
        if state.services.contains_key(&key) {
            return Err(AwsError::Sdk {
                code: Some("InvalidParameterException".to_string()),
                message: "Creation of service was not idempotent".to_string(),
            });
        }
        if !state
            .task_definitions
            .iter()
            .any(|t| t.active && t.info.id == spec.task_definition)
        {
            return Err(AwsError::Sdk {
                code: Some("ClientException".to_string()),
                message: format!("task definition {} is not active", spec.task_definition),
            });
        }
        state.services.insert(key, spec.task_definition.clone());
        state.mutations += 1;
        Ok(ServiceId::new(format!(
            "arn:fake:service/{}/{}",
            spec.cluster, spec.name
        )))
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionId,
    ) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("update_service")?;
        let current = state
            .services
            .get_mut(&(cluster.to_string(), service.to_string()))
            .ok_or_else(|| not_found("ServiceNotFoundException", service))?;
        *current = task_definition.clone();
        state.mutations += 1;
        Ok(())
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), AwsError> {
        let mut state = self.state();
        state.check("delete_service")?;
        state
            .services
            .remove(&(cluster.to_string(), service.to_string()))
            .ok_or_else(|| not_found("ServiceNotFoundException", service))?;
        state.mutations += 1;
        Ok(())
    }
}

impl DnsOperations for FakeCloud {
    async fn create_cname(
        &self,
        _zone: &ZoneId,
        name: &str,
        target: &str,
    ) -> Result<DnsRecordId, DnsError> {
        let mut state = self.state();
        if state.failures.contains("create_cname") {
            return Err(DnsError::Rejected("injected failure in create_cname".to_string()));
        }
        let n = state.next_id();
        let id = DnsRecordId::new(format!("record-{n}"));
        state
            .records
            .insert(id.clone(), (name.to_string(), target.to_string()));
        state.mutations += 1;
        Ok(id)
    }

    async fn find_cname(&self, _zone: &ZoneId, name: &str) -> Result<Vec<DnsRecordId>, DnsError> {
        let state = self.state();
        if state.failures.contains("find_cname") {
            return Err(DnsError::Rejected("injected failure in find_cname".to_string()));
        }
        Ok(state
            .records
            .iter()
            .filter(|(_, (n, _))| n == name)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_record(&self, _zone: &ZoneId, record: &DnsRecordId) -> Result<(), DnsError> {
        let mut state = self.state();
        if state.failures.contains("delete_record") {
            return Err(DnsError::Rejected("injected failure in delete_record".to_string()));
        }
        if state.records.remove(record).is_none() {
            return Err(DnsError::Status {
                status: 404,
                message: format!("record {record} not found"),
            });
        }
        state.mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::provision::{create_rule, create_target_group, ensure_log_group};
    use crate::deploy::provision::stickiness_attributes;
    use crate::aws::elb::TargetHealthCheck;
    use ecs_deploy_common::LogGroupName;

    #[tokio::test]
    async fn test_log_group_creation_is_idempotent() {
        let cloud = FakeCloud::default();
        let name = LogGroupName::new("/ecs/container-logs");

        ensure_log_group(&cloud, &name).await.unwrap();
        let after_first = cloud.mutation_count();
        assert_eq!(cloud.log_group_retention("/ecs/container-logs"), Some(7));

        ensure_log_group(&cloud, &name).await.unwrap();
        assert_eq!(cloud.mutation_count(), after_first);
        assert_eq!(cloud.log_group_count(), 1);
    }

    #[tokio::test]
    async fn test_rules_get_increasing_priorities() {
        let cloud = FakeCloud::with_https_listener();
        let spec = TargetGroupSpec {
            name: "demo".to_string(),
            vpc_id: "vpc-1".to_string(),
            port: 443,
            health_check: TargetHealthCheck {
                path: "/hc".to_string(),
                interval_secs: 30,
                timeout_secs: 5,
                healthy_threshold: 3,
                unhealthy_threshold: 3,
                matcher: "200-499".to_string(),
            },
        };
        let tg = create_target_group(&cloud, &spec).await.unwrap();
        assert_eq!(cloud.target_group_attributes(&tg), stickiness_attributes());

        let listener = ListenerId::new(HTTPS_LISTENER);
        let first = create_rule(&cloud, &listener, &tg, "a.example.com").await.unwrap();
        let second = create_rule(&cloud, &listener, &tg, "b.example.com").await.unwrap();

        let priorities: Vec<String> = cloud
            .describe_rules(&listener)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.id == first || r.id == second)
            .map(|r| r.priority)
            .collect();
        assert_eq!(priorities.len(), 2);
        assert!(priorities.contains(&"100".to_string()));
        assert!(priorities.contains(&"101".to_string()));
        assert_eq!(
            cloud.tags_of(first.as_str()),
            vec![("Name".to_string(), "a.example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_target_group_in_use_cannot_be_deleted() {
        let cloud = FakeCloud::with_https_listener();
        let spec = TargetGroupSpec {
            name: "demo".to_string(),
            vpc_id: "vpc-1".to_string(),
            port: 443,
            health_check: TargetHealthCheck {
                path: "/hc".to_string(),
                interval_secs: 30,
                timeout_secs: 5,
                healthy_threshold: 3,
                unhealthy_threshold: 3,
                matcher: "200-499".to_string(),
            },
        };
        let tg = create_target_group(&cloud, &spec).await.unwrap();
        let rule = create_rule(&cloud, &ListenerId::new(HTTPS_LISTENER), &tg, "demo.example.com")
            .await
            .unwrap();

        assert!(cloud.delete_target_group(&tg).await.is_err());
        cloud.delete_rule(&rule).await.unwrap();
        cloud.delete_target_group(&tg).await.unwrap();
        assert_eq!(cloud.target_group_count(), 0);
    }
}
