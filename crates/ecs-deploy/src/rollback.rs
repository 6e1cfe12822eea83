//! Manifest-driven teardown
//!
//! Rollback reads nothing but the manifest. Every step is attempted even when
//! an earlier one fails, and each step's outcome lands in the returned
//! [`RollbackReport`] instead of aborting the run.

use crate::aws::{AwsError, EcsOperations, ElbOperations};
use crate::dns::DnsOperations;
use crate::report::{CleanupResult, RollbackReport, RollbackStep};
use anyhow::Context;
use ecs_deploy_common::{DeploymentManifest, ResourceKind};
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// Roll back the deployment recorded at `path`.
///
/// The manifest is loaded and validated first; `connect` builds the clients
/// from it only once it is known to be complete, so an unusable manifest
/// fails without touching anything.
pub async fn rollback_from_file<E, C, D, F, Fut>(
    path: &Path,
    connect: F,
) -> anyhow::Result<RollbackReport>
where
    E: ElbOperations,
    C: EcsOperations,
    D: DnsOperations,
    F: FnOnce(&DeploymentManifest) -> Fut,
    Fut: Future<Output = anyhow::Result<(E, C, D)>>,
{
    let manifest = DeploymentManifest::load(path)
        .with_context(|| format!("Unusable deployment manifest '{}'", path.display()))?;
    info!(manifest = %path.display(), "Loaded deployment manifest");

    let (elb, ecs, dns) = connect(&manifest).await?;
    Ok(rollback(&elb, &ecs, &dns, &manifest).await)
}

/// Delete everything `manifest` records, best effort.
///
/// The log group is shared across deployments and is left in place.
#[instrument(skip_all, fields(service = %manifest.service_name, cluster = %manifest.ecs_cluster))]
pub async fn rollback<E, C, D>(
    elb: &E,
    ecs: &C,
    dns: &D,
    manifest: &DeploymentManifest,
) -> RollbackReport
where
    E: ElbOperations,
    C: EcsOperations,
    D: DnsOperations,
{
    info!(rules = manifest.rules.len(), "Starting rollback");
    let mut report = RollbackReport::default();

    for kind in ResourceKind::rollback_order() {
        match kind {
            ResourceKind::Service => {
                let result = ecs
                    .delete_service(&manifest.ecs_cluster, &manifest.service_name)
                    .await;
                report
                    .steps
                    .push(aws_step(kind, manifest.service_name.clone(), result));
            }
            ResourceKind::TaskDefinition => {
                let result = ecs
                    .deregister_task_definition(&manifest.task_definition)
                    .await;
                report
                    .steps
                    .push(aws_step(kind, manifest.task_definition.to_string(), result));
            }
            ResourceKind::ListenerRule => {
                for rule in &manifest.rules {
                    let result = elb.delete_rule(rule).await;
                    report.steps.push(aws_step(kind, rule.to_string(), result));
                }
            }
            ResourceKind::TargetGroup => {
                let result = elb.delete_target_group(&manifest.target_group).await;
                report
                    .steps
                    .push(aws_step(kind, manifest.target_group.to_string(), result));
            }
            ResourceKind::DnsRecord => {
                report.steps.push(dns_step(dns, manifest).await);
            }
            ResourceKind::LogGroup => {}
        }
    }

    let failed = report.failed_count();
    if failed == 0 {
        info!("Rollback complete");
    } else {
        warn!(failed, "Rollback finished with failures");
    }
    report
}

/// Turn an AWS delete result into a report step, logging the outcome
fn aws_step(kind: ResourceKind, resource: String, result: Result<(), AwsError>) -> RollbackStep {
    let (result, detail) = match result {
        Ok(()) => {
            info!(resource_type = %kind, resource = %resource, "Deleted");
            (CleanupResult::Deleted, None)
        }
        Err(e) if e.is_not_found() => {
            info!(resource_type = %kind, resource = %resource, "Already deleted");
            (CleanupResult::AlreadyDeleted, Some(e.to_string()))
        }
        Err(e) if kind == ResourceKind::ListenerRule && e.is_not_permitted() => {
            warn!(rule = %resource, "Skipping default listener rule, it cannot be deleted");
            (CleanupResult::Skipped, Some("default rule".to_string()))
        }
        Err(e) => {
            error!(resource_type = %kind, resource = %resource, error = %e, "Failed to delete");
            (CleanupResult::Failed, Some(e.to_string()))
        }
    };

    RollbackStep {
        kind,
        resource,
        result,
        detail,
    }
}

/// Look up the domain's CNAME and delete the first match
async fn dns_step<D: DnsOperations>(dns: &D, manifest: &DeploymentManifest) -> RollbackStep {
    let kind = ResourceKind::DnsRecord;
    let domain = &manifest.domain_name;
    let step = |resource: String, result, detail: Option<String>| RollbackStep {
        kind,
        resource,
        result,
        detail,
    };

    let records = match dns.find_cname(&manifest.dns_zone, domain).await {
        Ok(records) => records,
        Err(e) => {
            error!(domain = %domain, error = %e, "Failed to look up CNAME record");
            return step(domain.clone(), CleanupResult::Failed, Some(e.to_string()));
        }
    };

    let Some(record) = records.first() else {
        warn!(domain = %domain, "No CNAME record found, nothing to delete");
        return step(
            domain.clone(),
            CleanupResult::Skipped,
            Some("no CNAME record found".to_string()),
        );
    };

    match dns.delete_record(&manifest.dns_zone, record).await {
        Ok(()) => {
            info!(domain = %domain, record = %record, "CNAME record deleted");
            step(domain.clone(), CleanupResult::Deleted, None)
        }
        Err(e) => {
            error!(domain = %domain, record = %record, error = %e, "Failed to delete CNAME record");
            step(domain.clone(), CleanupResult::Failed, Some(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{MockEcsOperations, MockElbOperations};
    use crate::dns::{DnsError, MockDnsOperations};
    use crate::testing::FakeCloud;
    use ecs_deploy_common::{DnsRecordId, RuleId};
    use ecs_deploy_test_utils::sample_manifest;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn not_found(code: &str) -> AwsError {
        AwsError::NotFound {
            code: code.to_string(),
            message: "gone".to_string(),
        }
    }

    fn happy_dns() -> MockDnsOperations {
        let mut dns = MockDnsOperations::new();
        dns.expect_find_cname()
            .returning(|_, _| Ok(vec![DnsRecordId::new("rec-1")]));
        dns.expect_delete_record().returning(|_, _| Ok(()));
        dns
    }

    #[tokio::test]
    async fn test_default_rule_is_skipped_and_others_deleted() {
        let cloud = FakeCloud::with_https_listener();
        let mut manifest = sample_manifest("demo");
        let default_rule = cloud.default_rule();
        let first = cloud.seed_rule();
        let second = cloud.seed_rule();
        manifest.rules = vec![first, default_rule, second];

        let report = rollback(&cloud, &cloud, &cloud, &manifest).await;

        let rule_steps: Vec<_> = report
            .steps
            .iter()
            .filter(|s| s.kind == ResourceKind::ListenerRule)
            .collect();
        assert_eq!(rule_steps.len(), 3, "every rule must be attempted");
        assert_eq!(
            rule_steps
                .iter()
                .filter(|s| s.result == CleanupResult::Skipped)
                .count(),
            1
        );
        assert_eq!(
            rule_steps
                .iter()
                .filter(|s| s.result == CleanupResult::Deleted)
                .count(),
            2
        );
        assert_eq!(report.failed_count(), 0);
        assert_eq!(cloud.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_steps() {
        let mut ecs = MockEcsOperations::new();
        ecs.expect_delete_service()
            .times(1)
            .returning(|_, _| Err(AwsError::Throttled));
        ecs.expect_deregister_task_definition()
            .times(1)
            .returning(|_| Err(AwsError::Timeout));

        let mut elb = MockElbOperations::new();
        elb.expect_delete_rule().times(1).returning(|_| Ok(()));
        elb.expect_delete_target_group()
            .times(1)
            .returning(|_| Ok(()));

        let dns = happy_dns();
        let mut manifest = sample_manifest("demo");
        manifest.rules = vec![RuleId::new("arn:rule/1")];

        let report = rollback(&elb, &ecs, &dns, &manifest).await;

        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.count(CleanupResult::Deleted), 3);
        assert_eq!(report.steps[0].kind, ResourceKind::Service);
        assert_eq!(report.steps[4].kind, ResourceKind::DnsRecord);
    }

    #[tokio::test]
    async fn test_missing_resources_count_as_already_deleted() {
        let mut ecs = MockEcsOperations::new();
        ecs.expect_delete_service()
            .returning(|_, _| Err(not_found("ServiceNotFoundException")));
        ecs.expect_deregister_task_definition().returning(|_| Ok(()));

        let mut elb = MockElbOperations::new();
        elb.expect_delete_rule()
            .returning(|_| Err(not_found("RuleNotFound")));
        elb.expect_delete_target_group()
            .returning(|_| Err(not_found("TargetGroupNotFound")));

        let dns = happy_dns();
        let mut manifest = sample_manifest("demo");
        manifest.rules = vec![RuleId::new("arn:rule/1")];

        let report = rollback(&elb, &ecs, &dns, &manifest).await;
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.count(CleanupResult::AlreadyDeleted), 3);
    }

    #[tokio::test]
    async fn test_empty_rule_list_makes_no_rule_calls() {
        let mut ecs = MockEcsOperations::new();
        ecs.expect_delete_service().returning(|_, _| Ok(()));
        ecs.expect_deregister_task_definition().returning(|_| Ok(()));

        let mut elb = MockElbOperations::new();
        elb.expect_delete_rule().times(0);
        elb.expect_delete_target_group().returning(|_| Ok(()));

        let mut manifest = sample_manifest("demo");
        manifest.rules.clear();

        let report = rollback(&elb, &ecs, &happy_dns(), &manifest).await;
        assert_eq!(report.steps.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_cname_is_skipped() {
        let mut dns = MockDnsOperations::new();
        dns.expect_find_cname()
            .withf(|_, name| name == "demo.example.com")
            .returning(|_, _| Ok(vec![]));
        dns.expect_delete_record().times(0);

        let manifest = sample_manifest("demo");
        let step = dns_step(&dns, &manifest).await;
        assert_eq!(step.result, CleanupResult::Skipped);
    }

    #[tokio::test]
    async fn test_cname_lookup_failure_is_reported() {
        let mut dns = MockDnsOperations::new();
        dns.expect_find_cname().returning(|_, _| {
            Err(DnsError::Status {
                status: 403,
                message: "forbidden".to_string(),
            })
        });
        dns.expect_delete_record().times(0);

        let step = dns_step(&dns, &sample_manifest("demo")).await;
        assert_eq!(step.result, CleanupResult::Failed);
        assert!(step.detail.unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_only_first_cname_is_deleted() {
        let mut dns = MockDnsOperations::new();
        dns.expect_find_cname().returning(|_, _| {
            Ok(vec![DnsRecordId::new("rec-1"), DnsRecordId::new("rec-2")])
        });
        dns.expect_delete_record()
            .withf(|_, record| record.as_str() == "rec-1")
            .times(1)
            .returning(|_, _| Ok(()));

        let step = dns_step(&dns, &sample_manifest("demo")).await;
        assert_eq!(step.result, CleanupResult::Deleted);
    }

    #[tokio::test]
    async fn test_manifest_without_cluster_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let cloud = FakeCloud::with_https_listener();
        cloud.seed_rule();

        let mut raw = serde_json::to_value(sample_manifest("demo").to_record()).unwrap();
        raw.as_object_mut().unwrap().remove("ecs_cluster");
        let path = dir.path().join("deployment_info_demo_20260102-030405.json");
        std::fs::write(&path, raw.to_string()).unwrap();

        let before = cloud.mutation_count();
        let connected = Cell::new(false);
        let result = rollback_from_file(&path, |_| {
            connected.set(true);
            let cloud = cloud.clone();
            async move { Ok::<_, anyhow::Error>((cloud.clone(), cloud.clone(), cloud)) }
        })
        .await;

        assert!(result.is_err());
        assert!(!connected.get());
        assert_eq!(cloud.mutation_count(), before);
        assert_eq!(cloud.rule_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_from_file_uses_loaded_manifest() {
        let dir = TempDir::new().unwrap();
        let cloud = FakeCloud::with_https_listener();
        let mut manifest = sample_manifest("demo");
        manifest.rules = vec![cloud.seed_rule()];
        let path = dir.path().join(manifest.file_name());
        std::fs::write(&path, manifest.to_json().unwrap()).unwrap();

        let report = rollback_from_file(&path, |loaded| {
            assert_eq!(loaded.service_name, "demo");
            let cloud = cloud.clone();
            async move { Ok::<_, anyhow::Error>((cloud.clone(), cloud.clone(), cloud)) }
        })
        .await
        .unwrap();

        assert_eq!(cloud.rule_count(), 0);
        assert!(
            report
                .steps
                .iter()
                .any(|s| s.kind == ResourceKind::ListenerRule && s.result == CleanupResult::Deleted)
        );
    }
}
