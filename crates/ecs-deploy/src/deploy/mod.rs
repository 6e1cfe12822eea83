//! Deployment orchestration
//!
//! A deployment is a linear chain of stages:
//!
//! ```text
//! LogGroupReady → TargetGroupReady → ListenerResolved → RuleCreated
//!   → TaskDefRegistered → ServiceCreated → DnsRecordCreated → ManifestSaved
//! ```
//!
//! Each stage is entered only when the previous call produced an
//! identifier. The first failure halts the chain; nothing after it runs and
//! no manifest is written, so the resources created so far have no rollback
//! record. [`DeployHalted`] carries the report of those resources so they
//! can be cleaned up by hand.

mod error;
pub mod plan;
pub mod priority;
pub mod provision;

pub use error::{DeployError, DeployHalted, ProvisionError};
pub use plan::DeploymentPlan;

use crate::aws::{EcsOperations, ElbOperations, LogsOperations};
use crate::dns::DnsOperations;
use crate::report::{DeployReport, StageEntry};
use crate::store::ManifestStore;
use chrono::Utc;
use ecs_deploy_common::RuleId;
use std::fmt;
use tracing::{error, info, instrument};

/// Stages of the deploy chain, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeployStage {
    LogGroupReady,
    TargetGroupReady,
    ListenerResolved,
    RuleCreated,
    TaskDefRegistered,
    ServiceCreated,
    DnsRecordCreated,
    ManifestSaved,
}

impl DeployStage {
    pub const ALL: [DeployStage; 8] = [
        DeployStage::LogGroupReady,
        DeployStage::TargetGroupReady,
        DeployStage::ListenerResolved,
        DeployStage::RuleCreated,
        DeployStage::TaskDefRegistered,
        DeployStage::ServiceCreated,
        DeployStage::DnsRecordCreated,
        DeployStage::ManifestSaved,
    ];

    /// The stage that follows this one, if any
    pub fn next(self) -> Option<DeployStage> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployStage::LogGroupReady => "log group ready",
            DeployStage::TargetGroupReady => "target group ready",
            DeployStage::ListenerResolved => "listener resolved",
            DeployStage::RuleCreated => "rule created",
            DeployStage::TaskDefRegistered => "task definition registered",
            DeployStage::ServiceCreated => "service created",
            DeployStage::DnsRecordCreated => "DNS record created",
            DeployStage::ManifestSaved => "manifest saved",
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External services a deployment talks to
///
/// Bundles borrowed clients so the orchestrator can run against real
/// clients or test doubles.
pub struct CloudServices<'a, L, E, C, D> {
    pub logs: &'a L,
    pub elb: &'a E,
    pub ecs: &'a C,
    pub dns: &'a D,
}

/// Tracks the chain's position and what each stage produced
struct Progress {
    report: DeployReport,
}

impl Progress {
    fn new(project: &str) -> Self {
        Self {
            report: DeployReport::new(project),
        }
    }

    /// The stage the chain will enter next
    fn pending(&self) -> DeployStage {
        match self.report.last_stage() {
            None => DeployStage::LogGroupReady,
            Some(stage) => stage.next().unwrap_or(DeployStage::ManifestSaved),
        }
    }

    fn enter(&mut self, stage: DeployStage, resource: impl fmt::Display) {
        debug_assert_eq!(stage, self.pending(), "stages must be entered in order");
        let resource = resource.to_string();
        info!(stage = %stage, resource = %resource, "Stage reached");
        self.report.entries.push(StageEntry { stage, resource });
    }

    fn halt(self, source: DeployError) -> DeployHalted {
        let stage = self.pending();
        error!(stage = %stage, error = %source, "Deployment halted, no manifest written");
        for entry in &self.report.entries {
            error!(
                stage = %entry.stage,
                resource = %entry.resource,
                "Created but not recorded in any manifest"
            );
        }
        DeployHalted {
            stage,
            report: self.report,
            source,
        }
    }
}

/// Runs the deploy chain and persists the manifest
pub struct Deployer<'a, L, E, C, D> {
    services: CloudServices<'a, L, E, C, D>,
    plan: &'a DeploymentPlan,
    store: &'a ManifestStore,
}

impl<'a, L, E, C, D> Deployer<'a, L, E, C, D>
where
    L: LogsOperations,
    E: ElbOperations,
    C: EcsOperations,
    D: DnsOperations,
{
    pub fn new(
        services: CloudServices<'a, L, E, C, D>,
        plan: &'a DeploymentPlan,
        store: &'a ManifestStore,
    ) -> Self {
        Self {
            services,
            plan,
            store,
        }
    }

    /// Run every stage; the manifest is written only if all succeed.
    #[instrument(skip_all, fields(project = %self.plan.project, domain = %self.plan.domain_name))]
    pub async fn run(&self) -> Result<DeployReport, DeployHalted> {
        info!(cluster = %self.plan.cluster, region = %self.plan.region, "Starting deployment");

        let mut progress = Progress::new(&self.plan.project);
        match self.provision(&mut progress).await {
            Ok(()) => {
                info!("Deployment complete");
                Ok(progress.report)
            }
            Err(e) => Err(progress.halt(e)),
        }
    }

    async fn provision(&self, progress: &mut Progress) -> Result<(), DeployError> {
        let CloudServices { logs, elb, ecs, dns } = &self.services;
        let plan = self.plan;

        let log_group = provision::ensure_log_group(*logs, &plan.log_group).await?;
        progress.enter(DeployStage::LogGroupReady, &log_group);

        let target_group = provision::create_target_group(*elb, &plan.target_group).await?;
        progress.enter(DeployStage::TargetGroupReady, &target_group);

        let listener = provision::resolve_https_listener(*elb, &plan.load_balancer).await?;
        progress.enter(DeployStage::ListenerResolved, &listener);

        let mut rules: Vec<RuleId> = Vec::new();
        let rule =
            provision::create_rule(*elb, &listener, &target_group, &plan.domain_name).await?;
        progress.enter(DeployStage::RuleCreated, &rule);
        rules.push(rule);

        let task_definition =
            provision::register_task_definition(*ecs, &plan.task_definition).await?;
        progress.enter(DeployStage::TaskDefRegistered, &task_definition);

        let service = provision::create_service(
            *ecs,
            &plan.service_spec(&task_definition, &target_group),
        )
        .await?;
        progress.enter(DeployStage::ServiceCreated, &service);

        let record = provision::create_dns_record(
            *dns,
            &plan.dns_zone,
            &plan.domain_name,
            &plan.load_balancer_dns_name,
        )
        .await?;
        progress.enter(DeployStage::DnsRecordCreated, &record);

        let manifest = plan.manifest(task_definition, target_group, listener, rules, Utc::now());
        let path = self.store.save(&manifest)?;
        progress.enter(DeployStage::ManifestSaved, path.display());
        progress.report.manifest_path = Some(path);

        Ok(())
    }
}
