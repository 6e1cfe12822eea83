//! Roll a deployed service to a new image tag and task size
//!
//! The current task definition is the template: its container definition is
//! copied with the new image, and the task-level sizing is replaced. An
//! existing revision that already matches is reused instead of registering
//! a duplicate. The result is recorded in a fresh manifest that supersedes
//! the old one.

use crate::aws::ecs::{ContainerSpec, TaskDefinitionInfo, TaskDefinitionSpec};
use crate::aws::{AwsError, EcsOperations};
use crate::store::{ManifestStore, StoreError};
use ecs_deploy_common::{DeploymentManifest, TaskDefinitionId, TaskSize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Tag assumed when an image reference carries none
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Update-service errors
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Failed to describe task definition '{task_definition}'")]
    Describe {
        task_definition: TaskDefinitionId,
        #[source]
        source: AwsError,
    },

    #[error("Task definition '{0}' has no container definitions")]
    NoContainer(TaskDefinitionId),

    #[error("Unable to parse image reference '{0}', expected <repository>/<name>[:<tag>]")]
    InvalidImage(String),

    #[error("Failed to list revisions of task definition family '{family}'")]
    ListRevisions {
        family: String,
        #[source]
        source: AwsError,
    },

    #[error("Failed to register task definition for family '{family}'")]
    Register {
        family: String,
        #[source]
        source: AwsError,
    },

    #[error("Failed to update service '{service}' in cluster '{cluster}'")]
    UpdateService {
        cluster: String,
        service: String,
        #[source]
        source: AwsError,
    },

    #[error("Service now runs '{task_definition}' but the new manifest could not be saved")]
    Manifest {
        task_definition: TaskDefinitionId,
        #[source]
        source: StoreError,
    },
}

/// A container image reference split into `<repository>/<name>:<tag>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Everything before the last `/` (registry host and path)
    pub repository: String,
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn parse(image: &str) -> Result<Self, UpdateError> {
        let invalid = || UpdateError::InvalidImage(image.to_string());

        let (repository, rest) = image.rsplit_once('/').ok_or_else(invalid)?;
        let (name, tag) = match rest.split_once(':') {
            Some((name, tag)) if !tag.is_empty() => (name, tag),
            Some((name, _)) => (name, DEFAULT_IMAGE_TAG),
            None => (rest, DEFAULT_IMAGE_TAG),
        };
        if repository.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repository: repository.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Same repository and name with a different tag
    pub fn with_tag(&self, tag: &str) -> ImageRef {
        ImageRef {
            tag: tag.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.repository, self.name, self.tag)
    }
}

/// What the service should run after the update
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub image_tag: String,
    pub size: TaskSize,
}

/// Result of a successful update
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub task_definition: TaskDefinitionId,
    /// An existing revision matched and no new one was registered
    pub reused: bool,
    pub image: String,
    pub manifest_path: PathBuf,
}

fn revision_matches(info: &TaskDefinitionInfo, image: &str, size: &TaskSize) -> bool {
    size.matches(info.cpu.as_deref(), info.memory.as_deref())
        && info
            .containers
            .iter()
            .any(|c| c.image == image && c.cpu == 0)
}

/// Newest revision of `family` that already runs `image` at `size`
async fn find_matching_revision<C: EcsOperations>(
    ecs: &C,
    family: &str,
    image: &str,
    size: &TaskSize,
) -> Result<Option<TaskDefinitionId>, UpdateError> {
    let revisions = ecs
        .list_task_definitions(family)
        .await
        .map_err(|source| UpdateError::ListRevisions {
            family: family.to_string(),
            source,
        })?;

    for revision in revisions.into_iter().rev() {
        match ecs.describe_task_definition(&revision).await {
            Ok(info) if revision_matches(&info, image, size) => return Ok(Some(revision)),
            Ok(_) => {}
            Err(e) => warn!(revision = %revision, error = %e, "Skipping revision that could not be described"),
        }
    }
    Ok(None)
}

/// Point the manifest's service at `request`'s image and size.
#[instrument(skip_all, fields(service = %manifest.service_name, tag = %request.image_tag))]
pub async fn update_service<C: EcsOperations>(
    ecs: &C,
    store: &ManifestStore,
    manifest: &DeploymentManifest,
    request: &UpdateRequest,
) -> Result<UpdateOutcome, UpdateError> {
    let current = ecs
        .describe_task_definition(&manifest.task_definition)
        .await
        .map_err(|source| UpdateError::Describe {
            task_definition: manifest.task_definition.clone(),
            source,
        })?;
    let container = current
        .containers
        .first()
        .ok_or_else(|| UpdateError::NoContainer(current.id.clone()))?;

    let current_image = ImageRef::parse(&container.image)?;
    let image = current_image.with_tag(&request.image_tag).to_string();
    info!(
        current = %current_image,
        new = %image,
        size = %request.size,
        "Updating service"
    );

    let existing =
        find_matching_revision(ecs, &current.family, &image, &request.size).await?;
    let reused = existing.is_some();
    let task_definition = match existing {
        Some(revision) => {
            info!(task_definition = %revision, "Reusing existing task definition");
            revision
        }
        None => {
            let spec = TaskDefinitionSpec {
                family: current.family.clone(),
                container: ContainerSpec {
                    image: image.clone(),
                    cpu: 0,
                    ..container.clone()
                },
                task_role_arn: current.task_role_arn.clone(),
                execution_role_arn: current.execution_role_arn.clone(),
                size: request.size,
                tags: Vec::new(),
            };
            let revision = ecs.register_task_definition(&spec).await.map_err(|source| {
                UpdateError::Register {
                    family: current.family.clone(),
                    source,
                }
            })?;
            info!(task_definition = %revision, "Task definition registered");
            revision
        }
    };

    ecs.update_service(&manifest.ecs_cluster, &manifest.service_name, &task_definition)
        .await
        .map_err(|source| UpdateError::UpdateService {
            cluster: manifest.ecs_cluster.clone(),
            service: manifest.service_name.clone(),
            source,
        })?;
    info!(task_definition = %task_definition, "Service updated");

    let manifest_path = store
        .save(&manifest.with_task_definition(task_definition.clone()))
        .map_err(|source| {
            error!(
                task_definition = %task_definition,
                error = %source,
                "Service updated, but no manifest records the running task definition"
            );
            UpdateError::Manifest {
                task_definition: task_definition.clone(),
                source,
            }
        })?;

    Ok(UpdateOutcome {
        task_definition,
        reused,
        image,
        manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockEcsOperations;
    use crate::config::DeployConfig;
    use crate::deploy::DeploymentPlan;
    use crate::testing::FakeCloud;
    use ecs_deploy_common::TargetGroupId;
    use ecs_deploy_test_utils::{demo_env, sample_manifest};
    use tempfile::TempDir;

    /// A fake cloud running the demo service, and its manifest
    async fn deployed(cloud: &FakeCloud) -> DeploymentManifest {
        let env = demo_env();
        let config = DeployConfig::from_lookup(|name| env.get(name).cloned()).unwrap();
        let plan = DeploymentPlan::from_config(&config);

        let td = cloud
            .register_task_definition(&plan.task_definition)
            .await
            .unwrap();
        cloud
            .create_service(&plan.service_spec(&td, &TargetGroupId::new("arn:tg/demo")))
            .await
            .unwrap();

        let mut manifest = sample_manifest("demo");
        manifest.ecs_cluster = plan.cluster.clone();
        manifest.task_definition = td;
        manifest
    }

    fn request(tag: &str, cpu: &str, memory: &str) -> UpdateRequest {
        UpdateRequest {
            image_tag: tag.to_string(),
            size: TaskSize::new(cpu, memory).unwrap(),
        }
    }

    #[test]
    fn test_parse_image_with_tag() {
        let image = ImageRef::parse("123.dkr.ecr.us-east-1.amazonaws.com/team/api:v1").unwrap();
        assert_eq!(image.repository, "123.dkr.ecr.us-east-1.amazonaws.com/team");
        assert_eq!(image.name, "api");
        assert_eq!(image.tag, "v1");
        assert_eq!(
            image.with_tag("v2").to_string(),
            "123.dkr.ecr.us-east-1.amazonaws.com/team/api:v2"
        );
    }

    #[test]
    fn test_parse_image_without_tag() {
        let image = ImageRef::parse("registry:5000/api").unwrap();
        assert_eq!(image.repository, "registry:5000");
        assert_eq!(image.name, "api");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn test_parse_rejects_bare_name() {
        assert!(matches!(
            ImageRef::parse("api:v1"),
            Err(UpdateError::InvalidImage(_))
        ));
        assert!(ImageRef::parse("registry/").is_err());
    }

    #[tokio::test]
    async fn test_registers_new_revision_and_writes_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let cloud = FakeCloud::default();
        let manifest = deployed(&cloud).await;

        let outcome = update_service(&cloud, &store, &manifest, &request("v2", "512", "1024"))
            .await
            .unwrap();

        assert!(!outcome.reused);
        assert_ne!(outcome.task_definition, manifest.task_definition);
        assert!(outcome.image.ends_with(":v2"));
        assert_eq!(cloud.task_definition_count(), 2);
        assert_eq!(
            cloud.service_task_definition(&manifest.ecs_cluster, "demo"),
            Some(outcome.task_definition.clone())
        );

        let info = cloud
            .describe_task_definition(&outcome.task_definition)
            .await
            .unwrap();
        assert_eq!(info.cpu.as_deref(), Some("512"));
        assert_eq!(info.memory.as_deref(), Some("1024"));
        assert_eq!(info.containers[0].name, "demo-api-container");
        assert!(info.containers[0].health_check.is_some());

        let saved = DeploymentManifest::load(&outcome.manifest_path).unwrap();
        assert_eq!(saved.task_definition, outcome.task_definition);
        assert_eq!(saved.target_group, manifest.target_group);
        assert_eq!(saved.rules, manifest.rules);
    }

    #[tokio::test]
    async fn test_reuses_matching_revision() {
        let cloud = FakeCloud::default();
        let manifest = deployed(&cloud).await;

        // demo_env deploys tag v1 at the default 256/2048 size
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let outcome = update_service(&cloud, &store, &manifest, &request("v1", "256", "2048"))
            .await
            .unwrap();

        assert!(outcome.reused);
        assert_eq!(outcome.task_definition, manifest.task_definition);
        assert_eq!(cloud.task_definition_count(), 1);
    }

    #[tokio::test]
    async fn test_describe_failure_changes_nothing() {
        let mut ecs = MockEcsOperations::new();
        ecs.expect_describe_task_definition().returning(|_| {
            Err(AwsError::NotFound {
                code: "ClientException".to_string(),
                message: "Unable to describe task definition".to_string(),
            })
        });
        ecs.expect_register_task_definition().times(0);
        ecs.expect_update_service().times(0);

        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let err = update_service(&ecs, &store, &sample_manifest("demo"), &request("v2", "256", "512"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Describe { .. }));
        assert!(store.list("demo").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_update_failure_writes_no_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let cloud = FakeCloud::default();
        let manifest = deployed(&cloud).await;
        cloud.fail_on("update_service");

        let err = update_service(&cloud, &store, &manifest, &request("v2", "256", "2048"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::UpdateService { .. }));
        assert!(store.list("demo").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_reports_running_revision() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let store = ManifestStore::new(&blocker);
        let cloud = FakeCloud::default();
        let manifest = deployed(&cloud).await;

        let err = update_service(&cloud, &store, &manifest, &request("v2", "256", "2048"))
            .await
            .unwrap_err();

        match err {
            UpdateError::Manifest { task_definition, .. } => assert_eq!(
                cloud.service_task_definition(&manifest.ecs_cluster, "demo"),
                Some(task_definition)
            ),
            other => panic!("expected Manifest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_supersedes_manifest_in_its_own_directory() {
        let dir = TempDir::new().unwrap();
        let cloud = FakeCloud::default();
        let mut manifest = deployed(&cloud).await;
        manifest.created_at = Some(chrono::DateTime::from_timestamp(0, 0).unwrap());
        let old = ManifestStore::new(dir.path().join("custom"))
            .save(&manifest)
            .unwrap();

        let store = ManifestStore::for_manifest(&old, dir.path().join("deployments"));
        let outcome = update_service(&cloud, &store, &manifest, &request("v2", "256", "2048"))
            .await
            .unwrap();

        assert!(!old.exists());
        assert_eq!(outcome.manifest_path.parent(), old.parent());
        assert_eq!(store.list("demo").unwrap(), vec![outcome.manifest_path]);
    }
}
