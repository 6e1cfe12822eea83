//! Deployment manifest
//!
//! The manifest is the only record of what a deployment created. Deploy
//! writes it once, after every resource exists; rollback and update-service
//! read it. The on-disk format is a flat JSON object whose keys predate this
//! tool, so [`ManifestRecord`] mirrors those keys exactly and
//! [`DeploymentManifest`] is the validated, typed view used by the code.

use crate::ids::{ListenerId, RuleId, TargetGroupId, TaskDefinitionId, ZoneId};
use chrono::{DateTime, NaiveDateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name prefix shared by every manifest
pub const MANIFEST_PREFIX: &str = "deployment_info_";

/// File name extension
pub const MANIFEST_EXTENSION: &str = ".json";

/// Timestamp format embedded in manifest file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Manifest loading and validation errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The file could not be read
    #[error("Failed to read manifest '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The contents are not a JSON manifest object
    #[error("Manifest is not valid JSON")]
    Parse(#[from] serde_json::Error),

    /// Required deployment information is missing or empty
    #[error("Missing required deployment information: {0}")]
    Invalid(garde::Report),
}

/// Manifest as stored on disk.
///
/// Every field is optional on read so a damaged file produces a validation
/// report naming the missing keys instead of a bare parse error.
#[derive(Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ManifestRecord {
    #[garde(required, length(min = 1))]
    pub ecs_cluster: Option<String>,

    #[garde(required, length(min = 1))]
    pub service_name: Option<String>,

    #[garde(required, length(min = 1))]
    pub task_definition_arn: Option<String>,

    #[garde(required, length(min = 1))]
    pub target_group_arn: Option<String>,

    #[garde(skip)]
    pub listener_arn: Option<String>,

    /// Rule ARNs in creation order (absent means no rules were created)
    #[serde(default)]
    #[garde(skip)]
    pub rules: Vec<String>,

    #[garde(required, length(min = 1))]
    pub domain_name: Option<String>,

    #[garde(required, length(min = 1))]
    pub cloudflare_api_token: Option<String>,

    #[garde(required, length(min = 1))]
    pub cloudflare_zone_id: Option<String>,

    #[garde(skip)]
    pub alb_dns_name: Option<String>,

    /// AWS region the deployment ran in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub region: Option<String>,

    /// When the deployment finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ManifestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestRecord")
            .field("ecs_cluster", &self.ecs_cluster)
            .field("service_name", &self.service_name)
            .field("task_definition_arn", &self.task_definition_arn)
            .field("target_group_arn", &self.target_group_arn)
            .field("rules", &self.rules)
            .field("domain_name", &self.domain_name)
            .finish_non_exhaustive()
    }
}

/// Validated record of one deployment's resources
#[derive(Clone, PartialEq)]
pub struct DeploymentManifest {
    pub ecs_cluster: String,
    pub service_name: String,
    pub task_definition: TaskDefinitionId,
    pub target_group: TargetGroupId,
    pub listener: Option<ListenerId>,
    pub rules: Vec<RuleId>,
    pub domain_name: String,
    pub dns_api_token: String,
    pub dns_zone: ZoneId,
    pub load_balancer_dns_name: Option<String>,
    pub region: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for DeploymentManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentManifest")
            .field("ecs_cluster", &self.ecs_cluster)
            .field("service_name", &self.service_name)
            .field("task_definition", &self.task_definition)
            .field("target_group", &self.target_group)
            .field("listener", &self.listener)
            .field("rules", &self.rules)
            .field("domain_name", &self.domain_name)
            .field("dns_zone", &self.dns_zone)
            .field("region", &self.region)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl DeploymentManifest {
    /// Load and validate a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate manifest JSON
    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let record: ManifestRecord = serde_json::from_str(content)?;
        Self::try_from(record)
    }

    /// Serialize to the on-disk JSON format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_record())
    }

    /// Convert to the on-disk record
    pub fn to_record(&self) -> ManifestRecord {
        ManifestRecord {
            ecs_cluster: Some(self.ecs_cluster.clone()),
            service_name: Some(self.service_name.clone()),
            task_definition_arn: Some(self.task_definition.to_string()),
            target_group_arn: Some(self.target_group.to_string()),
            listener_arn: self.listener.as_ref().map(ToString::to_string),
            rules: self.rules.iter().map(ToString::to_string).collect(),
            domain_name: Some(self.domain_name.clone()),
            cloudflare_api_token: Some(self.dns_api_token.clone()),
            cloudflare_zone_id: Some(self.dns_zone.to_string()),
            alb_dns_name: self.load_balancer_dns_name.clone(),
            region: self.region.clone(),
            created_at: self.created_at,
        }
    }

    /// File name this manifest is stored under
    pub fn file_name(&self) -> String {
        manifest_file_name(&self.service_name, self.created_at.unwrap_or_else(Utc::now))
    }

    /// Copy of this manifest pointing at a different task definition
    pub fn with_task_definition(&self, task_definition: TaskDefinitionId) -> Self {
        Self {
            task_definition,
            created_at: Some(Utc::now()),
            ..self.clone()
        }
    }
}

impl TryFrom<ManifestRecord> for DeploymentManifest {
    type Error = ManifestError;

    fn try_from(record: ManifestRecord) -> Result<Self, Self::Error> {
        record.validate().map_err(ManifestError::Invalid)?;

        // validate() guarantees every required field is Some and non-empty
        let required = |field: Option<String>| field.unwrap_or_default();

        Ok(Self {
            ecs_cluster: required(record.ecs_cluster),
            service_name: required(record.service_name),
            task_definition: TaskDefinitionId::new(required(record.task_definition_arn)),
            target_group: TargetGroupId::new(required(record.target_group_arn)),
            listener: record
                .listener_arn
                .filter(|s| !s.is_empty())
                .map(ListenerId::new),
            rules: record.rules.into_iter().map(RuleId::new).collect(),
            domain_name: required(record.domain_name),
            dns_api_token: required(record.cloudflare_api_token),
            dns_zone: ZoneId::new(required(record.cloudflare_zone_id)),
            load_balancer_dns_name: record.alb_dns_name,
            region: record.region,
            created_at: record.created_at,
        })
    }
}

/// Build `deployment_info_<service>_<YYYYMMDD-HHMMSS>.json`
pub fn manifest_file_name(service_name: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "{MANIFEST_PREFIX}{service_name}_{}{MANIFEST_EXTENSION}",
        created_at.format(TIMESTAMP_FORMAT)
    )
}

/// Split a manifest file name into (service name, timestamp).
///
/// The timestamp never contains an underscore, so the last underscore
/// separates it from service names that may contain their own.
pub fn parse_manifest_file_name(file_name: &str) -> Option<(&str, &str)> {
    let stem = file_name
        .strip_prefix(MANIFEST_PREFIX)?
        .strip_suffix(MANIFEST_EXTENSION)?;
    let (service, timestamp) = stem.rsplit_once('_')?;
    if service.is_empty() || NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_err() {
        return None;
    }
    Some((service, timestamp))
}
