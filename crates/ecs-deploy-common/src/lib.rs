//! ecs-deploy-common - Shared types and utilities
//!
//! This crate holds the types shared by the deploy, rollback, and update
//! paths, without any AWS SDK dependencies to keep it lightweight.
//!
//! ## Modules
//!
//! - [`defaults`]: Fixed provisioning parameters and configuration defaults
//! - [`ids`]: Strongly-typed resource identifiers
//! - [`manifest`]: Deployment manifest wire format, validation, and file naming
//! - [`resource_kind`]: Provisioned resource kinds and rollback ordering
//! - [`tags`]: Resource tag keys and values
//! - [`task_size`]: Fargate task CPU/memory validation

pub mod defaults;
pub mod ids;
pub mod manifest;
pub mod resource_kind;
pub mod tags;
pub mod task_size;

// Re-export commonly used types
pub use ids::{
    DnsRecordId, ListenerId, LoadBalancerId, LogGroupName, RuleId, ServiceId, TargetGroupId,
    TaskDefinitionId, ZoneId,
};
pub use manifest::{DeploymentManifest, ManifestError, ManifestRecord};
pub use resource_kind::ResourceKind;
pub use task_size::{TaskSize, TaskSizeError};
