//! Deployment errors

use super::DeployStage;
use crate::aws::AwsError;
use crate::dns::DnsError;
use crate::report::DeployReport;
use crate::store::StoreError;
use ecs_deploy_common::{LoadBalancerId, ResourceKind};
use thiserror::Error;

/// A provisioner's external call failed
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Failed to provision {resource}")]
    Aws {
        resource: ResourceKind,
        #[source]
        source: AwsError,
    },

    #[error("Failed to provision dns-record")]
    Dns(#[source] DnsError),
}

impl ProvisionError {
    /// The kind of resource that could not be provisioned
    pub fn resource(&self) -> ResourceKind {
        match self {
            ProvisionError::Aws { resource, .. } => *resource,
            ProvisionError::Dns(_) => ResourceKind::DnsRecord,
        }
    }
}

/// Reasons the deploy chain stops
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Failed to describe the listeners of load balancer '{load_balancer}'")]
    ListenerLookup {
        load_balancer: LoadBalancerId,
        #[source]
        source: AwsError,
    },

    #[error("Load balancer '{0}' has no HTTPS listener on port 443")]
    ListenerNotFound(LoadBalancerId),

    #[error("Failed to save the deployment manifest")]
    Manifest(#[from] StoreError),
}

/// The deploy chain stopped before the manifest was written.
///
/// `report` lists what was created; none of it is recorded in a manifest.
#[derive(Debug, Error)]
#[error("Deployment halted before {stage}")]
pub struct DeployHalted {
    /// The stage that could not be reached
    pub stage: DeployStage,
    pub report: DeployReport,
    #[source]
    pub source: DeployError,
}
