//! Provisioned resource kinds and rollback ordering
//!
//! Deploy creates resources in dependency order; rollback walks them in a
//! fixed order of its own. Every rollback step is attempted regardless of
//! earlier failures, so the order only decides which errors are likely, not
//! which steps run.

use std::fmt;

/// Types of resources provisioned by a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// CloudWatch log group (shared between deployments, never rolled back)
    LogGroup,
    /// Load balancer target group
    TargetGroup,
    /// Host-header listener rule
    ListenerRule,
    /// ECS task definition revision
    TaskDefinition,
    /// ECS service
    Service,
    /// CNAME record at the DNS provider
    DnsRecord,
}

impl ResourceKind {
    /// Kinds in the order a deployment creates them
    pub const DEPLOY_ORDER: [ResourceKind; 6] = [
        ResourceKind::LogGroup,
        ResourceKind::TargetGroup,
        ResourceKind::ListenerRule,
        ResourceKind::TaskDefinition,
        ResourceKind::Service,
        ResourceKind::DnsRecord,
    ];

    /// Get rollback priority (lower number = rolled back first)
    ///
    /// - 0: Delete the service (force, tasks may still be running)
    /// - 1: Deregister the task definition
    /// - 2: Delete listener rules (they reference the target group)
    /// - 3: Delete the target group
    /// - 4: Delete the DNS record
    ///
    /// The log group is shared by every deployment of the cluster and
    /// returns `None`.
    pub fn rollback_priority(self) -> Option<u8> {
        match self {
            ResourceKind::Service => Some(0),
            ResourceKind::TaskDefinition => Some(1),
            ResourceKind::ListenerRule => Some(2),
            ResourceKind::TargetGroup => Some(3),
            ResourceKind::DnsRecord => Some(4),
            ResourceKind::LogGroup => None,
        }
    }

    /// Kinds a rollback removes, in rollback order
    pub fn rollback_order() -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = Self::DEPLOY_ORDER
            .into_iter()
            .filter(|k| k.rollback_priority().is_some())
            .collect();
        kinds.sort_by_key(|k| k.rollback_priority());
        kinds
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::LogGroup => "log-group",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::ListenerRule => "listener-rule",
            ResourceKind::TaskDefinition => "task-definition",
            ResourceKind::Service => "service",
            ResourceKind::DnsRecord => "dns-record",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
