//! Strongly-typed resource identifiers
//!
//! Each provisioned resource gets its own newtype so a target group ARN can
//! never be passed where a rule ARN is expected. All of them serialize as
//! plain strings, which keeps the manifest format unchanged.

use serde::{Deserialize, Serialize};

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            derive_more::Display,
            derive_more::Deref,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

resource_id!(
    /// CloudWatch log group name (log groups are addressed by name, not ARN)
    LogGroupName
);
resource_id!(
    /// Application load balancer ARN
    LoadBalancerId
);
resource_id!(
    /// Target group ARN
    TargetGroupId
);
resource_id!(
    /// Listener ARN
    ListenerId
);
resource_id!(
    /// Listener rule ARN
    RuleId
);
resource_id!(
    /// Task definition ARN (includes the revision)
    TaskDefinitionId
);
resource_id!(
    /// ECS service ARN
    ServiceId
);
resource_id!(
    /// DNS provider zone identifier
    ZoneId
);
resource_id!(
    /// DNS provider record identifier
    DnsRecordId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let id = TargetGroupId::new("arn:aws:elasticloadbalancing:tg/demo/1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"arn:aws:elasticloadbalancing:tg/demo/1\"");

        let back: TargetGroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_display_and_deref() {
        let rule = RuleId::from("arn:rule/1");
        assert_eq!(rule.to_string(), "arn:rule/1");
        assert!(rule.starts_with("arn:"));
        assert_eq!(rule.as_str(), "arn:rule/1");
    }
}
