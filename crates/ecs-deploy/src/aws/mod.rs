//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - CloudWatch Logs: the container log group
//! - ELBv2: target groups, listeners, and listener rules
//! - ECS: task definitions and services
//! - STS: credential validation
//!
//! Each wrapper implements an operations trait so the provisioners and
//! orchestrators can run against test doubles.

pub mod account;
pub mod context;
pub mod ecs;
pub mod elb;
pub mod error;
pub mod logs;

pub use account::{AccountId, verify_account};
pub use context::{AwsContext, FromAwsContext};
pub use ecs::{EcsClient, EcsOperations};
pub use elb::{ElbClient, ElbOperations};
pub use error::{AwsError, classify_aws_error, classify_sdk_error};
pub use logs::{LogsClient, LogsOperations};

#[cfg(test)]
pub use ecs::MockEcsOperations;
#[cfg(test)]
pub use elb::MockElbOperations;
#[cfg(test)]
pub use logs::MockLogsOperations;
