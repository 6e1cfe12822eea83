//! ecs-deploy - Fargate service provisioning and rollback
//!
//! A deployment creates, in order, a log group, a target group, a
//! host-header listener rule, a task definition, an ECS service, and a
//! Cloudflare CNAME, then records their identifiers in a JSON manifest.
//! Rollback tears the same resources down using only that manifest.
//!
//! ## Modules
//!
//! - [`aws`]: Logs, ELBv2, ECS, and STS clients behind mockable traits
//! - [`config`]: Environment configuration
//! - [`deploy`]: Provisioners, rule priority allocation, and the deploy chain
//! - [`dns`]: DNS provider client
//! - [`report`]: Deploy and rollback summary tables
//! - [`rollback`]: Manifest-driven teardown
//! - [`store`]: Manifest persistence
//! - [`update`]: Image and task-size updates for a deployed service

pub mod aws;
pub mod config;
pub mod deploy;
pub mod dns;
pub mod report;
pub mod rollback;
pub mod store;
pub mod update;

#[cfg(test)]
mod testing;
