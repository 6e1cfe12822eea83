//! Environment configuration
//!
//! Deploy reads every parameter from the environment (optionally seeded
//! from a `.env` file). Loading is written against a lookup function so it
//! can be tested without touching the process environment.

use ecs_deploy_common::defaults::{
    DEFAULT_DEPLOYMENTS_DIR, DEFAULT_LOG_GROUP, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TASK_CPU,
    DEFAULT_TASK_MEMORY,
};
use ecs_deploy_common::{LoadBalancerId, LogGroupName, TaskSize, TaskSizeError, ZoneId};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variables deploy cannot run without
pub const REQUIRED_VARS: &[&str] = &[
    "AWS_REGION",
    "VPC_ID",
    "SUBNETS",
    "SECURITY_GROUPS",
    "ALB_ARN",
    "PROJECT_NAME",
    "ECR_REPO_URI",
    "DOMAIN_NAME",
    "ECS_CLUSTER",
    "IMAGE_TAG",
    "TASK_ROLE_ARN",
    "EXECUTION_ROLE_ARN",
    "CLOUDFLARE_ZONE_ID",
    "ALB_DNS_NAME",
    "ACCESS_KEY",
    "SECRET_TOKEN",
    "CLOUDFLARE_API_TOKEN",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required variables are unset or empty
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A comma-separated list contained no entries
    #[error("{0} must list at least one value")]
    EmptyList(&'static str),

    /// A numeric variable did not parse
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    /// TASK_CPU/TASK_MEMORY outside the allowed Fargate sizes
    #[error("Invalid task size")]
    TaskSize(#[from] TaskSizeError),
}

/// Static AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Credentials from ACCESS_KEY/SECRET_TOKEN, if both are set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let lookup = non_empty(&lookup);
        Some(Self::new(lookup("ACCESS_KEY")?, lookup("SECRET_TOKEN")?))
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Everything a deployment run needs
#[derive(Clone)]
pub struct DeployConfig {
    pub region: String,
    pub vpc_id: String,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub load_balancer: LoadBalancerId,
    pub load_balancer_dns_name: String,
    pub project_name: String,
    pub repository_uri: String,
    pub image_tag: String,
    pub domain_name: String,
    pub cluster: String,
    pub task_role_arn: String,
    pub execution_role_arn: String,
    pub task_size: TaskSize,
    pub log_group: LogGroupName,
    pub dns_zone: ZoneId,
    pub dns_api_token: String,
    pub credentials: AwsCredentials,
    pub deployments_dir: PathBuf,
    pub request_timeout: Duration,
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("region", &self.region)
            .field("project_name", &self.project_name)
            .field("cluster", &self.cluster)
            .field("domain_name", &self.domain_name)
            .field("image", &self.image())
            .field("task_size", &self.task_size)
            .field("load_balancer", &self.load_balancer)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl DeployConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Every missing required variable is reported together.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = non_empty(&lookup);

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|&name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |name: &'static str| get(name).unwrap_or_default();
        let optional = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let task_size = TaskSize::new(
            &optional("TASK_CPU", DEFAULT_TASK_CPU),
            &optional("TASK_MEMORY", DEFAULT_TASK_MEMORY),
        )?;

        Ok(Self {
            region: required("AWS_REGION"),
            vpc_id: required("VPC_ID"),
            subnets: parse_list("SUBNETS", &required("SUBNETS"))?,
            security_groups: parse_list("SECURITY_GROUPS", &required("SECURITY_GROUPS"))?,
            load_balancer: LoadBalancerId::new(required("ALB_ARN")),
            load_balancer_dns_name: required("ALB_DNS_NAME"),
            project_name: required("PROJECT_NAME"),
            repository_uri: required("ECR_REPO_URI"),
            image_tag: required("IMAGE_TAG"),
            domain_name: required("DOMAIN_NAME"),
            cluster: required("ECS_CLUSTER"),
            task_role_arn: required("TASK_ROLE_ARN"),
            execution_role_arn: required("EXECUTION_ROLE_ARN"),
            task_size,
            log_group: LogGroupName::new(optional("LOG_GROUP", DEFAULT_LOG_GROUP)),
            dns_zone: ZoneId::new(required("CLOUDFLARE_ZONE_ID")),
            dns_api_token: required("CLOUDFLARE_API_TOKEN"),
            credentials: AwsCredentials::new(required("ACCESS_KEY"), required("SECRET_TOKEN")),
            deployments_dir: PathBuf::from(optional("DEPLOYMENTS_DIR", DEFAULT_DEPLOYMENTS_DIR)),
            request_timeout: parse_timeout(get("REQUEST_TIMEOUT_SECS"))?,
        })
    }

    /// Container image reference `<repository>:<tag>`
    pub fn image(&self) -> String {
        format!("{}:{}", self.repository_uri, self.image_tag)
    }
}

/// Settings shared by rollback and update-service, which take their
/// deployment details from a manifest instead of the environment.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub region: Option<String>,
    pub credentials: Option<AwsCredentials>,
    pub deployments_dir: PathBuf,
    pub request_timeout: Duration,
}

impl ClientSettings {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup; nothing is required
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = non_empty(&lookup);
        Ok(Self {
            region: get("AWS_REGION"),
            credentials: AwsCredentials::from_lookup(&lookup),
            deployments_dir: PathBuf::from(
                get("DEPLOYMENTS_DIR").unwrap_or_else(|| DEFAULT_DEPLOYMENTS_DIR.to_string()),
            ),
            request_timeout: parse_timeout(get("REQUEST_TIMEOUT_SECS"))?,
        })
    }
}

/// Wrap a lookup so blank values read as unset
fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F) -> impl Fn(&str) -> Option<String> + '_ {
    move |name| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

fn parse_list(var: &'static str, value: &str) -> Result<Vec<String>, ConfigError> {
    let items: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        return Err(ConfigError::EmptyList(var));
    }
    Ok(items)
}

fn parse_timeout(value: Option<String>) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidNumber {
            var: "REQUEST_TIMEOUT_SECS",
            value,
        }),
    }
}
