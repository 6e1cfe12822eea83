//! Fixed provisioning parameters and configuration defaults
//!
//! These constants keep the deploy, rollback, and update paths in agreement
//! about ports, health checks, and naming.

/// Port the load balancer, target group, and container all serve on
pub const HTTPS_PORT: i32 = 443;

/// Health check path probed by the target group
pub const HEALTH_CHECK_PATH: &str = "/hc";

/// Target group health check interval in seconds
pub const HEALTH_CHECK_INTERVAL_SECS: i32 = 30;

/// Target group health check timeout in seconds
pub const HEALTH_CHECK_TIMEOUT_SECS: i32 = 5;

/// Consecutive successes before a target is healthy
pub const HEALTHY_THRESHOLD: i32 = 3;

/// Consecutive failures before a target is unhealthy
pub const UNHEALTHY_THRESHOLD: i32 = 3;

/// HTTP codes the target group treats as healthy
pub const HEALTH_CHECK_MATCHER: &str = "200-499";

/// Load-balancer cookie stickiness duration in seconds
pub const STICKINESS_DURATION_SECS: u32 = 3600;

/// Retention applied to a newly created log group
pub const LOG_RETENTION_DAYS: i32 = 7;

/// Command the container health check runs
pub const CONTAINER_HEALTH_COMMAND: &str = "curl -fk https://localhost/ || exit 1";

/// Container health check interval in seconds
pub const CONTAINER_HEALTH_INTERVAL_SECS: i32 = 30;

/// Container health check timeout in seconds
pub const CONTAINER_HEALTH_TIMEOUT_SECS: i32 = 5;

/// Container health check retries before the task is unhealthy
pub const CONTAINER_HEALTH_RETRIES: i32 = 3;

/// Grace period before container health checks count
pub const CONTAINER_HEALTH_START_PERIOD_SECS: i32 = 60;

/// Stream prefix for the awslogs driver
pub const LOG_STREAM_PREFIX: &str = "ecs";

/// Desired task count for a new service
pub const SERVICE_DESIRED_COUNT: i32 = 1;

/// TTL of the CNAME record, in seconds
pub const DNS_TTL_SECS: u32 = 300;

/// Priority assumed as the current maximum when a listener has no numbered rules
pub const BASE_RULE_PRIORITY: u32 = 99;

/// Priority used when the listener's rules cannot be listed
pub const FALLBACK_RULE_PRIORITY: u32 = 100;

/// Default log group for container output
pub const DEFAULT_LOG_GROUP: &str = "/ecs/container-logs";

/// Default directory for deployment manifests
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// Default task CPU units
pub const DEFAULT_TASK_CPU: &str = "256";

/// Default task memory in MiB
pub const DEFAULT_TASK_MEMORY: &str = "2048";

/// Default bound on every outbound request, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Container name derived from the project name
pub fn container_name(project: &str) -> String {
    format!("{project}-api-container")
}

/// Task definition family derived from the project name
pub fn task_family(project: &str) -> String {
    format!("{project}-api-task")
}
