//! Resource tag keys and values
//!
//! ## Tag Schema
//!
//! | Resource | Tag Key | Value |
//! |----------|---------|-------|
//! | Listener rule | `Name` | Domain name the rule matches |
//! | Task definition | `Role` | `application` |
//! | Task definition | `Project` | Project name |
//! | Task definition | `Environment` | `production` |

/// Tag key naming a listener rule after its domain
pub const TAG_NAME: &str = "Name";

/// Tag key for the workload role
pub const TAG_ROLE: &str = "Role";

/// Tag value for the workload role
pub const TAG_ROLE_VALUE: &str = "application";

/// Tag key for the owning project
pub const TAG_PROJECT: &str = "Project";

/// Tag key for the deployment environment
pub const TAG_ENVIRONMENT: &str = "Environment";

/// Tag value for the deployment environment
pub const TAG_ENVIRONMENT_VALUE: &str = "production";

/// Tags applied to every registered task definition
pub fn task_definition_tags(project: &str) -> Vec<(String, String)> {
    vec![
        (TAG_ROLE.to_string(), TAG_ROLE_VALUE.to_string()),
        (TAG_PROJECT.to_string(), project.to_string()),
        (TAG_ENVIRONMENT.to_string(), TAG_ENVIRONMENT_VALUE.to_string()),
    ]
}
