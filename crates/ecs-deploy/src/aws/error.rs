//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// AWS error categories for deploy and rollback logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (already gone during rollback)
    #[error("Resource not found: {message}")]
    NotFound { code: String, message: String },

    /// Resource already exists (name collision on create)
    #[error("Resource already exists: {message}")]
    AlreadyExists { code: String, message: String },

    /// The API refuses the operation on this resource (e.g. a listener's default rule)
    #[error("Operation not permitted: {message}")]
    NotPermitted { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// The operation did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// A successful response lacked a field the caller needs
    #[error("Response did not include {0}")]
    MalformedResponse(&'static str),

    /// A request could not be built from the given values
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Check if the API refused the operation outright
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, AwsError::NotPermitted { .. })
    }

    /// The AWS error code, when the service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::NotFound { code, .. } | AwsError::AlreadyExists { code, .. } => Some(code),
            AwsError::NotPermitted { .. } => Some("OperationNotPermitted"),
            AwsError::Sdk { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::Throttled => suggestion_for_code("Throttling"),
            AwsError::Timeout => {
                Some("Raise REQUEST_TIMEOUT_SECS if the AWS endpoint is slow to respond.")
            }
            _ => self.code().and_then(suggestion_for_code),
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    // ELBv2
    "TargetGroupNotFound",
    "RuleNotFound",
    "ListenerNotFound",
    "LoadBalancerNotFound",
    // ECS
    "ServiceNotFoundException",
    "ServiceNotActiveException",
    "ClusterNotFoundException",
    // CloudWatch Logs
    "ResourceNotFoundException",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "DuplicateTargetGroupName",
    "ResourceAlreadyExistsException",
];

/// Known AWS error codes for refused operations
const NOT_PERMITTED_CODES: &[&str] = &["OperationNotPermitted"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            code: c.to_string(),
            message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists {
            code: c.to_string(),
            message,
        },
        Some(c) if NOT_PERMITTED_CODES.contains(&c) => AwsError::NotPermitted { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify an SDK operation error from any AWS service client.
///
/// Service errors carry a code and message through `ProvideErrorMetadata`.
/// Errors raised before a response arrives (timeouts, connection failures)
/// have no code and are described with their full source chain.
pub fn classify_sdk_error<E, R>(err: &SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if matches!(err, SdkError::TimeoutError(_)) {
        return AwsError::Timeout;
    }

    match err.code() {
        Some(code) => {
            let context = DisplayErrorContext(err).to_string();
            classify_aws_error(Some(code), Some(err.message().unwrap_or(&context)))
        }
        None => AwsError::Sdk {
            code: None,
            message: DisplayErrorContext(err).to_string(),
        },
    }
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "PriorityInUse",
        "Another rule claimed this listener priority; run the deploy again.",
    ),
    (
        "DuplicateTargetGroupName",
        "A target group with this project name exists; roll back the previous deployment first.",
    ),
    (
        "AccessDenied",
        "Check the IAM permissions attached to ACCESS_KEY.",
    ),
    (
        "AccessDeniedException",
        "Check the IAM permissions attached to ACCESS_KEY.",
    ),
    (
        "InvalidClientTokenId",
        "ACCESS_KEY is not a valid access key id.",
    ),
    (
        "UnrecognizedClientException",
        "ACCESS_KEY is not a valid access key id.",
    ),
    (
        "SignatureDoesNotMatch",
        "SECRET_TOKEN does not match ACCESS_KEY.",
    ),
    (
        "ClusterNotFoundException",
        "Check ECS_CLUSTER and AWS_REGION.",
    ),
    (
        "Throttling",
        "AWS API rate limit hit. Wait a moment and run the command again.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<&'static str> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
}
