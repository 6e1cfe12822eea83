//! CloudWatch Logs operations

use super::context::{AwsContext, FromAwsContext};
use super::error::{AwsError, classify_sdk_error};
use tracing::debug;

/// Trait for CloudWatch Logs operations that can be mocked in tests.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait LogsOperations: Send + Sync {
    /// Names of all log groups starting with `prefix`
    async fn list_log_groups(&self, prefix: &str) -> Result<Vec<String>, AwsError>;

    /// Create a log group
    async fn create_log_group(&self, name: &str) -> Result<(), AwsError>;

    /// Set how long the log group keeps events
    async fn put_retention_policy(&self, name: &str, days: i32) -> Result<(), AwsError>;
}

/// CloudWatch Logs client wrapper
pub struct LogsClient {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl FromAwsContext for LogsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.logs_client(),
        }
    }
}

impl LogsOperations for LogsClient {
    async fn list_log_groups(&self, prefix: &str) -> Result<Vec<String>, AwsError> {
        let mut names = Vec::new();
        let mut next_token = None;

        loop {
            let page = self
                .client
                .describe_log_groups()
                .log_group_name_prefix(prefix)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            names.extend(
                page.log_groups()
                    .iter()
                    .filter_map(|g| g.log_group_name())
                    .map(str::to_string),
            );

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(prefix = %prefix, count = names.len(), "Listed log groups");
        Ok(names)
    }

    async fn create_log_group(&self, name: &str) -> Result<(), AwsError> {
        self.client
            .create_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> Result<(), AwsError> {
        self.client
            .put_retention_policy()
            .log_group_name(name)
            .retention_in_days(days)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }
}
