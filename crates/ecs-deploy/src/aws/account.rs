//! Credential preflight
//!
//! Deploy and update-service resolve the caller's account before their first
//! mutation, so rejected credentials never leave a half-built chain behind.

use anyhow::{Context, Result, bail};
use tracing::debug;

/// AWS account the credentials belong to
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    /// Accept exactly twelve ASCII digits
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != 12 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            bail!("STS returned a malformed account id '{raw}'");
        }
        Ok(Self(raw.to_string()))
    }
}

/// Resolve the account behind `config`'s credentials via STS.
pub async fn verify_account(config: &aws_config::SdkConfig) -> Result<AccountId> {
    let identity = aws_sdk_sts::Client::new(config)
        .get_caller_identity()
        .send()
        .await
        .context("AWS rejected the credentials, check ACCESS_KEY and SECRET_TOKEN")?;

    let account = identity
        .account()
        .context("STS GetCallerIdentity returned no account")?;
    debug!(caller = identity.arn().unwrap_or("unknown"), "Resolved caller identity");

    AccountId::parse(account)
}
