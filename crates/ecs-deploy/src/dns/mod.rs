//! DNS provider operations
//!
//! The deployment points its domain at the load balancer with a CNAME
//! record; rollback finds that record by name and removes it.

pub mod cloudflare;

pub use cloudflare::CloudflareClient;

use ecs_deploy_common::{DnsRecordId, ZoneId};
use thiserror::Error;

/// DNS provider errors
#[derive(Debug, Error)]
pub enum DnsError {
    /// The request never produced a response (connection, TLS, timeout)
    #[error("DNS API request failed")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("DNS API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The provider answered but reported failure in its envelope
    #[error("DNS API rejected the request: {0}")]
    Rejected(String),

    /// The response body was not the expected JSON
    #[error("DNS API response could not be parsed")]
    Decode(#[from] serde_json::Error),

    /// A successful response carried no result
    #[error("DNS API response did not include a result")]
    MissingResult,
}

/// Trait for DNS provider operations that can be mocked in tests.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait DnsOperations: Send + Sync {
    /// Create a CNAME record `name -> target`
    async fn create_cname(
        &self,
        zone: &ZoneId,
        name: &str,
        target: &str,
    ) -> Result<DnsRecordId, DnsError>;

    /// Identifiers of CNAME records named `name`
    async fn find_cname(&self, zone: &ZoneId, name: &str) -> Result<Vec<DnsRecordId>, DnsError>;

    /// Delete a record
    async fn delete_record(&self, zone: &ZoneId, record: &DnsRecordId) -> Result<(), DnsError>;
}
