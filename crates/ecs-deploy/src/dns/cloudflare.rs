//! Cloudflare v4 DNS records API

use super::{DnsError, DnsOperations};
use ecs_deploy_common::defaults::DNS_TTL_SECS;
use ecs_deploy_common::{DnsRecordId, ZoneId};
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Public API endpoint
pub const API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Response envelope shared by every Cloudflare endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS client authenticated with an API token
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CloudflareClient {
    /// Create a client whose every request is bounded by `timeout`
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, DnsError> {
        Self::with_base_url(token, timeout, API_BASE_URL)
    }

    /// Create a client against a different API endpoint
    pub fn with_base_url(
        token: impl Into<String>,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, DnsError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn records_url(&self, zone: &ZoneId) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, DnsError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        parse_response(status, &body)
    }
}

/// Check the HTTP status and the envelope, then extract the result.
fn parse_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, DnsError> {
    if !status.is_success() {
        let message = serde_json::from_str::<Envelope<IgnoredAny>>(body)
            .ok()
            .filter(|e| !e.errors.is_empty())
            .map(|e| describe_errors(&e.errors))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            });
        return Err(DnsError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.success {
        return Err(DnsError::Rejected(describe_errors(&envelope.errors)));
    }
    envelope.result.ok_or(DnsError::MissingResult)
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

impl DnsOperations for CloudflareClient {
    async fn create_cname(
        &self,
        zone: &ZoneId,
        name: &str,
        target: &str,
    ) -> Result<DnsRecordId, DnsError> {
        let body = NewRecord {
            record_type: "CNAME",
            name,
            content: target,
            ttl: DNS_TTL_SECS,
            proxied: false,
        };
        let record: DnsRecord = self
            .send(self.http.post(self.records_url(zone)).json(&body))
            .await?;
        debug!(record_id = %record.id, name = %name, "Created CNAME record");
        Ok(DnsRecordId::new(record.id))
    }

    async fn find_cname(&self, zone: &ZoneId, name: &str) -> Result<Vec<DnsRecordId>, DnsError> {
        let records: Vec<DnsRecord> = self
            .send(
                self.http
                    .get(self.records_url(zone))
                    .query(&[("type", "CNAME"), ("name", name)]),
            )
            .await?;
        Ok(records.into_iter().map(|r| DnsRecordId::new(r.id)).collect())
    }

    async fn delete_record(&self, zone: &ZoneId, record: &DnsRecordId) -> Result<(), DnsError> {
        let url = format!("{}/{}", self.records_url(zone), record);
        let _: IgnoredAny = self.send(self.http.delete(url)).await?;
        Ok(())
    }
}
