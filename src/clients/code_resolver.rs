//! Resolves a normalized lot address to district and legal-dong codes through
//! the lookup script endpoint.
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    address::NormalizedAddress,
    domain::AdministrativeCodes,
    error::ProcessError,
};

#[async_trait]
pub trait CodeResolver: Send + Sync {
    /// # Errors
    /// [`ProcessError::CodesNotFound`] when the response lacks either code,
    /// [`ProcessError::CodeResolution`] for transport and status failures,
    /// [`ProcessError::PermanentUpstream`] when such a failure matches the denylist.
    async fn resolve_codes(
        &self,
        record_id: &str,
        address: &NormalizedAddress,
    ) -> Result<AdministrativeCodes, ProcessError>;
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "시군구")]
    district: &'a str,
    #[serde(rename = "법정동")]
    legal_dong: &'a str,
    #[serde(rename = "번")]
    lot_main: &'a str,
    #[serde(rename = "지")]
    lot_sub: &'a str,
    id: &'a str,
}

#[derive(Debug, Clone)]
pub struct ScriptCodeResolver {
    client: Client,
    url: Url,
}

impl ScriptCodeResolver {
    /// # Errors
    /// Fails when the script URL does not parse or the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build code resolver HTTP client")?;
        let url = Url::parse(url).context("invalid code resolver URL")?;
        Ok(Self { client, url })
    }

    async fn lookup(&self, request: &LookupRequest<'_>) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&[request])
            .send()
            .await
            .context("code lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("code lookup returned error status {}: {}", status, error_body);
        }

        response
            .json::<Value>()
            .await
            .context("failed to deserialize code lookup response")
    }
}

#[async_trait]
impl CodeResolver for ScriptCodeResolver {
    async fn resolve_codes(
        &self,
        record_id: &str,
        address: &NormalizedAddress,
    ) -> Result<AdministrativeCodes, ProcessError> {
        let request = LookupRequest {
            district: &address.district,
            legal_dong: &address.legal_dong,
            lot_main: &address.lot_main,
            lot_sub: &address.lot_sub,
            id: record_id,
        };
        let payload = self
            .lookup(&request)
            .await
            .map_err(|error| ProcessError::upstream(error, ProcessError::CodeResolution))?;

        let Some((district_code, legal_dong_code)) = extract_codes(&payload) else {
            warn!(record_id, response = %payload, "administrative codes missing from lookup response");
            return Err(ProcessError::CodesNotFound);
        };

        debug!(record_id, district_code, legal_dong_code, "resolved administrative codes");
        Ok(AdministrativeCodes {
            address: address.clone(),
            district_code,
            legal_dong_code,
        })
    }
}

/// Reads both codes from an array-of-one or a bare object.
fn extract_codes(payload: &Value) -> Option<(String, String)> {
    let entry = match payload {
        Value::Array(entries) => entries.first()?,
        Value::Object(_) => payload,
        _ => return None,
    };
    Some((
        code_text(entry.get("시군구코드")?)?,
        code_text(entry.get("법정동코드")?)?,
    ))
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
