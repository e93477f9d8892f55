//! Building register (title section) lookups on the public data portal.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::AdministrativeCodes;

pub const DEFAULT_BUILDING_REGISTRY_URL: &str =
    "https://apis.data.go.kr/1613000/BldRgstHubService/getBrTitleInfo";

const PAGE_SIZE: &str = "10";

#[async_trait]
pub trait BuildingRegistry: Send + Sync {
    /// Fetches the raw title payload for the parcel.
    ///
    /// Never fails: transport and status errors degrade to [`empty_payload`].
    async fn fetch_title(&self, codes: &AdministrativeCodes) -> Value;
}

/// Payload standing in for a failed lookup; it carries no items.
#[must_use]
pub fn empty_payload() -> Value {
    json!({ "body": {} })
}

#[derive(Debug, Clone)]
pub struct BuildingRegistryConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PublicDataBuildingClient {
    client: Client,
    url: Url,
    service_key: String,
}

impl PublicDataBuildingClient {
    /// # Errors
    /// Fails when the registry URL does not parse or the HTTP client cannot be built.
    pub fn new(config: BuildingRegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build building registry HTTP client")?;
        let url = Url::parse(&config.url).context("invalid building registry URL")?;
        Ok(Self {
            client,
            url,
            service_key: config.service_key,
        })
    }

    async fn request(&self, codes: &AdministrativeCodes) -> Result<Value> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("serviceKey", &self.service_key)
            .append_pair("sigunguCd", &codes.district_code)
            .append_pair("bjdongCd", &codes.legal_dong_code)
            .append_pair("bun", &codes.address.lot_main)
            .append_pair("ji", &codes.address.lot_sub)
            .append_pair("_type", "json")
            .append_pair("numOfRows", PAGE_SIZE)
            .append_pair("pageNo", "1");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("building registry request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("building registry returned error status {}: {}", status, error_body);
        }

        response
            .json::<Value>()
            .await
            .context("failed to deserialize building registry response")
    }
}

#[async_trait]
impl BuildingRegistry for PublicDataBuildingClient {
    async fn fetch_title(&self, codes: &AdministrativeCodes) -> Value {
        match self.request(codes).await {
            Ok(payload) => {
                debug!(
                    district_code = %codes.district_code,
                    legal_dong_code = %codes.legal_dong_code,
                    "fetched building title payload"
                );
                payload
            }
            Err(error) => {
                warn!(
                    error = %format!("{error:#}"),
                    district_code = %codes.district_code,
                    legal_dong_code = %codes.legal_dong_code,
                    "building registry lookup failed; treating as empty"
                );
                empty_payload()
            }
        }
    }
}
