//! Land-characteristics lookups on the VWorld open API (XML responses).
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use roxmltree::{Document, Node};
use tracing::debug;

use crate::{domain::ParcelIdentifier, error::ProcessError, transform::land::LandField};

pub const DEFAULT_LAND_REGISTRY_URL: &str = "http://api.vworld.kr/ned/data/getLandCharacteristics";
pub const DEFAULT_VWORLD_DOMAIN: &str = "localhost";

#[derive(Debug, Clone, PartialEq)]
pub struct LandPayload {
    pub total_count: u64,
    pub fields: Vec<LandField>,
}

#[async_trait]
pub trait LandRegistry: Send + Sync {
    /// Fetches land characteristics for the parcel in the given reference year.
    ///
    /// # Errors
    /// [`ProcessError::RegistryUnavailable`] for transport, status and XML
    /// failures; [`ProcessError::NoDataFound`] when the year has no entries.
    async fn fetch_characteristics(
        &self,
        pnu: &ParcelIdentifier,
        year: i32,
    ) -> Result<LandPayload, ProcessError>;
}

#[derive(Debug, Clone)]
pub struct LandRegistryConfig {
    pub url: String,
    pub api_key: String,
    pub domain: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct VworldLandClient {
    client: Client,
    url: Url,
    api_key: String,
    domain: String,
}

impl VworldLandClient {
    /// # Errors
    /// Fails when the registry URL does not parse or the HTTP client cannot be built.
    pub fn new(config: LandRegistryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build land registry HTTP client")?;
        let url = Url::parse(&config.url).context("invalid land registry URL")?;
        Ok(Self {
            client,
            url,
            api_key: config.api_key,
            domain: config.domain,
        })
    }

    async fn request(&self, pnu: &ParcelIdentifier, year: i32) -> Result<String> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("domain", &self.domain)
            .append_pair("pnu", pnu.as_str())
            .append_pair("stdrYear", &year.to_string())
            .append_pair("format", "xml")
            .append_pair("numOfRows", "10")
            .append_pair("pageNo", "1");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("land registry request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("land registry returned error status {}: {}", status, error_body);
        }

        response
            .text()
            .await
            .context("failed to read land registry response")
    }
}

#[async_trait]
impl LandRegistry for VworldLandClient {
    async fn fetch_characteristics(
        &self,
        pnu: &ParcelIdentifier,
        year: i32,
    ) -> Result<LandPayload, ProcessError> {
        let body = self
            .request(pnu, year)
            .await
            .map_err(|error| ProcessError::upstream(error, ProcessError::RegistryUnavailable))?;
        let payload = parse_payload(&body)
            .map_err(|error| ProcessError::upstream(error, ProcessError::RegistryUnavailable))?;

        if payload.total_count == 0 || payload.fields.is_empty() {
            return Err(ProcessError::NoDataFound(format!(
                "no land characteristics for {pnu} in {year}"
            )));
        }

        debug!(pnu = %pnu, year, total_count = payload.total_count, "fetched land characteristics");
        Ok(payload)
    }
}

/// Parses `<response><totalCount/><fields><field>…</field></fields></response>`.
///
/// A missing or unparsable `totalCount` reads as zero.
pub(crate) fn parse_payload(xml: &str) -> Result<LandPayload> {
    let document = Document::parse(xml).context("invalid land registry XML")?;
    let root = document.root_element();

    let total_count = child_text(root, "totalCount")
        .and_then(|text| text.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let fields = root
        .children()
        .filter(|node| node.tag_name().name() == "fields")
        .flat_map(|fields| fields.children())
        .filter(|node| node.tag_name().name() == "field")
        .map(parse_field)
        .collect();

    Ok(LandPayload {
        total_count,
        fields,
    })
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.tag_name().name() == name)
        .and_then(|child| child.text())
}

fn parse_field(node: Node<'_, '_>) -> LandField {
    node.children()
        .filter(Node::is_element)
        .map(|child| {
            (
                child.tag_name().name().to_string(),
                child.text().unwrap_or_default().trim().to_string(),
            )
        })
        .collect()
}
