//! Airtable REST client for the building and land tables.
//!
//! Reads follow Airtable's `offset` pagination; writes are single-record
//! PATCHes so fields absent from the payload are left as they are.
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{ADDRESS_FIELD, Domain, FieldMap, Record};

/// Source of records and sink for their normalized fields.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Lists records in the domain's configured view, up to `max_records` when given.
    async fn select_by_view(&self, domain: Domain, max_records: Option<usize>) -> Result<Vec<Record>>;

    /// Writes the given fields onto one record.
    async fn update(&self, domain: Domain, record_id: &str, fields: &FieldMap) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub view: String,
}

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_url: String,
    pub base_id: String,
    pub access_token: String,
    pub building: TableRef,
    pub land: TableRef,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<AirtableRecord>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: FieldMap,
}

impl From<AirtableRecord> for Record {
    fn from(record: AirtableRecord) -> Self {
        let address = match record.fields.get(ADDRESS_FIELD) {
            Some(Value::String(address)) => address.clone(),
            _ => String::new(),
        };
        Record::new(record.id, address)
    }
}

#[derive(Debug, Clone)]
pub struct AirtableClient {
    client: Client,
    base_url: Url,
    base_id: String,
    access_token: String,
    building: TableRef,
    land: TableRef,
}

impl AirtableClient {
    /// # Errors
    /// Fails when the API URL does not parse or the HTTP client cannot be built.
    pub fn new(config: AirtableConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build Airtable HTTP client")?;
        let base_url = Url::parse(&config.api_url).context("invalid Airtable API URL")?;

        Ok(Self {
            client,
            base_url,
            base_id: config.base_id,
            access_token: config.access_token,
            building: config.building,
            land: config.land,
        })
    }

    fn table(&self, domain: Domain) -> &TableRef {
        match domain {
            Domain::Building => &self.building,
            Domain::Land => &self.land,
        }
    }

    fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow!("Airtable API URL cannot be a base"))?;
            segments.pop_if_empty().push("v0").push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        table: &TableRef,
        max_records: Option<usize>,
        offset: Option<&str>,
    ) -> Result<ListResponse> {
        let mut url = self.table_url(&table.table, None)?;
        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("view", &table.view);
            if let Some(max) = max_records {
                query_pairs.append_pair("maxRecords", &max.to_string());
            }
            if let Some(offset) = offset {
                query_pairs.append_pair("offset", offset);
            }
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Airtable list request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Airtable returned error status {}: {}", status, error_body);
        }

        response
            .json::<ListResponse>()
            .await
            .context("failed to deserialize Airtable list response")
    }
}

#[async_trait]
impl RecordStore for AirtableClient {
    async fn select_by_view(&self, domain: Domain, max_records: Option<usize>) -> Result<Vec<Record>> {
        let table = self.table(domain);
        let mut records: Vec<Record> = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self
                .fetch_page(table, max_records, offset.as_deref())
                .await
                .with_context(|| format!("failed to list {domain} records"))?;
            records.extend(page.records.into_iter().map(Record::from));

            debug!(domain = %domain, total = records.len(), "fetched Airtable page");

            if let Some(max) = max_records.filter(|max| records.len() >= *max) {
                records.truncate(max);
                break;
            }
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn update(&self, domain: Domain, record_id: &str, fields: &FieldMap) -> Result<()> {
        let table = self.table(domain);
        let url = self.table_url(&table.table, Some(record_id))?;

        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .context("Airtable update request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Airtable returned error status {}: {}", status, error_body);
        }

        debug!(domain = %domain, record_id, fields = fields.len(), "updated Airtable record");
        Ok(())
    }
}
