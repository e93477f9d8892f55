use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::RecordProcessor;
use crate::{
    address,
    clients::{BuildingRegistry, CodeResolver, RecordStore},
    domain::{Domain, FieldMap, Record},
    error::ProcessError,
    transform::building::{extract_items, has_meaningful_data, map_field_names, process, update_fields},
};

pub struct BuildingProcessor {
    resolver: Arc<dyn CodeResolver>,
    registry: Arc<dyn BuildingRegistry>,
    store: Arc<dyn RecordStore>,
    no_data_permanent: bool,
}

impl BuildingProcessor {
    pub fn new(
        resolver: Arc<dyn CodeResolver>,
        registry: Arc<dyn BuildingRegistry>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            resolver,
            registry,
            store,
            no_data_permanent: false,
        }
    }

    /// Treat "registry has no items" as permanent instead of retrying it.
    #[must_use]
    pub fn with_no_data_permanent(mut self, permanent: bool) -> Self {
        self.no_data_permanent = permanent;
        self
    }
}

#[async_trait]
impl RecordProcessor for BuildingProcessor {
    async fn process(&self, record: &Record) -> Result<FieldMap, ProcessError> {
        let address = address::resolve(&record.address)?;
        let codes = self.resolver.resolve_codes(&record.id, &address).await?;
        let payload = self.registry.fetch_title(&codes).await;

        let Some(item) = extract_items(&payload).into_iter().next() else {
            let detail = format!(
                "no building title for {} {}",
                codes.district_code, codes.legal_dong_code
            );
            warn!(record_id = %record.id, permanent = self.no_data_permanent, "building registry returned no items");
            return Err(if self.no_data_permanent {
                ProcessError::NotInRegistry(detail)
            } else {
                ProcessError::NoDataFound(detail)
            });
        };

        let mapped = map_field_names(process(&item));
        if !has_meaningful_data(&mapped) {
            return Err(ProcessError::NoMeaningfulData);
        }

        let fields = update_fields(&mapped);
        self.store
            .update(Domain::Building, &record.id, &fields)
            .await
            .map_err(|error| ProcessError::upstream(error, ProcessError::StoreWrite))?;

        debug!(record_id = %record.id, fields = fields.len(), "building record updated");
        Ok(fields)
    }
}
