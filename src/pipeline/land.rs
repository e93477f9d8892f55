use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use tracing::debug;

use super::RecordProcessor;
use crate::{
    address,
    clients::{CodeResolver, LandRegistry, RecordStore},
    domain::{Domain, FieldMap, Record},
    error::ProcessError,
    transform::land::{has_meaningful_data, process, select_latest, update_fields},
    util::time::Clock,
};

pub struct LandProcessor {
    resolver: Arc<dyn CodeResolver>,
    registry: Arc<dyn LandRegistry>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl LandProcessor {
    pub fn new(
        resolver: Arc<dyn CodeResolver>,
        registry: Arc<dyn LandRegistry>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            registry,
            store,
            clock,
        }
    }

    /// Land characteristics are published for the previous calendar year.
    fn reference_year(&self) -> i32 {
        self.clock.now().year() - 1
    }
}

#[async_trait]
impl RecordProcessor for LandProcessor {
    async fn process(&self, record: &Record) -> Result<FieldMap, ProcessError> {
        let address = address::resolve(&record.address)?;
        let codes = self.resolver.resolve_codes(&record.id, &address).await?;
        let pnu = codes
            .parcel_identifier()
            .ok_or(ProcessError::ParcelIdentifier)?;

        let year = self.reference_year();
        let payload = self.registry.fetch_characteristics(&pnu, year).await?;
        let latest = select_latest(&payload.fields)
            .ok_or_else(|| ProcessError::NoDataFound(format!("no land entries for {pnu} in {year}")))?;

        let processed = process(latest);
        if !has_meaningful_data(&processed) {
            return Err(ProcessError::NoMeaningfulData);
        }

        let fields = update_fields(&processed);
        self.store
            .update(Domain::Land, &record.id, &fields)
            .await
            .map_err(|error| ProcessError::upstream(error, ProcessError::StoreWrite))?;

        debug!(record_id = %record.id, pnu = %pnu, fields = fields.len(), "land record updated");
        Ok(fields)
    }
}
