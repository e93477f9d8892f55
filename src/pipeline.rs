//! Per-record processing chains: address → codes → registry → transform → write.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Domain, FieldMap, Record};
use crate::error::ProcessError;

pub mod building;
pub mod land;

pub use building::BuildingProcessor;
pub use land::LandProcessor;

/// Runs one record through its domain's full chain, including the write-back.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    /// Returns the fields written to the store.
    ///
    /// # Errors
    /// Any [`ProcessError`]; the caller decides how it is recorded.
    async fn process(&self, record: &Record) -> Result<FieldMap, ProcessError>;
}

/// The processors the orchestrator drives, one per domain.
#[derive(Clone)]
pub struct Processors {
    pub building: Arc<dyn RecordProcessor>,
    pub land: Arc<dyn RecordProcessor>,
}

impl Processors {
    #[must_use]
    pub fn get(&self, domain: Domain) -> &Arc<dyn RecordProcessor> {
        match domain {
            Domain::Building => &self.building,
            Domain::Land => &self.land,
        }
    }
}
