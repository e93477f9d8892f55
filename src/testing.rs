//! In-memory collaborators for unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    address::NormalizedAddress,
    app::{ComponentRegistry, Components, Tuning},
    clients::{BuildingRegistry, CodeResolver, LandPayload, LandRegistry, Notifier, RecordStore},
    domain::{AdministrativeCodes, Domain, FieldMap, ParcelIdentifier, Record},
    error::ProcessError,
    observability::Telemetry,
    pipeline::{BuildingProcessor, LandProcessor, Processors},
    transform::land::LandField,
    util::time::Clock,
};

#[derive(Default)]
pub(crate) struct FakeStore {
    records: Mutex<HashMap<Domain, Vec<Record>>>,
    pub(crate) updates: Mutex<Vec<(Domain, String, FieldMap)>>,
    pub(crate) fail_select: Mutex<bool>,
    pub(crate) select_calls: Mutex<Vec<(Domain, Option<usize>)>>,
}

impl FakeStore {
    pub(crate) fn with(domain: Domain, records: Vec<Record>) -> Self {
        let store = Self::default();
        store.set(domain, records);
        store
    }

    pub(crate) fn set(&self, domain: Domain, records: Vec<Record>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain, records);
    }

    pub(crate) fn updated_ids(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn select_by_view(&self, domain: Domain, max_records: Option<usize>) -> Result<Vec<Record>> {
        self.select_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((domain, max_records));
        if *self.fail_select.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(anyhow!("store unavailable"));
        }
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&domain)
            .cloned()
            .unwrap_or_default();
        if let Some(max) = max_records {
            records.truncate(max);
        }
        Ok(records)
    }

    async fn update(&self, domain: Domain, record_id: &str, fields: &FieldMap) -> Result<()> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((domain, record_id.to_string(), fields.clone()));
        Ok(())
    }
}

/// Resolves every address to fixed Gangnam codes; unknown districts fail.
#[derive(Default)]
pub(crate) struct FakeResolver {
    calls: AtomicUsize,
}

impl FakeResolver {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeResolver for FakeResolver {
    async fn resolve_codes(
        &self,
        _record_id: &str,
        address: &NormalizedAddress,
    ) -> Result<AdministrativeCodes, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if address.district == "없는구" {
            return Err(ProcessError::CodeResolution(anyhow!("operation timed out")));
        }
        Ok(AdministrativeCodes {
            address: address.clone(),
            district_code: "11680".into(),
            legal_dong_code: "10100".into(),
        })
    }
}

pub(crate) struct FakeBuildingRegistry {
    pub(crate) payload: Value,
}

impl FakeBuildingRegistry {
    pub(crate) fn with_item() -> Self {
        Self {
            payload: json!({"response": {"body": {"items": {"item": [{
                "platPlc": "서울특별시 강남구 역삼동 123-4번지",
                "mainPurpsCdNm": "업무시설",
                "platArea": 1520.5,
                "grndFlrCnt": "10",
                "ugrndFlrCnt": "2"
            }]}}}}),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            payload: json!({"body": {}}),
        }
    }
}

#[async_trait]
impl BuildingRegistry for FakeBuildingRegistry {
    async fn fetch_title(&self, _codes: &AdministrativeCodes) -> Value {
        self.payload.clone()
    }
}

pub(crate) struct FakeLandRegistry {
    pub(crate) fields: Vec<LandField>,
    pub(crate) years: Mutex<Vec<i32>>,
}

impl FakeLandRegistry {
    pub(crate) fn new(fields: Vec<LandField>) -> Self {
        Self {
            fields,
            years: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LandRegistry for FakeLandRegistry {
    async fn fetch_characteristics(
        &self,
        pnu: &ParcelIdentifier,
        year: i32,
    ) -> Result<LandPayload, ProcessError> {
        self.years.lock().unwrap_or_else(PoisonError::into_inner).push(year);
        if self.fields.is_empty() {
            return Err(ProcessError::NoDataFound(format!("{pnu} {year}")));
        }
        Ok(LandPayload {
            total_count: self.fields.len() as u64,
            fields: self.fields.clone(),
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) batches: Mutex<Vec<(Domain, Vec<String>)>>,
}

impl RecordingNotifier {
    pub(crate) fn batches(&self) -> Vec<(Domain, Vec<String>)> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, domain: Domain, records: &[Record]) {
        let ids = records.iter().map(|record| record.id.clone()).collect();
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((domain, ids));
    }
}

pub(crate) fn land_field(pairs: &[(&str, &str)]) -> LandField {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

/// A registry over the in-memory fakes with pacing disabled.
pub(crate) fn registry(store: Arc<FakeStore>, clock: Arc<dyn Clock>) -> ComponentRegistry {
    let processors = Processors {
        building: Arc::new(BuildingProcessor::new(
            Arc::new(FakeResolver::default()),
            Arc::new(FakeBuildingRegistry::with_item()),
            store.clone(),
        )),
        land: Arc::new(LandProcessor::new(
            Arc::new(FakeResolver::default()),
            Arc::new(FakeLandRegistry::new(vec![land_field(&[
                ("lndpclAr", "120.0"),
                ("pblntfPclnd", "5000000"),
            ])])),
            store.clone(),
            Arc::clone(&clock),
        )),
    };
    ComponentRegistry::assemble(
        Telemetry::without_tracing().expect("telemetry"),
        Components {
            store,
            processors,
            notifier: Arc::new(RecordingNotifier::default()),
            clock,
        },
        Tuning {
            pacing: Duration::ZERO,
            ..Tuning::default()
        },
    )
}
