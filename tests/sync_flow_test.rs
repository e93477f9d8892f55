//! End-to-end passes through the HTTP surface over in-memory collaborators.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use parcel_sync::{
    address::NormalizedAddress,
    app::{ComponentRegistry, Components, Tuning, build_router},
    clients::{BuildingRegistry, CodeResolver, LandPayload, LandRegistry, Notifier, RecordStore},
    domain::{AdministrativeCodes, Domain, FieldMap, ParcelIdentifier, Record},
    error::ProcessError,
    observability::Telemetry,
    pipeline::{BuildingProcessor, LandProcessor, Processors},
    util::time::SystemClock,
};

#[derive(Default)]
struct MemoryStore {
    records: HashMap<Domain, Vec<Record>>,
    updates: Mutex<Vec<(Domain, String, FieldMap)>>,
}

impl MemoryStore {
    fn updated(&self) -> Vec<(Domain, String, FieldMap)> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select_by_view(&self, domain: Domain, max_records: Option<usize>) -> Result<Vec<Record>> {
        let mut records = self.records.get(&domain).cloned().unwrap_or_default();
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

/// Fails with a timeout for one district, resolves everything else.
struct FlakyResolver;

#[async_trait]
impl CodeResolver for FlakyResolver {
    async fn resolve_codes(
        &self,
        _record_id: &str,
        address: &NormalizedAddress,
    ) -> Result<AdministrativeCodes, ProcessError> {
        if address.district == "서초구" {
            return Err(ProcessError::CodeResolution(anyhow::anyhow!(
                "operation timed out"
            )));
        }
        Ok(AdministrativeCodes {
            address: address.clone(),
            district_code: "11680".into(),
            legal_dong_code: "10100".into(),
        })
    }
}

struct TitleRegistry;

#[async_trait]
impl BuildingRegistry for TitleRegistry {
    async fn fetch_title(&self, _codes: &AdministrativeCodes) -> Value {
        json!({"response": {"body": {"items": {"item": {
            "platPlc": "서울특별시 강남구 역삼동 123-4번지",
            "mainPurpsCdNm": "업무시설",
            "platArea": 1520.5,
            "grndFlrCnt": "10",
            "ugrndFlrCnt": "2"
        }}}}})
    }
}

struct CharacteristicsRegistry;

#[async_trait]
impl LandRegistry for CharacteristicsRegistry {
    async fn fetch_characteristics(
        &self,
        _pnu: &ParcelIdentifier,
        _year: i32,
    ) -> Result<LandPayload, ProcessError> {
        let field = [
            ("ldCodeNm", "서울특별시 강남구 역삼동"),
            ("mnnmSlno", "1"),
            ("lndpclAr", "330.5"),
            ("prposArea1Nm", "제3종일반주거지역"),
            ("pblntfPclnd", "12000000"),
            ("lastUpdtDt", "2024-06-01"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        Ok(LandPayload {
            total_count: 1,
            fields: vec![field],
        })
    }
}

#[derive(Default)]
struct CollectingNotifier {
    batches: Mutex<Vec<(Domain, Vec<String>)>>,
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, domain: Domain, records: &[Record]) {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((domain, records.iter().map(|r| r.id.clone()).collect()));
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    notifier: Arc<CollectingNotifier>,
}

fn harness() -> Harness {
    let mut store = MemoryStore::default();
    store.records.insert(
        Domain::Building,
        vec![Record::new("bld1", "강남구 역삼동 123-4")],
    );
    store.records.insert(
        Domain::Land,
        vec![
            Record::new("land1", "강남구 역삼동 1"),
            Record::new("land2", "서초구 서초동 1700"),
        ],
    );
    let store = Arc::new(store);
    let notifier = Arc::new(CollectingNotifier::default());
    let clock = Arc::new(SystemClock);
    let resolver = Arc::new(FlakyResolver);

    let processors = Processors {
        building: Arc::new(BuildingProcessor::new(
            resolver.clone(),
            Arc::new(TitleRegistry),
            store.clone(),
        )),
        land: Arc::new(LandProcessor::new(
            resolver,
            Arc::new(CharacteristicsRegistry),
            store.clone(),
            clock.clone(),
        )),
    };
    let registry = ComponentRegistry::assemble(
        Telemetry::without_tracing().expect("telemetry"),
        Components {
            store: store.clone(),
            processors,
            notifier: notifier.clone(),
            clock,
        },
        Tuning {
            pacing: Duration::ZERO,
            ..Tuning::default()
        },
    );

    Harness {
        app: build_router(registry),
        store,
        notifier,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.expect("request succeeds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).expect("request")).await;
    assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    serde_json::from_str(&body).expect("valid json")
}

#[tokio::test]
async fn all_jobs_write_back_and_track_failures() {
    let h = harness();

    let payload = get_json(&h.app, "/run-all-jobs").await;
    assert_eq!(payload["message"], "All jobs completed");
    assert_eq!(payload["result"]["building"]["success"], 1);
    assert_eq!(payload["result"]["land"]["total"], 2);
    assert_eq!(payload["result"]["land"]["success"], 1);
    assert_eq!(payload["result"]["land"]["failed"], 1);

    let updates = h.store.updated();
    let ids: Vec<_> = updates.iter().map(|(_, id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["bld1", "land1"]);
    let (_, _, land_fields) = &updates[1];
    assert_eq!(land_fields["용도지역"], "제3종일반주거지역");
    assert_eq!(land_fields["토지면적(㎡)"], 330.5);

    let status = get_json(&h.app, "/retry-status").await;
    assert_eq!(status["summary"]["waiting"], 1);
    assert_eq!(status["waiting"][0]["record_id"], "land2");
    assert_eq!(status["waiting"][0]["attempts"], 1);
}

#[tokio::test]
async fn transient_failures_exhaust_once_and_notify_once() {
    let h = harness();

    for _ in 0..4 {
        let payload = get_json(&h.app, "/run-land-job").await;
        assert!(payload["result"]["newly_failed"].as_array().expect("array").is_empty());
    }
    let fifth = get_json(&h.app, "/run-land-job").await;
    assert_eq!(fifth["result"]["newly_failed"][0]["id"], "land2");

    let sixth = get_json(&h.app, "/run-land-job").await;
    assert_eq!(sixth["result"]["skipped"], 1);
    assert_eq!(sixth["result"]["total"], 2);

    let batches = h
        .notifier
        .batches
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    assert_eq!(batches, vec![(Domain::Land, vec!["land2".to_string()])]);

    let (status, body) = send(
        &h.app,
        Request::post("/reset-retry/land2").body(Body::empty()).expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":true"));

    let after_reset = get_json(&h.app, "/run-land-job").await;
    assert_eq!(after_reset["result"]["skipped"], 0);
    assert_eq!(after_reset["result"]["failed"], 1);
}

#[tokio::test]
async fn metrics_reflect_completed_passes() {
    let h = harness();
    get_json(&h.app, "/run-building-job").await;

    let (status, body) = send(&h.app, Request::get("/metrics").body(Body::empty()).expect("request")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("parcel_sync_records_succeeded_total{domain=\"building\"} 1"));
}
