use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::{
    api,
    clients::{
        AirtableClient, AirtableConfig, BuildingRegistryConfig, LandRegistryConfig, LogNotifier,
        MailRelayConfig, MailRelayNotifier, Notifier, PublicDataBuildingClient, RecordStore,
        ScriptCodeResolver, TableRef, VworldLandClient,
    },
    config::Config,
    observability::Telemetry,
    pipeline::{BuildingProcessor, LandProcessor, Processors},
    scheduler::{
        cadence::IntervalCadence,
        daemon::SyncDaemon,
        gate::{DEFAULT_SAMPLE_SIZE, SchedulerGate},
        jobs::{DEFAULT_PACING, JobOrchestrator},
        ledger::{RetryLedger, RetryPolicy},
    },
    util::time::{Clock, SystemClock},
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn orchestrator(&self) -> &JobOrchestrator {
        &self.registry.orchestrator
    }

    pub(crate) fn ledger(&self) -> &RetryLedger {
        self.registry.orchestrator.ledger()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.registry.clock.as_ref()
    }
}

/// External collaborators the service is assembled from.
pub struct Components {
    pub store: Arc<dyn RecordStore>,
    pub processors: Processors,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Retry, pacing and scheduling knobs.
#[derive(Debug, Clone, Copy)]
pub struct Tuning {
    pub retry_policy: RetryPolicy,
    pub pacing: Duration,
    pub schedule_interval: Duration,
    pub gate_sample_size: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            pacing: DEFAULT_PACING,
            schedule_interval: Duration::from_secs(60),
            gate_sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

pub struct ComponentRegistry {
    telemetry: Telemetry,
    store: Arc<dyn RecordStore>,
    ledger: Arc<RetryLedger>,
    orchestrator: Arc<JobOrchestrator>,
    clock: Arc<dyn Clock>,
    tuning: Tuning,
}

impl ComponentRegistry {
    /// Wires the shared ledger, orchestrator and telemetry around the given collaborators.
    #[must_use]
    pub fn assemble(telemetry: Telemetry, components: Components, tuning: Tuning) -> Self {
        let Components {
            store,
            processors,
            notifier,
            clock,
        } = components;

        let ledger = Arc::new(RetryLedger::new(tuning.retry_policy, Arc::clone(&clock)));
        let orchestrator = Arc::new(
            JobOrchestrator::new(
                Arc::clone(&store),
                processors,
                Arc::clone(&ledger),
                notifier,
                Arc::clone(telemetry.metrics()),
                Arc::clone(&clock),
            )
            .with_pacing(tuning.pacing),
        );

        Self {
            telemetry,
            store,
            ledger,
            orchestrator,
            clock,
            tuning,
        }
    }

    /// Builds the production clients from configuration.
    ///
    /// # Errors
    /// Fails when telemetry cannot be initialized or a client cannot be built.
    pub fn build(config: &Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timeout = config.registry_timeout();

        let store: Arc<dyn RecordStore> = Arc::new(
            AirtableClient::new(AirtableConfig {
                api_url: config.airtable_api_url().to_string(),
                base_id: config.airtable_base_id().to_string(),
                access_token: config.airtable_access_token().to_string(),
                building: TableRef {
                    table: config.building_table().to_string(),
                    view: config.building_view().to_string(),
                },
                land: TableRef {
                    table: config.land_table().to_string(),
                    view: config.land_view().to_string(),
                },
                timeout,
            })
            .context("failed to build Airtable client")?,
        );
        let resolver = Arc::new(
            ScriptCodeResolver::new(config.code_resolver_url(), timeout)
                .context("failed to build code resolver")?,
        );
        let building_registry = Arc::new(PublicDataBuildingClient::new(BuildingRegistryConfig {
            url: config.building_registry_url().to_string(),
            service_key: config.public_api_key().to_string(),
            timeout,
        })?);
        let land_registry = Arc::new(VworldLandClient::new(LandRegistryConfig {
            url: config.land_registry_url().to_string(),
            api_key: config.vworld_api_key().to_string(),
            domain: config.vworld_domain().to_string(),
            timeout,
        })?);

        let processors = Processors {
            building: Arc::new(
                BuildingProcessor::new(resolver.clone(), building_registry, Arc::clone(&store))
                    .with_no_data_permanent(config.building_no_data_permanent()),
            ),
            land: Arc::new(LandProcessor::new(
                resolver,
                land_registry,
                Arc::clone(&store),
                Arc::clone(&clock),
            )),
        };

        let notifier: Arc<dyn Notifier> = match config.mail() {
            Some(mail) => Arc::new(
                MailRelayNotifier::new(
                    MailRelayConfig {
                        url: mail.relay_url.clone(),
                        from: mail.from.clone(),
                        to: mail.to.clone(),
                        admin_url: config.service_admin_url().map(str::to_string),
                        max_attempts: config.max_retry_attempts(),
                        timeout,
                    },
                    Arc::clone(&clock),
                )
                .context("failed to build mail relay notifier")?,
            ),
            None => {
                info!("MAIL_RELAY_URL not set; failure notifications go to the log only");
                Arc::new(LogNotifier::new(config.max_retry_attempts()))
            }
        };

        let tuning = Tuning {
            retry_policy: RetryPolicy {
                max_attempts: config.max_retry_attempts(),
                reset_after_days: config.retry_reset_days(),
            },
            pacing: config.pacing(),
            schedule_interval: config.schedule_interval(),
            gate_sample_size: config.gate_sample_size(),
        };

        Ok(Self::assemble(
            telemetry,
            Components {
                store,
                processors,
                notifier,
                clock,
            },
            tuning,
        ))
    }

    /// The recurring trigger, sharing this registry's ledger and orchestrator.
    #[must_use]
    pub fn sync_daemon(&self) -> SyncDaemon {
        let gate = SchedulerGate::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            self.tuning.gate_sample_size,
        );
        SyncDaemon::new(
            Arc::clone(&self.orchestrator),
            gate,
            IntervalCadence::new(self.tuning.schedule_interval),
            Arc::clone(self.telemetry.metrics()),
            Arc::clone(&self.clock),
        )
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
