pub mod airtable;
pub mod building_registry;
pub mod code_resolver;
pub mod land_registry;
pub mod notifier;

pub use airtable::{AirtableClient, AirtableConfig, RecordStore, TableRef};
pub use building_registry::{BuildingRegistry, BuildingRegistryConfig, PublicDataBuildingClient};
pub use code_resolver::{CodeResolver, ScriptCodeResolver};
pub use land_registry::{LandPayload, LandRegistry, LandRegistryConfig, VworldLandClient};
pub use notifier::{LogNotifier, MailRelayConfig, MailRelayNotifier, Notifier};
