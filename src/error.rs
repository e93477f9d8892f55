use thiserror::Error;

use crate::{
    address::AddressError,
    scheduler::ledger::Attempt,
    util::error::{PermanentCause, classify_error},
};

/// Everything that can go wrong while processing a single record.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("address parsing failed: {0}")]
    Address(#[from] AddressError),
    #[error("parcel identifier could not be built from the resolved codes")]
    ParcelIdentifier,
    #[error("administrative codes not found in resolution response")]
    CodesNotFound,
    #[error("code resolution failed: {0:#}")]
    CodeResolution(anyhow::Error),
    #[error("registry unavailable: {0:#}")]
    RegistryUnavailable(anyhow::Error),
    #[error("no registry data found: {0}")]
    NoDataFound(String),
    #[error("parcel has no registry record: {0}")]
    NotInRegistry(String),
    #[error("no meaningful data in registry payload")]
    NoMeaningfulData,
    #[error("store update failed: {0:#}")]
    StoreWrite(anyhow::Error),
    #[error("permanent upstream failure ({}): {message}", cause.as_str())]
    PermanentUpstream {
        cause: PermanentCause,
        message: String,
    },
}

impl ProcessError {
    /// Wraps a failure from an upstream call. Errors whose context chain
    /// matches the denylist become [`ProcessError::PermanentUpstream`];
    /// everything else goes through `transient`.
    #[must_use]
    pub fn upstream(error: anyhow::Error, transient: fn(anyhow::Error) -> ProcessError) -> Self {
        match classify_error(&error) {
            Some(cause) => ProcessError::PermanentUpstream {
                cause,
                message: format!("{error:#}"),
            },
            None => transient(error),
        }
    }

    /// Short machine-readable tag for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::Address(error) => error.reason(),
            ProcessError::ParcelIdentifier => "parcel_identifier",
            ProcessError::CodesNotFound => "codes_not_found",
            ProcessError::CodeResolution(_) => "code_resolution",
            ProcessError::RegistryUnavailable(_) => "registry_unavailable",
            ProcessError::NoDataFound(_) => "no_data_found",
            ProcessError::NotInRegistry(_) => "not_in_registry",
            ProcessError::NoMeaningfulData => "no_meaningful_data",
            ProcessError::StoreWrite(_) => "store_write",
            ProcessError::PermanentUpstream { .. } => "permanent_upstream",
        }
    }

    /// The classified upstream cause, if retrying cannot help.
    #[must_use]
    pub fn permanent_cause(&self) -> Option<PermanentCause> {
        match self {
            ProcessError::PermanentUpstream { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProcessError::Address(_)
                | ProcessError::ParcelIdentifier
                | ProcessError::NotInRegistry(_)
        ) || self.permanent_cause().is_some()
    }

    /// How this failure should be recorded in the retry ledger.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        if self.is_permanent() {
            Attempt::Permanent
        } else {
            Attempt::Transient
        }
    }
}
