//! Error taxonomy.
//!
//! One enum per domain, aggregated into [`GcError`]. The admin surface
//! reports `GcError::kind()` verbatim in its JSON error body, so variant
//! mapping there is part of the wire contract.

mod cdc_error;
mod config_error;
mod cycle_error;
mod registry_error;
mod store_error;
mod vault_error;

pub use cdc_error::CdcError;
pub use config_error::ConfigError;
pub use cycle_error::{CycleError, RestoreError};
pub use registry_error::RegistryError;
pub use store_error::{StoreError, VerifierError};
pub use vault_error::VaultError;

/// Result alias used across the workspace.
pub type GcResult<T> = Result<T, GcError>;

/// Top-level error aggregating every domain.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Cdc(#[from] CdcError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Restore(#[from] RestoreError),
}

impl GcError {
    /// Stable taxonomy tag for the admin JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            GcError::Config(_) => "ConfigurationError",
            GcError::Registry(RegistryError::Underflow { .. }) => "RegistryUnderflow",
            GcError::Registry(_) => "RegistryError",
            GcError::Vault(VaultError::Conflict { .. }) => "VaultConflict",
            GcError::Vault(VaultError::AlreadyRestored { .. }) => "AlreadyRestored",
            GcError::Vault(_) => "VaultError",
            GcError::Cdc(_) => "CDCError",
            GcError::Store(_) => "StoreError",
            GcError::Verifier(_) => "VerifierError",
            GcError::Cycle(CycleError::Busy) => "CycleBusy",
            GcError::Cycle(CycleError::Cancelled) => "Cancelled",
            GcError::Cycle(CycleError::Backup { .. }) => "BackupError",
            GcError::Cycle(_) => "CycleError",
            GcError::Restore(_) => "RestoreError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_taxonomy_variants() {
        let e: GcError = RegistryError::Underflow {
            key: "k".into(),
        }
        .into();
        assert_eq!(e.kind(), "RegistryUnderflow");

        let e: GcError = CycleError::Busy.into();
        assert_eq!(e.kind(), "CycleBusy");

        let e: GcError = VaultError::AlreadyRestored {
            operation_id: "01H".into(),
            key: "a/b".into(),
        }
        .into();
        assert_eq!(e.kind(), "AlreadyRestored");
    }
}
