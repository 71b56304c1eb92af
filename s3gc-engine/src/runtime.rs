//! GcRuntime — owns every store and background task.
//!
//! `initialize` opens the registry and vault, wires the CDC ingester and
//! the optional scheduler; `shutdown` cancels both, letting the ingester
//! flush its final batch and checkpoint before connections close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use s3gc_core::config::GcConfig;
use s3gc_core::errors::{CycleError, GcResult};
use s3gc_core::models::{
    CycleReport, GcMetrics, HealthReport, OperationId, OperationIdGenerator, RestoreReport,
    StatusSummary,
};
use s3gc_core::traits::{ICdcConnector, IObjectStore, IReferenceVerifier};
use s3gc_cdc::Ingester;
use s3gc_registry::RegistryEngine;
use s3gc_vault::VaultStore;

use crate::cycle::{self, CycleDeps};
use crate::restore::{self, RestoreDeps};
use crate::{metrics, scheduler};

/// Filename of the registry database under the vault root.
const REGISTRY_DB: &str = "registry.db";

pub struct GcRuntime {
    config: Arc<GcConfig>,
    registry: Arc<RegistryEngine>,
    vault: Arc<VaultStore>,
    store: Arc<dyn IObjectStore>,
    verifier: Arc<dyn IReferenceVerifier>,
    op_ids: Arc<OperationIdGenerator>,
    /// Only one cycle per process; `try_lock` failure is `CycleBusy`.
    cycle_lock: Mutex<()>,
    cdc_connected: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl GcRuntime {
    /// Open all stores and start the background tasks. The adapters come
    /// in through their trait seams so tests can hand in fakes.
    pub async fn initialize(
        config: GcConfig,
        store: Arc<dyn IObjectStore>,
        verifier: Arc<dyn IReferenceVerifier>,
        cdc: Option<Box<dyn ICdcConnector>>,
    ) -> GcResult<Arc<Self>> {
        config.validate()?;

        // The vault open creates the root directory; the registry file
        // lives inside it.
        let vault = Arc::new(VaultStore::open(&config.vault_path)?);
        let registry = Arc::new(RegistryEngine::open(&config.vault_path.join(REGISTRY_DB))?);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cdc_connected = Arc::new(AtomicBool::new(false));

        let runtime = Arc::new(Self {
            config: Arc::new(config),
            registry,
            vault,
            store,
            verifier,
            op_ids: Arc::new(OperationIdGenerator::new()),
            cycle_lock: Mutex::new(()),
            cdc_connected: cdc_connected.clone(),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = Vec::new();
        if let Some(connector) = cdc {
            let ingester = Ingester::new(
                connector,
                runtime.registry.clone(),
                runtime.config.tables.clone(),
                runtime.config.stream_name(),
                cdc_connected,
            );
            tasks.push(tokio::spawn(ingester.run(shutdown_rx.clone())));
            tracing::info!(stream = %runtime.config.stream_name(), "cdc ingester started");
        }
        if let Some(schedule) = runtime.config.schedule {
            tasks.push(scheduler::spawn(
                schedule,
                Arc::downgrade(&runtime),
                shutdown_rx,
            ));
        }
        *runtime.tasks.lock().await = tasks;

        tracing::info!(bucket = %runtime.config.bucket, mode = %runtime.config.mode,
            "gc runtime initialized");
        Ok(runtime)
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RegistryEngine> {
        &self.registry
    }

    pub fn vault(&self) -> &Arc<VaultStore> {
        &self.vault
    }

    /// Run one GC cycle now. `CycleBusy` when one is already in flight.
    pub async fn run_cycle(&self, deadline: Option<Duration>) -> GcResult<CycleReport> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Err(CycleError::Busy.into());
        };
        let deps = CycleDeps {
            config: self.config.clone(),
            registry: self.registry.clone(),
            vault: self.vault.clone(),
            store: self.store.clone(),
            verifier: self.verifier.clone(),
        };
        cycle::run(deps, self.op_ids.next(), deadline).await
    }

    pub async fn restore_operation(
        &self,
        operation_id: &OperationId,
        dry_run: bool,
        skip_existing: bool,
    ) -> GcResult<RestoreReport> {
        restore::restore_operation(self.restore_deps(), operation_id, dry_run, skip_existing).await
    }

    pub async fn restore_single_key(&self, key: &str, dry_run: bool) -> GcResult<RestoreReport> {
        restore::restore_single_key(self.restore_deps(), key, dry_run).await
    }

    fn restore_deps(&self) -> RestoreDeps {
        RestoreDeps {
            vault: self.vault.clone(),
            store: self.store.clone(),
            op_ids: self.op_ids.clone(),
        }
    }

    /// Full database scan replacing registry counts (operator triggered).
    /// Returns the number of keys written.
    pub async fn rebuild_registry(&self) -> GcResult<usize> {
        let counts = self.verifier.scan_counts().await?;
        let written = self.registry.rebuild(counts)?;
        tracing::info!(written, "registry rebuilt from full scan");
        Ok(written)
    }

    pub fn metrics(&self) -> GcResult<GcMetrics> {
        metrics::collect(&self.vault, &self.registry)
    }

    pub fn status(&self) -> GcResult<StatusSummary> {
        metrics::status(&self.vault, self.config.mode)
    }

    pub fn list_operations(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> GcResult<(Vec<s3gc_core::models::GcOperation>, Option<String>)> {
        Ok(self.vault.list_operations(limit, cursor)?)
    }

    pub async fn health(&self) -> HealthReport {
        let vault_ok = self.vault.accessible();
        let store_ok = self.store.list_page(None).await.is_ok();
        HealthReport::derive(
            vault_ok,
            store_ok,
            self.cdc_connected.load(Ordering::SeqCst),
        )
    }

    /// Stop background tasks; the ingester drains its last batch and
    /// persists its checkpoint on the way out.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        // Let any in-flight cycle finish before tearing down.
        let _guard = self.cycle_lock.lock().await;
        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "background task ended abnormally");
                }
            }
        }
        tracing::info!("gc runtime shut down");
    }
}
