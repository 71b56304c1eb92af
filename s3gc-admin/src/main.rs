//! Binary entry point.
//!
//! `s3gc serve` (default) runs the admin server plus background tasks;
//! `s3gc run-once` executes a single cycle and exits. Exit codes:
//! 0 success, 1 configuration error, 2 unrecoverable runtime error,
//! 3 cycle cancelled.
//!
//! Listen address comes from `S3GC_LISTEN_ADDR` (default `0.0.0.0:8080`).

use std::collections::HashMap;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use s3gc_cdc::{MySqlConnector, PgConnector};
use s3gc_core::config::{CdcBackend, GcConfig};
use s3gc_core::models::CycleStatus;
use s3gc_core::traits::{ICdcConnector, IObjectStore, IReferenceVerifier};
use s3gc_engine::GcRuntime;
use s3gc_store::{MySqlVerifier, PgVerifier, S3ObjectStore};

const EXIT_OK: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_RUNTIME: i32 = 2;
const EXIT_CANCELLED: i32 = 3;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let vars: HashMap<String, String> = std::env::vars().collect();
    let config = match s3gc_core::config::from_env(&vars) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            return EXIT_CONFIG;
        }
    };

    let runtime = match build_runtime(&config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "initialization failed");
            return EXIT_RUNTIME;
        }
    };

    let once = std::env::args().nth(1).as_deref() == Some("run-once");
    let code = if once {
        run_once(&runtime).await
    } else {
        serve(runtime.clone(), &vars).await
    };

    runtime.shutdown().await;
    code
}

async fn build_runtime(config: &GcConfig) -> anyhow::Result<Arc<GcRuntime>> {
    let store: Arc<dyn IObjectStore> =
        Arc::new(S3ObjectStore::connect(&config.region, &config.bucket).await);

    let dsn = config.cdc_connection_url.clone().ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is required: re-verification queries need the database")
    })?;
    let mysql_flavored = dsn.starts_with("mysql://");

    let verifier: Arc<dyn IReferenceVerifier> = if mysql_flavored {
        Arc::new(MySqlVerifier::new(&dsn, config.tables.clone())?)
    } else {
        Arc::new(PgVerifier::connect(&dsn, config.tables.clone()).await?)
    };

    let cdc: Option<Box<dyn ICdcConnector>> = match config.cdc_backend {
        Some(CdcBackend::Postgres) => {
            let slot = config.stream_name();
            Some(Box::new(PgConnector {
                dsn,
                publication: format!("{slot}_pub"),
                slot,
                watched: config.tables.clone(),
            }))
        }
        Some(CdcBackend::MySql) => Some(Box::new(MySqlConnector {
            dsn,
            watched: config.tables.clone(),
        })),
        None => None,
    };

    Ok(GcRuntime::initialize(config.clone(), store, verifier, cdc).await?)
}

async fn run_once(runtime: &Arc<GcRuntime>) -> i32 {
    match runtime.run_cycle(None).await {
        Ok(report) if report.status == CycleStatus::Cancelled => EXIT_CANCELLED,
        Ok(report) => {
            tracing::info!(
                operation = %report.operation_id,
                deleted = report.counters.deleted_count,
                "cycle finished"
            );
            EXIT_OK
        }
        Err(e) => {
            tracing::error!(error = %e, "cycle failed");
            EXIT_RUNTIME
        }
    }
}

async fn serve(runtime: Arc<GcRuntime>, vars: &HashMap<String, String>) -> i32 {
    let addr = vars
        .get("S3GC_LISTEN_ADDR")
        .map(String::as_str)
        .unwrap_or("0.0.0.0:8080");
    let app = s3gc_admin::router(runtime);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr, error = %e, "bind failed");
            return EXIT_RUNTIME;
        }
    };
    tracing::info!(addr, "admin surface listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await;

    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %e, "server error");
            EXIT_RUNTIME
        }
    }
}
