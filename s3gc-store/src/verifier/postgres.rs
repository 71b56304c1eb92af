//! Postgres reference verifier.

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

use s3gc_core::errors::VerifierError;
use s3gc_core::models::{WatchedColumn, WatchedSet};
use s3gc_core::traits::IReferenceVerifier;

use super::check_ident;

/// EXISTS probes over the watched set on a dedicated Postgres connection.
pub struct PgVerifier {
    client: Client,
    watched: WatchedSet,
}

impl PgVerifier {
    /// Connect and spawn the connection driver task.
    pub async fn connect(dsn: &str, watched: WatchedSet) -> Result<Self, VerifierError> {
        let (client, connection) =
            tokio_postgres::connect(dsn, NoTls)
                .await
                .map_err(|e| VerifierError::Connect {
                    message: e.to_string(),
                })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "verifier postgres connection closed");
            }
        });
        Ok(Self { client, watched })
    }
}

#[async_trait]
impl IReferenceVerifier for PgVerifier {
    async fn find_reference(&self, key: &str) -> Result<Option<WatchedColumn>, VerifierError> {
        for col in self.watched.columns() {
            let table = check_ident(&col.table)?;
            let column = check_ident(&col.column)?;
            let sql = format!("SELECT 1 FROM {table} WHERE {column} = $1 LIMIT 1");
            let row = self
                .client
                .query_opt(&sql, &[&key])
                .await
                .map_err(|e| VerifierError::Query {
                    table: col.table.clone(),
                    column: col.column.clone(),
                    message: e.to_string(),
                })?;
            if row.is_some() {
                return Ok(Some(col.clone()));
            }
        }
        Ok(None)
    }

    async fn scan_counts(&self) -> Result<Vec<(String, u64)>, VerifierError> {
        let mut counts: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for col in self.watched.columns() {
            let table = check_ident(&col.table)?;
            let column = check_ident(&col.column)?;
            let sql = format!(
                "SELECT {column}, COUNT(*) FROM {table}
                 WHERE {column} IS NOT NULL AND {column} <> ''
                 GROUP BY {column}"
            );
            let rows = self
                .client
                .query(&sql, &[])
                .await
                .map_err(|e| VerifierError::Query {
                    table: col.table.clone(),
                    column: col.column.clone(),
                    message: e.to_string(),
                })?;
            for row in rows {
                let key: String = row.get(0);
                let count: i64 = row.get(1);
                *counts.entry(key).or_insert(0) += count.max(0) as u64;
            }
        }
        Ok(counts.into_iter().collect())
    }
}
