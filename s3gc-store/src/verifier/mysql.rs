//! MySQL reference verifier.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::Pool;

use s3gc_core::errors::VerifierError;
use s3gc_core::models::{WatchedColumn, WatchedSet};
use s3gc_core::traits::IReferenceVerifier;

use super::check_ident;

/// EXISTS probes over the watched set through a mysql_async pool.
pub struct MySqlVerifier {
    pool: Pool,
    watched: WatchedSet,
}

impl MySqlVerifier {
    pub fn new(dsn: &str, watched: WatchedSet) -> Result<Self, VerifierError> {
        let opts = mysql_async::Opts::from_url(dsn).map_err(|e| VerifierError::Connect {
            message: e.to_string(),
        })?;
        Ok(Self {
            pool: Pool::new(opts),
            watched,
        })
    }
}

#[async_trait]
impl IReferenceVerifier for MySqlVerifier {
    async fn find_reference(&self, key: &str) -> Result<Option<WatchedColumn>, VerifierError> {
        let mut conn = self.pool.get_conn().await.map_err(|e| VerifierError::Connect {
            message: e.to_string(),
        })?;
        for col in self.watched.columns() {
            let table = check_ident(&col.table)?;
            let column = check_ident(&col.column)?;
            let sql = format!("SELECT 1 FROM {table} WHERE {column} = ? LIMIT 1");
            let hit: Option<u8> =
                conn.exec_first(sql, (key,))
                    .await
                    .map_err(|e| VerifierError::Query {
                        table: col.table.clone(),
                        column: col.column.clone(),
                        message: e.to_string(),
                    })?;
            if hit.is_some() {
                return Ok(Some(col.clone()));
            }
        }
        Ok(None)
    }

    async fn scan_counts(&self) -> Result<Vec<(String, u64)>, VerifierError> {
        let mut conn = self.pool.get_conn().await.map_err(|e| VerifierError::Connect {
            message: e.to_string(),
        })?;
        let mut counts: std::collections::HashMap<String, u64> = std::collections::HashMap::new();
        for col in self.watched.columns() {
            let table = check_ident(&col.table)?;
            let column = check_ident(&col.column)?;
            let sql = format!(
                "SELECT {column}, COUNT(*) FROM {table}
                 WHERE {column} IS NOT NULL AND {column} <> ''
                 GROUP BY {column}"
            );
            let rows: Vec<(String, i64)> =
                conn.exec(sql, ())
                    .await
                    .map_err(|e| VerifierError::Query {
                        table: col.table.clone(),
                        column: col.column.clone(),
                        message: e.to_string(),
                    })?;
            for (key, count) in rows {
                *counts.entry(key).or_insert(0) += count.max(0) as u64;
            }
        }
        Ok(counts.into_iter().collect())
    }
}
