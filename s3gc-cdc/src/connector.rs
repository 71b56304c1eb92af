//! Connectors: how the ingester (re)establishes its stream, positioned at
//! the last committed checkpoint.

use async_trait::async_trait;

use s3gc_core::errors::CdcError;
use s3gc_core::models::{Checkpoint, WatchedSet};
use s3gc_core::traits::{ICdcConnector, ICdcSource};

use crate::source::{MySqlSource, PostgresSource};

/// Logical-slot polling connector. Slot and publication are created by
/// the operator; the names are derived from the bucket (see
/// `GcConfig::stream_name`).
pub struct PgConnector {
    pub dsn: String,
    pub slot: String,
    pub publication: String,
    pub watched: WatchedSet,
}

#[async_trait]
impl ICdcConnector for PgConnector {
    async fn connect(
        &self,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<Box<dyn ICdcSource>, CdcError> {
        let source = PostgresSource::connect(
            &self.dsn,
            &self.slot,
            &self.publication,
            self.watched.clone(),
            checkpoint.map(|c| &c.cursor),
        )
        .await?;
        Ok(Box::new(source))
    }
}

/// Row-based binlog connector.
pub struct MySqlConnector {
    pub dsn: String,
    pub watched: WatchedSet,
}

#[async_trait]
impl ICdcConnector for MySqlConnector {
    async fn connect(
        &self,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<Box<dyn ICdcSource>, CdcError> {
        let source =
            MySqlSource::connect(&self.dsn, self.watched.clone(), checkpoint.map(|c| &c.cursor))
                .await?;
        Ok(Box::new(source))
    }
}
