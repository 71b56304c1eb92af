//! Postgres CDC source over a logical replication slot.
//!
//! Polls the operator-created slot with
//! `pg_logical_slot_peek_binary_changes(slot, NULL, n, 'proto_version',
//! '1', 'publication_names', pub)` and decodes the pgoutput stream
//! in-process. Acknowledgement is `pg_replication_slot_advance`, issued by
//! the ingester only after the covering registry batch committed, so the
//! server never releases WAL the registry has not absorbed.
//!
//! Peeking (instead of `get`) keeps the slot position untouched until the
//! explicit advance; redelivery inside one session is filtered by LSN.
//! Tables need REPLICA IDENTITY FULL for UPDATE/DELETE old images; without
//! it, old values decode as absent and only additions are counted.

use std::collections::HashMap;

use async_trait::async_trait;

use tokio_postgres::{Client, NoTls};

use s3gc_core::errors::CdcError;
use s3gc_core::models::{CdcCursor, ChangeKind, RowChange, WatchedSet};
use s3gc_core::traits::ICdcSource;

use crate::pgoutput::{self, PgMessage, RelationDesc, Tuple};

/// Rows fetched per poll round.
const PEEK_CHANGES: i32 = 512;

/// Floor between peek queries while the slot is quiet.
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);

pub struct PostgresSource {
    client: Client,
    slot: String,
    publication: String,
    watched: WatchedSet,
    relations: HashMap<u32, RelationDesc>,
    pending: std::collections::VecDeque<RowChange>,
    /// Highest LSN handed to the ingester; peeked rows at or below it are
    /// redeliveries and get dropped.
    delivered_lsn: u64,
    last_poll: Option<std::time::Instant>,
}

impl PostgresSource {
    /// Connect, verify the slot exists, and position the stream.
    ///
    /// With a checkpoint the slot is advanced to it (that position is
    /// durably absorbed); without one the slot jumps to the current WAL
    /// head, so there is no historical backfill.
    pub async fn connect(
        dsn: &str,
        slot: &str,
        publication: &str,
        watched: WatchedSet,
        checkpoint: Option<&CdcCursor>,
    ) -> Result<Self, CdcError> {
        let (client, connection) =
            tokio_postgres::connect(dsn, NoTls)
                .await
                .map_err(|e| CdcError::Connect {
                    message: e.to_string(),
                })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "cdc postgres connection closed");
            }
        });

        let slot_exists: bool = client
            .query_opt(
                "SELECT 1 FROM pg_replication_slots WHERE slot_name = $1",
                &[&slot],
            )
            .await
            .map_err(stream_err)?
            .is_some();
        if !slot_exists {
            return Err(CdcError::MissingSlot {
                slot: slot.to_string(),
            });
        }

        let start_lsn = match checkpoint {
            Some(CdcCursor::Postgres { lsn }) => {
                client
                    .execute(
                        "SELECT pg_replication_slot_advance($1, $2::pg_lsn)",
                        &[&slot, &lsn.as_str()],
                    )
                    .await
                    .map_err(stream_err)?;
                pgoutput::parse_lsn(lsn)?
            }
            Some(other) => {
                return Err(CdcError::Connect {
                    message: format!("checkpoint cursor {other} is not a postgres cursor"),
                });
            }
            None => {
                client
                    .execute(
                        "SELECT pg_replication_slot_advance($1, pg_current_wal_lsn())",
                        &[&slot],
                    )
                    .await
                    .map_err(stream_err)?;
                let row = client
                    .query_one("SELECT pg_current_wal_lsn()::text", &[])
                    .await
                    .map_err(stream_err)?;
                let head: String = row.get(0);
                pgoutput::parse_lsn(&head)?
            }
        };

        tracing::info!(slot, publication, start_lsn, "cdc postgres source positioned");
        Ok(Self {
            client,
            slot: slot.to_string(),
            publication: publication.to_string(),
            watched,
            relations: HashMap::new(),
            pending: std::collections::VecDeque::new(),
            delivered_lsn: start_lsn,
            last_poll: None,
        })
    }

    async fn poll(&mut self) -> Result<(), CdcError> {
        let rows = self
            .client
            .query(
                "SELECT lsn::text, data
                 FROM pg_logical_slot_peek_binary_changes(
                     $1, NULL, $2, 'proto_version', '1', 'publication_names', $3)",
                &[&self.slot, &PEEK_CHANGES, &self.publication],
            )
            .await
            .map_err(stream_err)?;

        for row in rows {
            let lsn_text: String = row.get(0);
            let data: Vec<u8> = row.get(1);
            let lsn = pgoutput::parse_lsn(&lsn_text)?;
            if lsn <= self.delivered_lsn {
                continue;
            }

            match pgoutput::decode(&data)? {
                PgMessage::Relation(rel) => {
                    self.relations.insert(rel.id, rel);
                }
                PgMessage::Insert { relation, new } => {
                    if let Some(change) = self.row_change(relation, &lsn_text, true, None, new)? {
                        self.pending.push_back(change);
                    }
                    self.delivered_lsn = lsn;
                }
                PgMessage::Update { relation, old, new } => {
                    if let Some(change) = self.row_change(relation, &lsn_text, false, old, new)? {
                        self.pending.push_back(change);
                    }
                    self.delivered_lsn = lsn;
                }
                PgMessage::Delete { relation, old } => {
                    if let Some(change) =
                        self.row_change_delete(relation, &lsn_text, old)?
                    {
                        self.pending.push_back(change);
                    }
                    self.delivered_lsn = lsn;
                }
                PgMessage::Begin { .. } | PgMessage::Commit { .. } | PgMessage::Skipped => {
                    self.delivered_lsn = lsn;
                }
            }
        }
        Ok(())
    }

    /// Project a decoded tuple pair onto the watched columns of its table.
    fn row_change(
        &self,
        relation: u32,
        lsn: &str,
        is_insert: bool,
        old: Option<Tuple>,
        new: Tuple,
    ) -> Result<Option<RowChange>, CdcError> {
        let Some(rel) = self.relations.get(&relation) else {
            return Err(CdcError::Decode {
                message: format!("row event for unannounced relation {relation}"),
            });
        };
        if !self.watched.contains_table(&rel.name) {
            return Ok(None);
        }

        let project = |tuple: &Tuple| {
            let mut map = HashMap::new();
            for col in self.watched.columns_of(&rel.name) {
                if let Some(idx) = rel.columns.iter().position(|c| c == col) {
                    map.insert(col.clone(), tuple.get(idx).cloned().flatten());
                }
            }
            map
        };

        let kind = match (is_insert, old) {
            (true, _) => ChangeKind::Insert { new: project(&new) },
            (false, Some(old)) => ChangeKind::Update {
                old: project(&old),
                new: project(&new),
            },
            // No old image: every watched value in the new row counts as
            // newly observed.
            (false, None) => ChangeKind::Update {
                old: HashMap::new(),
                new: project(&new),
            },
        };

        Ok(Some(RowChange {
            table: rel.name.clone(),
            kind,
            cursor: CdcCursor::Postgres { lsn: lsn.to_string() },
        }))
    }

    fn row_change_delete(
        &self,
        relation: u32,
        lsn: &str,
        old: Tuple,
    ) -> Result<Option<RowChange>, CdcError> {
        let Some(rel) = self.relations.get(&relation) else {
            return Err(CdcError::Decode {
                message: format!("row event for unannounced relation {relation}"),
            });
        };
        if !self.watched.contains_table(&rel.name) {
            return Ok(None);
        }

        let mut map = HashMap::new();
        for col in self.watched.columns_of(&rel.name) {
            if let Some(idx) = rel.columns.iter().position(|c| c == col) {
                map.insert(col.clone(), old.get(idx).cloned().flatten());
            }
        }

        Ok(Some(RowChange {
            table: rel.name.clone(),
            kind: ChangeKind::Delete { old: map },
            cursor: CdcCursor::Postgres { lsn: lsn.to_string() },
        }))
    }
}

#[async_trait]
impl ICdcSource for PostgresSource {
    async fn next_event(&mut self) -> Result<Option<RowChange>, CdcError> {
        if let Some(change) = self.pending.pop_front() {
            return Ok(Some(change));
        }
        // Rate-limit the peek query while the slot is quiet.
        if let Some(last) = self.last_poll {
            if last.elapsed() < POLL_INTERVAL {
                return Ok(None);
            }
        }
        self.last_poll = Some(std::time::Instant::now());
        self.poll().await?;
        Ok(self.pending.pop_front())
    }

    async fn ack(&mut self, cursor: &CdcCursor) -> Result<(), CdcError> {
        let CdcCursor::Postgres { lsn } = cursor else {
            return Err(CdcError::Stream {
                message: format!("cannot ack non-postgres cursor {cursor}"),
            });
        };
        self.client
            .execute(
                "SELECT pg_replication_slot_advance($1, $2::pg_lsn)",
                &[&self.slot, &lsn.as_str()],
            )
            .await
            .map_err(stream_err)?;
        Ok(())
    }
}

fn stream_err(e: tokio_postgres::Error) -> CdcError {
    CdcError::Stream {
        message: e.to_string(),
    }
}
