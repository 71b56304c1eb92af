//! MySQL CDC source over the row-based binlog.
//!
//! Registers as a replica and streams binlog events from the declared
//! position (or `SHOW MASTER STATUS` when no checkpoint exists). The
//! server must run `binlog_format = ROW` and `binlog_row_image = FULL`.
//! Column positions for the watched tables are resolved once at connect
//! time from `information_schema.columns`; a watched column missing there
//! is logged as schema drift and ignored until restart. Server rotation
//! (RotateEvent) switches files without interrupting the stream.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::StreamExt;
use mysql_async::binlog::events::EventData;
use mysql_async::binlog::row::BinlogRow;
use mysql_async::binlog::value::BinlogValue;
use mysql_async::prelude::Queryable;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn, Opts};

use s3gc_core::errors::CdcError;
use s3gc_core::models::{CdcCursor, ChangeKind, RowChange, WatchedSet};
use s3gc_core::traits::ICdcSource;

/// Replica server id when the checkpoint does not carry one.
const DEFAULT_SERVER_ID: u32 = u32::MAX - 411;

/// Watched column name → ordinal within the table's binlog row.
type ColumnOrdinals = HashMap<String, Vec<(String, usize)>>;

pub struct MySqlSource {
    stream: BinlogStream,
    watched: WatchedSet,
    ordinals: ColumnOrdinals,
    server_id: u32,
    file: String,
    pos: u64,
    pending: std::collections::VecDeque<RowChange>,
}

impl MySqlSource {
    pub async fn connect(
        dsn: &str,
        watched: WatchedSet,
        checkpoint: Option<&CdcCursor>,
    ) -> Result<Self, CdcError> {
        let opts = Opts::from_url(dsn).map_err(|e| CdcError::Connect {
            message: e.to_string(),
        })?;
        let mut conn = Conn::new(opts).await.map_err(connect_err)?;

        let ordinals = resolve_ordinals(&mut conn, &watched).await?;

        let (file, pos, server_id) = match checkpoint {
            Some(CdcCursor::MySql {
                file,
                pos,
                server_id,
            }) => (file.clone(), *pos, *server_id),
            Some(other) => {
                return Err(CdcError::Connect {
                    message: format!("checkpoint cursor {other} is not a mysql cursor"),
                });
            }
            None => {
                // No checkpoint: start at the current end of the binlog.
                let row: Option<mysql_async::Row> = conn
                    .query_first("SHOW MASTER STATUS")
                    .await
                    .map_err(stream_err)?;
                let position = row.and_then(|r| {
                    Some((r.get::<String, _>(0)?, r.get::<u64, _>(1)?))
                });
                let (file, pos) = position.ok_or_else(|| CdcError::Connect {
                    message: "SHOW MASTER STATUS returned nothing; is binlogging enabled?".into(),
                })?;
                (file, pos, DEFAULT_SERVER_ID)
            }
        };

        let stream = conn
            .get_binlog_stream(
                BinlogStreamRequest::new(server_id)
                    .with_filename(file.as_bytes())
                    .with_pos(pos),
            )
            .await
            .map_err(connect_err)?;

        tracing::info!(file = %file, pos, server_id, "cdc mysql source positioned");
        Ok(Self {
            stream,
            watched,
            ordinals,
            server_id,
            file,
            pos,
            pending: std::collections::VecDeque::new(),
        })
    }

    fn cursor(&self) -> CdcCursor {
        CdcCursor::MySql {
            file: self.file.clone(),
            pos: self.pos,
            server_id: self.server_id,
        }
    }

    /// Project one binlog row onto the watched columns of `table`.
    fn project(&self, table: &str, row: &BinlogRow) -> HashMap<String, Option<String>> {
        let mut map = HashMap::new();
        if let Some(cols) = self.ordinals.get(table) {
            for (name, ordinal) in cols {
                let value = row.as_ref(*ordinal).and_then(binlog_value_to_string);
                map.insert(name.clone(), value);
            }
        }
        map
    }

    fn handle_rows_event(&mut self, data: EventData<'_>) -> Result<(), CdcError> {
        let EventData::RowsEvent(rows_event) = data else {
            return Ok(());
        };
        let table_id = rows_event.table_id();
        let cursor = self.cursor();

        // The table map borrow from the stream lives for the row iteration,
        // so changes are staged locally and queued afterwards.
        let mut changes = Vec::new();
        {
            let Some(tme) = self.stream.get_tme(table_id) else {
                // Table map not seen yet; nothing to decode against.
                return Ok(());
            };
            let table = tme.table_name().to_string();
            if !self.watched.contains_table(&table) {
                return Ok(());
            }

            for row in rows_event.rows(tme) {
                let (before, after) = row.map_err(|e| CdcError::Decode {
                    message: e.to_string(),
                })?;
                let kind = match (before, after) {
                    (None, Some(after)) => ChangeKind::Insert {
                        new: self.project(&table, &after),
                    },
                    (Some(before), Some(after)) => ChangeKind::Update {
                        old: self.project(&table, &before),
                        new: self.project(&table, &after),
                    },
                    (Some(before), None) => ChangeKind::Delete {
                        old: self.project(&table, &before),
                    },
                    (None, None) => continue,
                };
                changes.push(RowChange {
                    table: table.clone(),
                    kind,
                    cursor: cursor.clone(),
                });
            }
        }
        self.pending.extend(changes);
        Ok(())
    }
}

#[async_trait]
impl ICdcSource for MySqlSource {
    async fn next_event(&mut self) -> Result<Option<RowChange>, CdcError> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Ok(Some(change));
            }

            let event = match self.stream.next().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(stream_err(e)),
                None => {
                    return Err(CdcError::Stream {
                        message: "binlog stream ended".into(),
                    })
                }
            };

            // Track position before decoding; log_pos 0 means "unchanged"
            // (e.g. artificial events).
            let log_pos = event.header().log_pos();
            if log_pos > 0 {
                self.pos = u64::from(log_pos);
            }

            match event.read_data() {
                Ok(Some(EventData::RotateEvent(rotate))) => {
                    self.file = rotate.name().to_string();
                    self.pos = rotate.position();
                    tracing::debug!(file = %self.file, pos = self.pos, "binlog rotated");
                }
                Ok(Some(data @ EventData::RowsEvent(_))) => {
                    self.handle_rows_event(data)?;
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(CdcError::Decode {
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn ack(&mut self, _cursor: &CdcCursor) -> Result<(), CdcError> {
        // Binlog retention is time/size based on the server; nothing to
        // acknowledge.
        Ok(())
    }
}

async fn resolve_ordinals(
    conn: &mut Conn,
    watched: &WatchedSet,
) -> Result<ColumnOrdinals, CdcError> {
    let mut ordinals = ColumnOrdinals::new();
    for table in watched.tables() {
        let rows: Vec<(String, u64)> = conn
            .exec(
                "SELECT COLUMN_NAME, ORDINAL_POSITION
                 FROM information_schema.columns
                 WHERE table_schema = DATABASE() AND table_name = ?",
                (table,),
            )
            .await
            .map_err(stream_err)?;
        let by_name: HashMap<&str, usize> = rows
            .iter()
            .map(|(name, ordinal)| (name.as_str(), (*ordinal as usize).saturating_sub(1)))
            .collect();

        let mut resolved = Vec::new();
        for column in watched.columns_of(table) {
            match by_name.get(column.as_str()) {
                Some(ordinal) => resolved.push((column.clone(), *ordinal)),
                None => {
                    tracing::warn!(
                        table,
                        column = %column,
                        "watched column absent upstream, ignoring until restart"
                    );
                }
            }
        }
        ordinals.insert(table.to_string(), resolved);
    }
    Ok(ordinals)
}

fn binlog_value_to_string(value: &BinlogValue<'_>) -> Option<String> {
    match value {
        BinlogValue::Value(mysql_async::Value::NULL) => None,
        BinlogValue::Value(mysql_async::Value::Bytes(bytes)) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        BinlogValue::Value(other) => Some(other.as_sql(true).trim_matches('\'').to_string()),
        BinlogValue::Jsonb(_) | BinlogValue::JsonDiff(_) => None,
    }
}

fn connect_err(e: mysql_async::Error) -> CdcError {
    CdcError::Connect {
        message: e.to_string(),
    }
}

fn stream_err(e: mysql_async::Error) -> CdcError {
    CdcError::Stream {
        message: e.to_string(),
    }
}
