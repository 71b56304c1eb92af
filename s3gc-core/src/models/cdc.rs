use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::watched::WatchedColumn;

/// Opaque stream position. Persisted as JSON next to the registry so a
/// restart resumes exactly where the last committed batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CdcCursor {
    Postgres {
        /// Textual LSN, e.g. `0/16B3748`.
        lsn: String,
    },
    MySql {
        file: String,
        pos: u64,
        server_id: u32,
    },
}

impl std::fmt::Display for CdcCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CdcCursor::Postgres { lsn } => write!(f, "pg:{lsn}"),
            CdcCursor::MySql { file, pos, .. } => write!(f, "mysql:{file}:{pos}"),
        }
    }
}

/// Cursor plus a per-stream monotonic sequence number.
///
/// Persisted only inside the same transaction as the registry deltas it
/// covers; see `RegistryEngine::apply_batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stream: String,
    pub cursor: CdcCursor,
    pub seq: u64,
}

/// Direction of a reference delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOp {
    Increment,
    Decrement,
}

/// One +1/-1 on an object key, tagged with the originating column.
///
/// The source tag never enters the count; it exists for debug logging and
/// so scan rebuilds can attribute rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefDelta {
    pub key: String,
    pub op: DeltaOp,
    pub source: WatchedColumn,
}

impl RefDelta {
    pub fn increment(key: impl Into<String>, source: WatchedColumn) -> Self {
        Self {
            key: key.into(),
            op: DeltaOp::Increment,
            source,
        }
    }

    pub fn decrement(key: impl Into<String>, source: WatchedColumn) -> Self {
        Self {
            key: key.into(),
            op: DeltaOp::Decrement,
            source,
        }
    }
}

/// A decoded row mutation on a watched table.
///
/// Column maps carry only the watched columns of that table; a missing
/// entry means the upstream image did not include the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Insert {
        new: HashMap<String, Option<String>>,
    },
    Update {
        old: HashMap<String, Option<String>>,
        new: HashMap<String, Option<String>>,
    },
    Delete {
        old: HashMap<String, Option<String>>,
    },
}

/// One row event from the CDC stream, with the cursor it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub table: String,
    pub kind: ChangeKind,
    pub cursor: CdcCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_serializes_with_backend_tag() {
        let pg = CdcCursor::Postgres { lsn: "0/16B3748".into() };
        let json = serde_json::to_string(&pg).unwrap();
        assert!(json.contains("\"backend\":\"postgres\""));
        let back: CdcCursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pg);

        let my = CdcCursor::MySql {
            file: "binlog.000007".into(),
            pos: 4,
            server_id: 1,
        };
        let back: CdcCursor = serde_json::from_str(&serde_json::to_string(&my).unwrap()).unwrap();
        assert_eq!(back, my);
    }
}
