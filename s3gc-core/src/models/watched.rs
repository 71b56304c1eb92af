use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A `(table, column)` pair whose string values are treated as object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchedColumn {
    pub table: String,
    pub column: String,
}

impl WatchedColumn {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for WatchedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// The fixed set of watched columns, frozen at process start.
///
/// Column order within a table is the declaration order; the ingester
/// relies on it when emitting deltas for multi-column rows. Serializes
/// as the plain column list; the per-table index is rebuilt on the way
/// in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<WatchedColumn>", into = "Vec<WatchedColumn>")]
pub struct WatchedSet {
    columns: Vec<WatchedColumn>,
    by_table: HashMap<String, Vec<String>>,
}

impl From<Vec<WatchedColumn>> for WatchedSet {
    fn from(columns: Vec<WatchedColumn>) -> Self {
        Self::new(columns)
    }
}

impl From<WatchedSet> for Vec<WatchedColumn> {
    fn from(set: WatchedSet) -> Self {
        set.columns
    }
}

impl WatchedSet {
    pub fn new(columns: Vec<WatchedColumn>) -> Self {
        let mut by_table: HashMap<String, Vec<String>> = HashMap::new();
        for c in &columns {
            by_table
                .entry(c.table.clone())
                .or_default()
                .push(c.column.clone());
        }
        Self { columns, by_table }
    }

    /// All watched columns in declaration order.
    pub fn columns(&self) -> &[WatchedColumn] {
        &self.columns
    }

    /// Distinct watched table names.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.by_table.keys().map(|t| t.as_str())
    }

    /// Declared columns of one table, in declaration order.
    pub fn columns_of(&self, table: &str) -> &[String] {
        self.by_table.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.by_table.contains_key(table)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_order_is_preserved_per_table() {
        let set = WatchedSet::new(vec![
            WatchedColumn::new("users", "avatar_url"),
            WatchedColumn::new("users", "banner_url"),
            WatchedColumn::new("posts", "attachment"),
        ]);
        assert_eq!(set.columns_of("users"), ["avatar_url", "banner_url"]);
        assert_eq!(set.columns_of("posts"), ["attachment"]);
        assert!(set.contains_table("users"));
        assert!(!set.contains_table("sessions"));
        assert!(set.columns_of("sessions").is_empty());
    }
}
