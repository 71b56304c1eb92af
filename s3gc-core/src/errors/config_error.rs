/// Configuration errors. All fatal at initialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {name}")]
    Missing { name: String },

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    #[error("table {table} declares no watched columns")]
    EmptyColumns { table: String },

    #[error("retention_days must be > 0 in execute mode")]
    ZeroRetentionInExecute,

    #[error("cdc_backend {backend} requires cdc_connection_url")]
    CdcWithoutDsn { backend: String },
}
