/// CDC stream errors. Never fatal to the process: the ingester retries
/// from the last committed checkpoint with exponential backoff.
#[derive(Debug, thiserror::Error)]
pub enum CdcError {
    #[error("cdc connect failed: {message}")]
    Connect { message: String },

    /// The replication slot the operator was meant to create is absent.
    /// This one IS fatal at initialization.
    #[error("replication slot {slot} does not exist")]
    MissingSlot { slot: String },

    #[error("cdc stream error: {message}")]
    Stream { message: String },

    #[error("cdc decode error: {message}")]
    Decode { message: String },

    #[error("watched column {table}.{column} no longer present upstream")]
    SchemaDrift { table: String, column: String },
}
