/// Object store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("list failed: {message}")]
    List { message: String },

    #[error("get {key} failed: {message}")]
    Get { key: String, message: String },

    #[error("put {key} failed: {message}")]
    Put { key: String, message: String },

    #[error("delete {key} failed: {message}")]
    Delete { key: String, message: String },

    #[error("head {key} failed: {message}")]
    Head { key: String, message: String },

    #[error("object {key} not found")]
    NotFound { key: String },
}

/// Live database re-verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("verifier connect failed: {message}")]
    Connect { message: String },

    #[error("verification query on {table}.{column} failed: {message}")]
    Query {
        table: String,
        column: String,
        message: String,
    },

    /// Table or column names must be plain identifiers before they are
    /// spliced into SQL.
    #[error("unsafe identifier {ident:?}")]
    UnsafeIdentifier { ident: String },
}
