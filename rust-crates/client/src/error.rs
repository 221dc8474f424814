use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Every failure a ledger interaction can surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    #[error("no wallet extension is available")]
    WalletUnavailable,

    #[error("wallet is present but no account is connected")]
    NoAccountConnected,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] NormalizationError),

    #[error("transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("precondition failed: {0}")]
    DomainPreconditionFailure(String),
}

impl ClientError {
    pub fn precondition(message: impl Into<String>) -> Self {
        ClientError::DomainPreconditionFailure(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ClientError::TransactionRejected(message.into())
    }
}

/// Why a raw view payload could not be turned into rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("response body is not JSON: {0}")]
    InvalidJson(String),

    #[error("expected an array of rows, found {0}")]
    NotAnArray(&'static str),

    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {column} is not an array")]
    NotAColumn { column: usize },

    #[error("column {column} has {found} entries, expected {expected}")]
    RaggedColumns {
        column: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {index} is not a keyed record")]
    UnkeyedRow { index: usize },

    #[error("missing field `{0}`")]
    MissingField(&'static str),
}
