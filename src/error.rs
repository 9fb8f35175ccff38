use crate::change_set::ChangeKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not enough {coin_type}: required {required}, available {available}")]
    InsufficientFunds {
        coin_type: String,
        required: u64,
        available: u128,
    },

    #[error("not enough owned objects: required {required}, found {found}")]
    NotEnoughObjects { required: usize, found: usize },

    #[error("no {kind} object change matches {pattern:?}")]
    NotFound { kind: ChangeKind, pattern: String },

    #[error("{count} {kind} object changes match {pattern:?}, expected exactly one")]
    AmbiguousMatch {
        kind: ChangeKind,
        pattern: String,
        count: usize,
    },

    #[error("transaction {digest} failed: {reason}")]
    ExecutionFailed { digest: String, reason: String },

    #[error("can't decode {context}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::Decode {
            context: context.into(),
            source,
        }
    }
}
