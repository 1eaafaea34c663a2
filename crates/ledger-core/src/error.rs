use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("missing value: `{0}` is required")]
    MissingField(&'static str),

    #[error("please supply a valid list of nodes")]
    MalformedPeerList,

    #[error("invalid peer address `{0}`")]
    InvalidPeerAddress(String),

    /// Contract failure: a ledger never holds an empty chain.
    #[error("chain is empty")]
    EmptyChain,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
