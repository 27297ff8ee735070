// Error taxonomy for the ledger
//
// Two failure families must never be confused:
//   - caller mistakes (unknown casino, bad input, nothing recorded yet)
//   - store faults (locking, corruption, I/O) coming from SQLite itself

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Casino with ID {0} does not exist")]
    CasinoNotFound(i64),

    #[error("No casino named '{0}'")]
    UnknownCasino(String),

    #[error("Casino '{0}' already exists")]
    DuplicateCasino(String),

    #[error("No transactions found for casino '{0}'")]
    NoTransactions(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse classification used by presentation layers to pick a message or status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NoData,
    Conflict,
    InvalidInput,
    Config,
    Store,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CasinoNotFound(_) | Error::UnknownCasino(_) => ErrorKind::NotFound,
            Error::NoTransactions(_) => ErrorKind::NoData,
            Error::DuplicateCasino(_) => ErrorKind::Conflict,
            Error::InvalidInput(_) | Error::Csv(_) => ErrorKind::InvalidInput,
            Error::Config(_) => ErrorKind::Config,
            Error::Store(_) | Error::Io(_) => ErrorKind::Store,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// True when the failure came from the environment rather than the caller.
    pub fn is_store_fault(&self) -> bool {
        self.kind() == ErrorKind::Store
    }
}

pub type Result<T> = std::result::Result<T, Error>;
