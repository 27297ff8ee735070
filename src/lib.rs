// Casino Ledger - Core Library
// Exposes all modules for use in the CLI/TUI, the API server, and tests

pub mod config;
pub mod csv_io;
pub mod db;
pub mod error;
pub mod reconciliation;
pub mod stats;
pub mod transfer;

#[cfg(feature = "tui")]
pub mod ui;

#[cfg(feature = "server")]
pub mod api;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    add_casino, get_casino, get_casino_by_name, get_casino_stats_by_name, get_casinos,
    get_transaction_by_id, get_transaction_views, get_transactions, load_casino_stats,
    load_overview, record_transaction, record_transaction_at, record_transaction_by_name,
    setup_database, verify_count, Amounts, Casino, Database, StatRow, Transaction,
    TransactionView,
};
pub use error::{Error, ErrorKind, Result};
pub use reconciliation::{check_totals, repair_totals, CasinoTotals, TotalsDrift};
pub use stats::{
    casino_series, overview_series, CasinoPoint, CasinoSeries, CasinoSummary, Overview,
    OverviewPoint, OverviewSeries, OverviewTotals,
};
pub use transfer::{move_database_data, TransferReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
