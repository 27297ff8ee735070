use crate::config::Config;
use crate::error::{Error, Result};
use crate::stats::{self, CasinoSeries, Overview, OverviewTotals};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Format SQLite's `CURRENT_TIMESTAMP` produces, and the one we write back.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A tracked counterparty with its denormalized running totals.
///
/// `deposit` and `payment` are running sums, `remaining` is the snapshot carried
/// by the most recent transaction. The transaction log is authoritative; see
/// [`crate::reconciliation`] for rebuilding these fields from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Casino {
    pub id: i64,
    pub name: String,
    pub link: Option<String>,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
}

impl Casino {
    pub fn profit(&self) -> f64 {
        stats::profit(self.deposit, self.remaining, self.payment)
    }
}

/// Immutable, timestamped deposit/remaining/payment triple against one casino.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub casino_id: i64,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
    pub created_at: NaiveDateTime,
}

/// Transaction row joined with its casino's name, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub casino: String,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
    pub created_at: NaiveDateTime,
}

/// Amounts submitted when recording a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Amounts {
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
}

impl Amounts {
    pub fn new(deposit: f64, remaining: f64, payment: f64) -> Self {
        Self {
            deposit,
            remaining,
            payment,
        }
    }
}

/// One row of a casino's history as consumed by the per-casino aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatRow {
    pub created_at: NaiveDateTime,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
}

/// Parse the timestamp shapes we accept: SQLite's own, ISO-8601 with `T`, or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognised timestamp '{}'", raw).into(),
        )
    })
}

fn casino_from_row(row: &Row<'_>) -> rusqlite::Result<Casino> {
    Ok(Casino {
        id: row.get(0)?,
        name: row.get(1)?,
        link: row.get(2)?,
        deposit: row.get(3)?,
        remaining: row.get(4)?,
        payment: row.get(5)?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        casino_id: row.get(1)?,
        deposit: row.get(2)?,
        remaining: row.get(3)?,
        payment: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS casino (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            link TEXT,
            deposit FLOAT NOT NULL,
            remaining FLOAT NOT NULL,
            payment FLOAT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            casino_id INTEGER NOT NULL,
            deposit FLOAT NOT NULL,
            remaining FLOAT NOT NULL,
            payment FLOAT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (casino_id) REFERENCES casino(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_casino_time
         ON transactions(casino_id, created_at)",
        [],
    )?;

    debug!("Schema ensured");
    Ok(())
}

// ============================================================================
// READS
// ============================================================================

pub fn get_casinos(conn: &Connection) -> Result<Vec<Casino>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, link, deposit, remaining, payment FROM casino ORDER BY id",
    )?;

    let casinos = stmt
        .query_map([], casino_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(casinos)
}

pub fn get_casino(conn: &Connection, id: i64) -> Result<Option<Casino>> {
    let casino = conn
        .query_row(
            "SELECT id, name, link, deposit, remaining, payment FROM casino WHERE id = ?1",
            [id],
            casino_from_row,
        )
        .optional()?;

    Ok(casino)
}

pub fn get_casino_by_name(conn: &Connection, name: &str) -> Result<Option<Casino>> {
    let casino = conn
        .query_row(
            "SELECT id, name, link, deposit, remaining, payment FROM casino WHERE name = ?1",
            [name],
            casino_from_row,
        )
        .optional()?;

    Ok(casino)
}

/// All transactions, oldest first (full timestamp precision, ties broken by id).
pub fn get_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, casino_id, deposit, remaining, payment, created_at
         FROM transactions
         ORDER BY created_at, id",
    )?;

    let transactions = stmt
        .query_map([], transaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(transactions)
}

pub fn get_transaction_by_id(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let transaction = conn
        .query_row(
            "SELECT id, casino_id, deposit, remaining, payment, created_at
             FROM transactions WHERE id = ?1",
            [id],
            transaction_from_row,
        )
        .optional()?;

    Ok(transaction)
}

pub fn get_transaction_views(conn: &Connection) -> Result<Vec<TransactionView>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, c.name, t.deposit, t.remaining, t.payment, t.created_at
         FROM transactions t
         JOIN casino c ON c.id = t.casino_id
         ORDER BY t.created_at, t.id",
    )?;

    let views = stmt
        .query_map([], |row| {
            Ok(TransactionView {
                id: row.get(0)?,
                casino: row.get(1)?,
                deposit: row.get(2)?,
                remaining: row.get(3)?,
                payment: row.get(4)?,
                created_at: timestamp_column(row, 5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(views)
}

/// History of one casino, ordered by creation time. Empty when the casino has
/// no transactions or does not exist.
pub fn get_casino_stats_by_name(conn: &Connection, name: &str) -> Result<Vec<StatRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.created_at, t.deposit, t.remaining, t.payment
         FROM casino c
         JOIN transactions t ON c.id = t.casino_id
         WHERE c.name = ?1
         ORDER BY t.created_at, t.id",
    )?;

    let rows = stmt
        .query_map([name], |row| {
            Ok(StatRow {
                created_at: timestamp_column(row, 0)?,
                deposit: row.get(1)?,
                remaining: row.get(2)?,
                payment: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// WRITES
// ============================================================================

/// Create a casino with all totals at zero. Returns the new id.
pub fn add_casino(conn: &Connection, name: &str, link: Option<&str>) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("casino name must not be empty".to_string()));
    }
    let link = link.map(str::trim).filter(|l| !l.is_empty());

    let result = conn.execute(
        "INSERT INTO casino (name, link, deposit, remaining, payment) VALUES (?1, ?2, 0, 0, 0)",
        params![name, link],
    );

    match result {
        Ok(_) => {
            let id = conn.last_insert_rowid();
            info!(casino_id = id, name, "Added casino");
            Ok(id)
        }
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            warn!(name, "Casino already exists");
            Err(Error::DuplicateCasino(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Insert one transaction and fold it into the casino's totals, without
/// managing the surrounding store transaction. Callers own atomicity.
pub(crate) fn apply_transaction(
    conn: &Connection,
    casino_id: i64,
    amounts: Amounts,
    created_at: Option<NaiveDateTime>,
) -> Result<i64> {
    let casino = get_casino(conn, casino_id)?.ok_or(Error::CasinoNotFound(casino_id))?;

    conn.execute(
        "INSERT INTO transactions (casino_id, deposit, remaining, payment, created_at)
         VALUES (?1, ?2, ?3, ?4, COALESCE(?5, CURRENT_TIMESTAMP))",
        params![
            casino_id,
            amounts.deposit,
            amounts.remaining,
            amounts.payment,
            created_at.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
        ],
    )?;
    let transaction_id = conn.last_insert_rowid();

    // remaining is the snapshot of the latest entry by (created_at, id); a
    // backdated row lands in the log without replacing it
    let latest_remaining: f64 = conn.query_row(
        "SELECT remaining FROM transactions WHERE casino_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT 1",
        [casino_id],
        |row| row.get(0),
    )?;
    if latest_remaining != amounts.remaining {
        debug!(casino_id, transaction_id, "Backdated entry, keeping newer remaining snapshot");
    }

    // deposit/payment accumulate
    conn.execute(
        "UPDATE casino SET deposit = ?1, remaining = ?2, payment = ?3 WHERE id = ?4",
        params![
            casino.deposit + amounts.deposit,
            latest_remaining,
            casino.payment + amounts.payment,
            casino_id,
        ],
    )?;

    Ok(transaction_id)
}

/// Record a transaction stamped with the current time.
pub fn record_transaction(conn: &Connection, casino_id: i64, amounts: Amounts) -> Result<i64> {
    record_transaction_at(conn, casino_id, amounts, None)
}

/// Record a transaction, optionally with an explicit creation time (backfills, imports).
///
/// The insert and the totals update run in one SQLite transaction: an unknown
/// casino or a store fault leaves both tables untouched.
pub fn record_transaction_at(
    conn: &Connection,
    casino_id: i64,
    amounts: Amounts,
    created_at: Option<NaiveDateTime>,
) -> Result<i64> {
    info!(
        casino_id,
        deposit = amounts.deposit,
        remaining = amounts.remaining,
        payment = amounts.payment,
        "Adding transaction"
    );

    let result = conn.unchecked_transaction().map_err(Error::from).and_then(|tx| {
        let id = apply_transaction(&tx, casino_id, amounts, created_at)?;
        tx.commit()?;
        Ok(id)
    });

    match &result {
        Ok(id) => info!(casino_id, transaction_id = id, "Transaction recorded"),
        Err(e) if e.is_store_fault() => {
            error!(casino_id, "Database error, transaction aborted: {}", e)
        }
        Err(e) => warn!(casino_id, "Transaction rejected: {}", e),
    }

    result
}

/// Resolve the casino by name, then record against it.
pub fn record_transaction_by_name(conn: &Connection, name: &str, amounts: Amounts) -> Result<i64> {
    let casino = get_casino_by_name(conn, name.trim())?
        .ok_or_else(|| Error::UnknownCasino(name.trim().to_string()))?;

    record_transaction(conn, casino.id, amounts)
}

// ============================================================================
// AGGREGATED VIEWS
// ============================================================================

pub fn load_overview(conn: &Connection) -> Result<Overview> {
    let casinos = get_casinos(conn)?;
    let transactions = get_transactions(conn)?;

    Ok(Overview {
        totals: OverviewTotals::from_casinos(&casinos),
        series: stats::overview_series(&transactions, &casinos),
    })
}

/// Per-casino chart data. Unknown names and casinos without history are
/// reported as distinct errors rather than an empty series.
pub fn load_casino_stats(conn: &Connection, name: &str) -> Result<CasinoSeries> {
    let name = name.trim();
    if get_casino_by_name(conn, name)?.is_none() {
        return Err(Error::UnknownCasino(name.to_string()));
    }

    let rows = get_casino_stats_by_name(conn, name)?;
    stats::casino_series(&rows).ok_or_else(|| Error::NoTransactions(name.to_string()))
}

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Path-owning handle. Every call opens its own connection and drops it before
/// returning, on success and error paths alike.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(crate::config::DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.database_path.clone()).with_busy_timeout(config.busy_timeout)
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .inspect_err(|e| error!("Failed to open database {:?}: {}", self.path, e))?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connect()?;
        op(&conn)
    }

    /// Bootstrap: make sure both tables exist.
    pub fn init(&self) -> Result<()> {
        self.with_connection(setup_database)?;
        info!("Database ready at {:?}", self.path);
        Ok(())
    }

    pub fn casinos(&self) -> Result<Vec<Casino>> {
        self.with_connection(get_casinos)
    }

    pub fn casino(&self, id: i64) -> Result<Option<Casino>> {
        self.with_connection(|conn| get_casino(conn, id))
    }

    pub fn casino_by_name(&self, name: &str) -> Result<Option<Casino>> {
        self.with_connection(|conn| get_casino_by_name(conn, name))
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        self.with_connection(get_transactions)
    }

    pub fn transaction_views(&self) -> Result<Vec<TransactionView>> {
        self.with_connection(get_transaction_views)
    }

    pub fn add_casino(&self, name: &str, link: Option<&str>) -> Result<i64> {
        self.with_connection(|conn| add_casino(conn, name, link))
    }

    pub fn record_transaction(&self, casino_id: i64, amounts: Amounts) -> Result<i64> {
        self.with_connection(|conn| record_transaction(conn, casino_id, amounts))
    }

    pub fn record_transaction_by_name(&self, name: &str, amounts: Amounts) -> Result<i64> {
        self.with_connection(|conn| record_transaction_by_name(conn, name, amounts))
    }

    pub fn overview(&self) -> Result<Overview> {
        self.with_connection(load_overview)
    }

    pub fn casino_stats(&self, name: &str) -> Result<CasinoSeries> {
        self.with_connection(|conn| load_casino_stats(conn, name))
    }
}
