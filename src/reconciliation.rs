// Totals reconciliation - rebuild casino totals from the transaction log
//
// The deposit/remaining/payment columns on `casino` are a cache. The log in
// `transactions` is authoritative:
//   deposit   = sum of deposits
//   payment   = sum of payments
//   remaining = remaining of the latest transaction (created_at, then id)
// A casino with no transactions reconciles to all zeros.

use crate::db::{get_casinos, get_transactions, Casino};
use crate::error::Result;
use crate::stats;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Differences below this are floating-point noise, not drift.
pub const TOLERANCE: f64 = 0.005;

// ============================================================================
// RECOMPUTED TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CasinoTotals {
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
}

impl CasinoTotals {
    pub fn of(casino: &Casino) -> Self {
        Self {
            deposit: casino.deposit,
            remaining: casino.remaining,
            payment: casino.payment,
        }
    }

    pub fn profit(&self) -> f64 {
        stats::profit(self.deposit, self.remaining, self.payment)
    }

    fn matches(&self, other: &CasinoTotals, tolerance: f64) -> bool {
        (self.deposit - other.deposit).abs() < tolerance
            && (self.remaining - other.remaining).abs() < tolerance
            && (self.payment - other.payment).abs() < tolerance
    }
}

/// Totals every casino should carry according to the log, keyed by casino id.
pub fn recompute_totals(conn: &Connection) -> Result<BTreeMap<i64, CasinoTotals>> {
    let mut totals: BTreeMap<i64, CasinoTotals> = get_casinos(conn)?
        .into_iter()
        .map(|c| (c.id, CasinoTotals::default()))
        .collect();

    // get_transactions is ordered, so the last write to `remaining` wins
    for tx in get_transactions(conn)? {
        let entry = totals.entry(tx.casino_id).or_default();
        entry.deposit += tx.deposit;
        entry.payment += tx.payment;
        entry.remaining = tx.remaining;
    }

    Ok(totals)
}

// ============================================================================
// DRIFT DETECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsDrift {
    pub casino_id: i64,
    pub name: String,
    pub cached: CasinoTotals,
    pub expected: CasinoTotals,
}

impl TotalsDrift {
    pub fn summary(&self) -> String {
        format!(
            "{} (#{}): cached deposit {:.2} / remaining {:.2} / payment {:.2}, log says {:.2} / {:.2} / {:.2}",
            self.name,
            self.casino_id,
            self.cached.deposit,
            self.cached.remaining,
            self.cached.payment,
            self.expected.deposit,
            self.expected.remaining,
            self.expected.payment,
        )
    }
}

/// Casinos whose cached totals disagree with their transaction log.
pub fn check_totals(conn: &Connection) -> Result<Vec<TotalsDrift>> {
    let expected = recompute_totals(conn)?;

    let drifts: Vec<TotalsDrift> = get_casinos(conn)?
        .into_iter()
        .filter_map(|casino| {
            let want = expected.get(&casino.id).copied().unwrap_or_default();
            let have = CasinoTotals::of(&casino);
            if have.matches(&want, TOLERANCE) {
                None
            } else {
                Some(TotalsDrift {
                    casino_id: casino.id,
                    name: casino.name,
                    cached: have,
                    expected: want,
                })
            }
        })
        .collect();

    for drift in &drifts {
        warn!("Totals drift: {}", drift.summary());
    }

    Ok(drifts)
}

/// Rewrite every drifted casino from the log in one store transaction.
/// Returns how many casinos were corrected.
pub fn repair_totals(conn: &Connection) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let drifts = check_totals(&tx)?;

    for drift in &drifts {
        tx.execute(
            "UPDATE casino SET deposit = ?1, remaining = ?2, payment = ?3 WHERE id = ?4",
            params![
                drift.expected.deposit,
                drift.expected.remaining,
                drift.expected.payment,
                drift.casino_id,
            ],
        )?;
    }

    tx.commit()?;
    info!("Repaired totals for {} casino(s)", drifts.len());
    Ok(drifts.len())
}
