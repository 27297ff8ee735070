// Cumulative statistics for the overview and per-casino charts
//
// Pure, single-pass transformations over rows already read from the store.
// Deposits and payments are running sums; remaining is a snapshot per casino
// that is overwritten, never summed across time.

use crate::db::{Casino, StatRow, Transaction};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// Profit derived from the three totals. Never stored.
pub fn profit(deposit: f64, remaining: f64, payment: f64) -> f64 {
    payment + remaining - deposit
}

// ============================================================================
// OVERVIEW
// ============================================================================

/// Summary labels: sum of every casino's cached totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverviewTotals {
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
    pub profit: f64,
}

impl OverviewTotals {
    pub fn from_casinos(casinos: &[Casino]) -> Self {
        let (deposit, remaining, payment) = casinos.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.deposit, acc.1 + c.remaining, acc.2 + c.payment)
        });

        Self {
            deposit,
            remaining,
            payment,
            profit: profit(deposit, remaining, payment),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverviewPoint {
    pub date: NaiveDate,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
    pub profit: f64,
}

/// One point per calendar date that carries at least one transaction, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverviewSeries {
    pub points: Vec<OverviewPoint>,
}

impl OverviewSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn deposits(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.deposit).collect()
    }

    pub fn remaining(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.remaining).collect()
    }

    pub fn payments(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.payment).collect()
    }

    pub fn profits(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.profit).collect()
    }
}

/// Everything the overview tab shows: summary labels plus the chart series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub totals: OverviewTotals,
    pub series: OverviewSeries,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    deposit: f64,
    remaining: f64,
    payment: f64,
}

/// Build the four overview series from every transaction across all casinos.
///
/// Transactions are visited by full timestamp; the date bucket for each keeps
/// the latest snapshot of that day. Deposits and payments are then clamped so
/// they never decrease across the dates present, remaining is taken as-is.
pub fn overview_series(transactions: &[Transaction], casinos: &[Casino]) -> OverviewSeries {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    // last known remaining per casino, every known casino starts at zero
    let mut remaining_by_casino: BTreeMap<i64, f64> =
        casinos.iter().map(|c| (c.id, 0.0)).collect();
    let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    let mut total_deposit = 0.0;
    let mut total_payment = 0.0;

    for tx in ordered {
        total_deposit += tx.deposit;
        total_payment += tx.payment;
        remaining_by_casino.insert(tx.casino_id, tx.remaining);

        buckets.insert(
            tx.created_at.date(),
            Bucket {
                deposit: total_deposit,
                remaining: remaining_by_casino.values().sum(),
                payment: total_payment,
            },
        );
    }

    let mut last_deposit: f64 = 0.0;
    let mut last_payment: f64 = 0.0;
    let points = buckets
        .into_iter()
        .map(|(date, bucket)| {
            last_deposit = last_deposit.max(bucket.deposit);
            last_payment = last_payment.max(bucket.payment);

            OverviewPoint {
                date,
                deposit: last_deposit,
                remaining: bucket.remaining,
                payment: last_payment,
                profit: profit(last_deposit, bucket.remaining, last_payment),
            }
        })
        .collect();

    OverviewSeries { points }
}

// ============================================================================
// PER-CASINO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CasinoPoint {
    pub timestamp: NaiveDateTime,
    pub deposit: f64,
    pub remaining: f64,
    pub payment: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CasinoSummary {
    pub total_deposit: f64,
    /// Snapshot from the last transaction, not a sum
    pub total_remaining: f64,
    pub total_payment: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CasinoSeries {
    pub points: Vec<CasinoPoint>,
    pub summary: CasinoSummary,
}

/// Running deposit/payment next to the raw remaining snapshot, one point per row.
///
/// Returns `None` when there is nothing to chart; callers turn that into a
/// user-facing "no transactions" message.
pub fn casino_series(rows: &[StatRow]) -> Option<CasinoSeries> {
    let last = rows.last()?;

    let mut deposit = 0.0;
    let mut payment = 0.0;
    let points: Vec<CasinoPoint> = rows
        .iter()
        .map(|row| {
            deposit += row.deposit;
            payment += row.payment;
            CasinoPoint {
                timestamp: row.created_at,
                deposit,
                remaining: row.remaining,
                payment,
                profit: profit(deposit, row.remaining, payment),
            }
        })
        .collect();

    let summary = CasinoSummary {
        total_deposit: deposit,
        total_remaining: last.remaining,
        total_payment: payment,
        profit: profit(deposit, last.remaining, payment),
    };

    Some(CasinoSeries { points, summary })
}
