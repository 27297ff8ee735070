// Database transfer - copy a whole ledger into another database file
//
// Ids are preserved so transactions keep pointing at their casinos. The copy
// runs inside one transaction on the target: a clash with rows already there
// aborts the whole transfer.

use crate::db::{get_casinos, get_transactions, setup_database, TIMESTAMP_FORMAT};
use crate::error::{Error, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub casinos: usize,
    pub transactions: usize,
}

pub fn move_database_data(source: &Connection, target: &Connection) -> Result<TransferReport> {
    setup_database(target)?;

    let casinos = get_casinos(source)?;
    let transactions = get_transactions(source)?;

    let result = target.unchecked_transaction().map_err(Error::from).and_then(|tx| {
        for casino in &casinos {
            tx.execute(
                "INSERT INTO casino (id, name, link, deposit, remaining, payment)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    casino.id,
                    casino.name,
                    casino.link,
                    casino.deposit,
                    casino.remaining,
                    casino.payment,
                ],
            )?;
        }

        for t in &transactions {
            tx.execute(
                "INSERT INTO transactions (id, casino_id, deposit, remaining, payment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    t.id,
                    t.casino_id,
                    t.deposit,
                    t.remaining,
                    t.payment,
                    t.created_at.format(TIMESTAMP_FORMAT).to_string(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(TransferReport {
            casinos: casinos.len(),
            transactions: transactions.len(),
        })
    });

    match &result {
        Ok(report) => info!(
            "Data transfer complete: {} casinos, {} transactions",
            report.casinos, report.transactions
        ),
        Err(e) => error!("Data transfer aborted: {}", e),
    }

    result
}
