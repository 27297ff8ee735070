// CSV interchange for the transaction log
//
// Export columns: id, casino, deposit, remaining, payment, created_at
// Import columns: casino, deposit, remaining, payment, created_at (optional)

use crate::db::{
    apply_transaction, get_casino_by_name, get_transaction_views, parse_timestamp, Amounts,
    TIMESTAMP_FORMAT,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: i64,
    casino: &'a str,
    deposit: f64,
    remaining: f64,
    payment: f64,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    casino: String,
    deposit: f64,
    remaining: f64,
    payment: f64,
    #[serde(default)]
    created_at: Option<String>,
}

/// Write every transaction, oldest first. Returns the number of rows written.
pub fn export_transactions<W: io::Write>(conn: &Connection, writer: W) -> Result<usize> {
    let views = get_transaction_views(conn)?;
    let mut wtr = csv::Writer::from_writer(writer);

    for view in &views {
        wtr.serialize(ExportRow {
            id: view.id,
            casino: &view.casino,
            deposit: view.deposit,
            remaining: view.remaining,
            payment: view.payment,
            created_at: view.created_at.format(TIMESTAMP_FORMAT).to_string(),
        })?;
    }
    wtr.flush()?;

    info!("Exported {} transactions", views.len());
    Ok(views.len())
}

pub fn export_file(conn: &Connection, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    export_transactions(conn, file)
}

/// Record every row through the normal transaction rules, all or nothing.
pub fn import_transactions<R: io::Read>(conn: &Connection, reader: R) -> Result<usize> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let tx = conn.unchecked_transaction()?;
    let mut imported = 0;

    for (index, result) in rdr.deserialize::<ImportRow>().enumerate() {
        let row = result?;
        // header is line 1
        let line = index + 2;

        let casino = get_casino_by_name(&tx, &row.casino)?
            .ok_or_else(|| Error::UnknownCasino(row.casino.clone()))?;

        let created_at = match row.created_at.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                Error::InvalidInput(format!("line {}: unrecognised timestamp '{}'", line, raw))
            })?),
            None => None,
        };

        apply_transaction(
            &tx,
            casino.id,
            Amounts::new(row.deposit, row.remaining, row.payment),
            created_at,
        )?;
        imported += 1;
    }

    tx.commit()?;
    info!("Imported {} transactions", imported);
    Ok(imported)
}

pub fn import_file(conn: &Connection, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    import_transactions(conn, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_casino, get_casino, get_transactions, record_transaction_at};
    use crate::reconciliation::check_totals;
    use crate::test_utils::{at, memory_db};

    #[test]
    fn test_export_writes_header_and_rows() {
        let conn = memory_db();
        let a = add_casino(&conn, "Royal", None).unwrap();
        record_transaction_at(&conn, a, Amounts::new(10.0, 5.5, 0.0), Some(at(2024, 1, 1, 10, 0))).unwrap();

        let mut out = Vec::new();
        let written = export_transactions(&conn, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 1);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,casino,deposit,remaining,payment,created_at"));
        assert_eq!(lines.next(), Some("1,Royal,10.0,5.5,0.0,2024-01-01 10:00:00"));
    }

    #[test]
    fn test_import_applies_recording_rules() {
        let conn = memory_db();
        let a = add_casino(&conn, "Royal", None).unwrap();

        let data = "casino,deposit,remaining,payment,created_at\n\
                    Royal,200,30,40,2024-01-01 09:00:00\n\
                    Royal,100,12,50,\n";
        let imported = import_transactions(&conn, data.as_bytes()).unwrap();

        assert_eq!(imported, 2);
        let casino = get_casino(&conn, a).unwrap().unwrap();
        assert_eq!(casino.deposit, 300.0);
        assert_eq!(casino.remaining, 12.0);
        assert_eq!(casino.payment, 90.0);
        assert_eq!(get_transactions(&conn).unwrap()[0].created_at, at(2024, 1, 1, 9, 0));
    }

    #[test]
    fn test_import_out_of_order_rows_keeps_totals_in_step() {
        let conn = memory_db();
        let a = add_casino(&conn, "Royal", None).unwrap();
        record_transaction_at(&conn, a, Amounts::new(100.0, 50.0, 0.0), Some(at(2024, 6, 1, 0, 0))).unwrap();

        let data = "casino,deposit,remaining,payment,created_at\n\
                    Royal,10,3,0,2024-03-01 08:00:00\n\
                    Royal,5,1,2,2024-01-01 08:00:00\n";
        assert_eq!(import_transactions(&conn, data.as_bytes()).unwrap(), 2);

        let casino = get_casino(&conn, a).unwrap().unwrap();
        assert_eq!(casino.deposit, 115.0);
        assert_eq!(casino.payment, 2.0);
        assert_eq!(casino.remaining, 50.0);
        assert!(check_totals(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_import_unknown_casino_applies_nothing() {
        let conn = memory_db();
        let a = add_casino(&conn, "Royal", None).unwrap();

        let data = "casino,deposit,remaining,payment,created_at\n\
                    Royal,10,5,0,2024-01-01\n\
                    Ghost,10,5,0,2024-01-02\n";
        let err = import_transactions(&conn, data.as_bytes()).unwrap_err();

        assert!(matches!(err, Error::UnknownCasino(ref n) if n == "Ghost"));
        assert!(get_transactions(&conn).unwrap().is_empty());
        assert_eq!(get_casino(&conn, a).unwrap().unwrap().deposit, 0.0);
    }

    #[test]
    fn test_import_bad_timestamp_is_invalid_input() {
        let conn = memory_db();
        add_casino(&conn, "Royal", None).unwrap();

        let data = "casino,deposit,remaining,payment,created_at\nRoyal,1,1,1,last week\n";
        let err = import_transactions(&conn, data.as_bytes()).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(ref m) if m.contains("line 2")));
    }

    #[test]
    fn test_export_then_import_into_fresh_ledger() {
        let source = memory_db();
        let a = add_casino(&source, "Royal", None).unwrap();
        record_transaction_at(&source, a, Amounts::new(10.0, 5.0, 0.0), Some(at(2024, 1, 1, 10, 0))).unwrap();
        record_transaction_at(&source, a, Amounts::new(20.0, 0.0, 15.0), Some(at(2024, 1, 2, 10, 0))).unwrap();

        let mut out = Vec::new();
        export_transactions(&source, &mut out).unwrap();

        // the export carries an extra id column, which import ignores
        let target = memory_db();
        add_casino(&target, "Royal", None).unwrap();
        assert_eq!(import_transactions(&target, out.as_slice()).unwrap(), 2);

        let casino = get_casino_by_name(&target, "Royal").unwrap().unwrap();
        assert_eq!(casino.deposit, 30.0);
        assert_eq!(casino.remaining, 0.0);
        assert_eq!(casino.payment, 15.0);
    }
}
