// src/store.rs
//
// Persistence. Extracted line items live in a small SQLite store so a re-run
// never re-extracts a PDF it has already paid for; the validation report and
// payment log are CSV artifacts with fixed column sets.

use crate::model::{InvoiceLineItem, PaymentLogEntry, PurchaseOrderRecord, ValidationReportRow};
use rusqlite::{Connection, Result as SqliteResult, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

pub struct InvoiceStore {
    conn: Connection,
}

impl InvoiceStore {
    /// Open (or create) the extraction store at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<InvoiceStore> {
        InvoiceStore::with_connection(Connection::open(db_path)?)
    }

    #[cfg(test)]
    fn in_memory() -> SqliteResult<InvoiceStore> {
        InvoiceStore::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqliteResult<InvoiceStore> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS line_items (
                uid TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                invoice_number TEXT NOT NULL,
                order_id TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                due_date TEXT NOT NULL,
                ship_to TEXT NOT NULL,
                discount REAL NOT NULL,
                shipping_cost REAL NOT NULL,
                total REAL NOT NULL,
                item_name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                rate REAL NOT NULL,
                amount REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed_files (
                file_name TEXT PRIMARY KEY,
                processed_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_line_items_file ON line_items(file_name)",
            [],
        )?;

        info!("Invoice store initialized");
        Ok(InvoiceStore { conn })
    }

    /// Stable row identity: same PDF, invoice, item, and position always hash
    /// to the same uid, so re-inserting an already-stored item is an upsert.
    pub fn generate_uid(
        file_name: &str,
        invoice_number: &str,
        item_name: &str,
        item_index: usize,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_name.as_bytes());
        hasher.update(invoice_number.as_bytes());
        hasher.update(item_name.as_bytes());
        hasher.update(item_index.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn upsert_line_item(&self, item: &InvoiceLineItem, item_index: usize) -> SqliteResult<()> {
        let uid = InvoiceStore::generate_uid(
            &item.file_name,
            &item.invoice_number,
            &item.item_name,
            item_index,
        );
        self.conn.execute(
            "INSERT INTO line_items
                (uid, file_name, invoice_number, order_id, customer_name, due_date,
                 ship_to, discount, shipping_cost, total, item_name, quantity, rate, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(uid) DO UPDATE SET
                order_id = excluded.order_id,
                customer_name = excluded.customer_name,
                due_date = excluded.due_date,
                ship_to = excluded.ship_to,
                discount = excluded.discount,
                shipping_cost = excluded.shipping_cost,
                total = excluded.total,
                quantity = excluded.quantity,
                rate = excluded.rate,
                amount = excluded.amount",
            params![
                uid,
                item.file_name,
                item.invoice_number,
                item.order_id,
                item.customer_name,
                item.due_date,
                item.ship_to,
                item.discount,
                item.shipping_cost,
                item.total,
                item.item_name,
                item.quantity,
                item.rate,
                item.amount,
            ],
        )?;
        Ok(())
    }

    pub fn is_file_processed(&self, file_name: &str) -> SqliteResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM processed_files WHERE file_name = ?1",
            params![file_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mark_file_processed(&self, file_name: &str) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO processed_files (file_name) VALUES (?1)",
            params![file_name],
        )?;
        info!(file = %file_name, "Invoice PDF marked processed");
        Ok(())
    }

    /// All stored line items in insertion order.
    pub fn get_line_items(&self) -> SqliteResult<Vec<InvoiceLineItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_name, invoice_number, order_id, customer_name, due_date,
                    ship_to, discount, shipping_cost, total, item_name, quantity, rate, amount
             FROM line_items
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InvoiceLineItem {
                file_name: row.get(0)?,
                invoice_number: row.get(1)?,
                order_id: row.get(2)?,
                customer_name: row.get(3)?,
                due_date: row.get(4)?,
                ship_to: row.get(5)?,
                discount: row.get(6)?,
                shipping_cost: row.get(7)?,
                total: row.get(8)?,
                item_name: row.get(9)?,
                quantity: row.get(10)?,
                rate: row.get(11)?,
                amount: row.get(12)?,
            })
        })?;
        rows.collect()
    }

    /// (stored line items, processed files)
    pub fn counts(&self) -> SqliteResult<(usize, usize)> {
        let items: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM line_items", [], |row| row.get(0))?;
        let files: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM processed_files", [], |row| row.get(0))?;
        Ok((items, files))
    }
}

pub fn load_purchase_orders(
    path: &Path,
) -> Result<Vec<PurchaseOrderRecord>, Box<dyn std::error::Error>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| format!("failed to open purchase orders {}: {e}", path.display()))?;
    let mut orders = Vec::new();
    for record in reader.deserialize() {
        orders.push(record?);
    }
    info!(records = orders.len(), "Purchase orders loaded");
    Ok(orders)
}

/// Rewritten from scratch on every pass; the report is a derived view.
pub fn write_validation_report(
    path: &Path,
    report: &[ValidationReportRow],
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for row in report {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(rows = report.len(), path = %path.display(), "Validation report written");
    Ok(())
}

/// Empty when no report has been produced yet.
pub fn load_validation_report(
    path: &Path,
) -> Result<Vec<ValidationReportRow>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut report = Vec::new();
    for record in reader.deserialize() {
        report.push(record?);
    }
    Ok(report)
}

/// Empty when no payment has ever been logged.
pub fn load_payment_log(path: &Path) -> Result<Vec<PaymentLogEntry>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

/// Persist the merged log, replacing the previous snapshot with its superset.
pub fn write_payment_log(
    path: &Path,
    entries: &[PaymentLogEntry],
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    info!(entries = entries.len(), path = %path.display(), "Payment log written");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Discrepancy, PaymentMode, ValidationStatus};
    use std::path::PathBuf;
    use time::macros::date;

    fn line_item(file_name: &str, item_name: &str) -> InvoiceLineItem {
        InvoiceLineItem {
            file_name: file_name.to_string(),
            invoice_number: "1001".to_string(),
            order_id: "ES-2025-001".to_string(),
            customer_name: "Bill Eplett".to_string(),
            due_date: "Aug 06 2025".to_string(),
            ship_to: "Seattle, West".to_string(),
            discount: 0.0,
            shipping_cost: 25.0,
            total: 6311.0,
            item_name: item_name.to_string(),
            quantity: 100,
            rate: 63.11,
            amount: 6311.0,
        }
    }

    fn log_entry(order_id: &str) -> PaymentLogEntry {
        PaymentLogEntry {
            order_id: order_id.to_string(),
            customer_name: "Bill Eplett".to_string(),
            due_date: date!(2025 - 08 - 06),
            amount: 6311.0,
            transaction_id: "TXN-12345".to_string(),
            status: "SUCCESS".to_string(),
            timestamp: "2025-08-06T00:00:00Z".to_string(),
            message: "Payment triggered for Bill Eplett ($6311)".to_string(),
            justification: "Verified with no discrepancies".to_string(),
            payment_mode: PaymentMode::Auto,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("invoiceguard-{}-{name}", std::process::id()))
    }

    #[test]
    fn uid_is_stable_and_position_sensitive() {
        let a = InvoiceStore::generate_uid("f.pdf", "1001", "Fax", 0);
        let b = InvoiceStore::generate_uid("f.pdf", "1001", "Fax", 0);
        let c = InvoiceStore::generate_uid("f.pdf", "1001", "Fax", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn line_items_round_trip_in_insertion_order() {
        let store = InvoiceStore::in_memory().unwrap();
        store.upsert_line_item(&line_item("a.pdf", "Fax"), 0).unwrap();
        store.upsert_line_item(&line_item("a.pdf", "Toner"), 1).unwrap();
        store.upsert_line_item(&line_item("b.pdf", "Desk"), 0).unwrap();

        let items = store.get_line_items().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].item_name, "Fax");
        assert_eq!(items[2].file_name, "b.pdf");
        assert_eq!(store.counts().unwrap(), (3, 0));
    }

    #[test]
    fn reinserting_an_item_does_not_duplicate() {
        let store = InvoiceStore::in_memory().unwrap();
        store.upsert_line_item(&line_item("a.pdf", "Fax"), 0).unwrap();
        let mut updated = line_item("a.pdf", "Fax");
        updated.amount = 9999.0;
        store.upsert_line_item(&updated, 0).unwrap();

        let items = store.get_line_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, 9999.0);
    }

    #[test]
    fn processed_file_tracking() {
        let store = InvoiceStore::in_memory().unwrap();
        assert!(!store.is_file_processed("a.pdf").unwrap());
        store.mark_file_processed("a.pdf").unwrap();
        store.mark_file_processed("a.pdf").unwrap(); // idempotent
        assert!(store.is_file_processed("a.pdf").unwrap());
        assert_eq!(store.counts().unwrap(), (0, 1));
    }

    #[test]
    fn payment_log_survives_rewrite_cycles() {
        let path = temp_path("log.csv");
        assert!(load_payment_log(&path).unwrap().is_empty());

        write_payment_log(&path, &[log_entry("ES-1")]).unwrap();
        let first = load_payment_log(&path).unwrap();
        assert_eq!(first.len(), 1);

        // Next pass: append and rewrite with the superset.
        let merged = crate::payments::append_log(first, vec![log_entry("ES-2")]);
        write_payment_log(&path, &merged).unwrap();

        let reloaded = load_payment_log(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded[0].order_id, "ES-1");
        assert_eq!(reloaded[1].order_id, "ES-2");
        assert_eq!(reloaded[1].payment_mode, PaymentMode::Auto);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn validation_report_round_trips_reasons_and_blanks() {
        let path = temp_path("report.csv");
        let row = ValidationReportRow {
            file_name: "invoice_1.pdf".to_string(),
            invoice_number: 1001,
            order_id: "ES-2025-001".to_string(),
            customer_name: "Bill Eplett".to_string(),
            due_date: date!(2025 - 08 - 06),
            ship_to: "Seattle, West".to_string(),
            discount: 0.0,
            shipping_cost: 25.0,
            total: 9466.5,
            quantity_inv: 150,
            quantity_po: None,
            rate_inv: 63.11,
            rate_po: None,
            amount: 9466.5,
            expected_amount: None,
            validation_result: vec![Discrepancy::MissingPo],
            validation_status: ValidationStatus::Invalid,
        };
        write_validation_report(&path, &[row]).unwrap();

        let report = load_validation_report(&path).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].invoice_number, 1001);
        assert_eq!(report[0].due_date, date!(2025 - 08 - 06));
        assert_eq!(report[0].quantity_po, None);
        assert_eq!(report[0].validation_result, vec![Discrepancy::MissingPo]);
        assert_eq!(report[0].validation_status, ValidationStatus::Invalid);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_artifacts_load_as_empty() {
        assert!(load_validation_report(&temp_path("absent-report.csv")).unwrap().is_empty());
        assert!(load_payment_log(&temp_path("absent-log.csv")).unwrap().is_empty());
    }
}
