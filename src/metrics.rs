// src/metrics.rs
//
// Summary counts and display rows derived from the validation report and the
// payment log. Pure functions over the two artifacts.

use crate::model::{
    PaymentLogEntry, PaymentMode, ValidationReportRow, ValidationStatus, format_due_date,
    format_validation_result,
};
use serde::Serialize;
use std::collections::BTreeMap;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub total: usize,
    pub valid: usize,
    pub flagged: usize,
    pub paid_today: usize,
    pub overdue_unpaid: usize,
}

/// Past-due VALID rows are always backfilled by the payment pass, so the only
/// genuinely unpaid overdue rows are the INVALID ones.
pub fn compute(report: &[ValidationReportRow], log: &[PaymentLogEntry], today: Date) -> Metrics {
    let total = report.len();
    let valid = report
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Valid)
        .count();
    let paid_today = log
        .iter()
        .filter(|e| e.due_date == today && e.status == "SUCCESS")
        .count();
    let overdue_unpaid = report
        .iter()
        .filter(|r| r.due_date < today && r.validation_status == ValidationStatus::Invalid)
        .count();
    Metrics {
        total,
        valid,
        flagged: total - valid,
        paid_today,
        overdue_unpaid,
    }
}

pub fn days_until_due(due_date: Date, today: Date) -> i64 {
    (due_date - today).whole_days()
}

/// Payment-log display row, newest activity first.
#[derive(Debug, Clone)]
pub struct PaymentLogViewRow {
    pub order_id: String,
    pub customer_name: String,
    pub amount: f64,
    pub due_date: String,
    pub transaction_id: String,
    pub status: String,
    pub timestamp: String,
    pub days_until_due: i64,
    pub message: String,
    pub payment_mode: PaymentMode,
}

pub fn payment_log_view(log: &[PaymentLogEntry], today: Date) -> Vec<PaymentLogViewRow> {
    let mut entries: Vec<&PaymentLogEntry> = log.iter().collect();
    entries.sort_by(|a, b| {
        (b.timestamp.as_str(), b.due_date).cmp(&(a.timestamp.as_str(), a.due_date))
    });
    entries
        .into_iter()
        .map(|e| PaymentLogViewRow {
            order_id: e.order_id.clone(),
            customer_name: e.customer_name.clone(),
            amount: e.amount,
            due_date: format_due_date(e.due_date),
            transaction_id: e.transaction_id.clone(),
            status: e.status.clone(),
            timestamp: e.timestamp.clone(),
            days_until_due: days_until_due(e.due_date, today),
            message: e.message.clone(),
            payment_mode: e.payment_mode,
        })
        .collect()
}

/// Overdue-and-unpaid display row (INVALID rows past their due date).
#[derive(Debug, Clone)]
pub struct OverdueUnpaidRow {
    pub order_id: String,
    pub customer_name: String,
    pub amount: f64,
    pub due_date: String,
    pub status: String,
    pub validation_result: String,
    pub days_until_due: i64,
}

pub fn overdue_unpaid_view(report: &[ValidationReportRow], today: Date) -> Vec<OverdueUnpaidRow> {
    let mut rows: Vec<&ValidationReportRow> = report
        .iter()
        .filter(|r| r.due_date < today && r.validation_status == ValidationStatus::Invalid)
        .collect();
    rows.sort_by(|a, b| b.due_date.cmp(&a.due_date));
    rows.into_iter()
        .map(|r| OverdueUnpaidRow {
            order_id: r.order_id.clone(),
            customer_name: r.customer_name.clone(),
            amount: r.total,
            due_date: format_due_date(r.due_date),
            status: "Flagged".to_string(),
            validation_result: format_validation_result(&r.validation_result),
            days_until_due: days_until_due(r.due_date, today),
        })
        .collect()
}

/// Per-region aggregate over the validation report.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStats {
    pub region: String,
    pub total_sales: f64,
    pub total_shipping: f64,
    pub num_invoices: usize,
}

/// The region is the last comma-separated segment of ship_to; rows without a
/// comma fall into "Unknown".
pub fn region_from_ship_to(ship_to: &str) -> String {
    let trimmed = ship_to.trim();
    match trimmed.rsplit_once(',') {
        Some((_, region)) => region.trim().to_string(),
        None => "Unknown".to_string(),
    }
}

pub fn region_stats(report: &[ValidationReportRow]) -> Vec<RegionStats> {
    let mut by_region: BTreeMap<String, RegionStats> = BTreeMap::new();
    for row in report {
        let region = region_from_ship_to(&row.ship_to);
        let stats = by_region.entry(region.clone()).or_insert(RegionStats {
            region,
            total_sales: 0.0,
            total_shipping: 0.0,
            num_invoices: 0,
        });
        stats.total_sales += row.total;
        stats.total_shipping += row.shipping_cost;
        stats.num_invoices += 1;
    }
    by_region.into_values().collect()
}
