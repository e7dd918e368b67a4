// src/model.rs

use serde::{Deserialize, Serialize};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// Due dates are exchanged everywhere as e.g. "Aug 06 2025". Date comparisons
/// drive payment eligibility, so parsing is strict: anything that does not
/// match this exact shape is an error, never a skip.
pub const DUE_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:short] [day] [year]");

pub fn parse_due_date(raw: &str) -> Result<Date, Box<dyn std::error::Error>> {
    Date::parse(raw.trim(), DUE_DATE_FORMAT).map_err(|e| {
        format!("unparseable due date {raw:?} (expected e.g. \"Aug 06 2025\"): {e}").into()
    })
}

pub fn format_due_date(date: Date) -> String {
    date.format(DUE_DATE_FORMAT)
        .expect("static due date format is well-formed")
}

/// One extracted invoice line item, one row per (invoice, item).
/// Produced once by the extraction pass and immutable afterwards.
/// `invoice_number` and `due_date` are kept exactly as extracted; coercion
/// happens at the validation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub file_name: String,
    pub invoice_number: String,
    pub order_id: String,
    pub customer_name: String,
    pub due_date: String,
    pub ship_to: String,
    pub discount: f64,
    pub shipping_cost: f64,
    pub total: f64,
    pub item_name: String,
    pub quantity: u32,
    pub rate: f64,
    pub amount: f64,
}

/// Reference data from the purchase-orders CSV. The three numeric fields are
/// individually optional: a blank cell counts as missing PO data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub invoice_number: i64,
    pub order_id: String,
    pub customer_name: String,
    pub quantity: Option<u32>,
    pub rate: Option<f64>,
    pub expected_amount: Option<f64>,
}

/// One invoice line item joined (left outer) against at most one purchase
/// order. Unmatched rows carry `None` on every PO-side field.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    pub invoice: InvoiceLineItem,
    /// Invoice number coerced to an integer for the join.
    pub invoice_number: i64,
    pub quantity_po: Option<u32>,
    pub rate_po: Option<f64>,
    pub expected_amount: Option<f64>,
}

/// A single discrepancy between an invoice line item and its purchase order.
/// The display strings are part of the report artifact and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discrepancy {
    MissingPo,
    QuantityMismatch,
    RateMismatch,
    Overbilling,
    AmountMismatch,
}

impl Discrepancy {
    pub fn as_str(self) -> &'static str {
        match self {
            Discrepancy::MissingPo => "Missing PO",
            Discrepancy::QuantityMismatch => "Quantity Mismatch",
            Discrepancy::RateMismatch => "Rate Mismatch",
            Discrepancy::Overbilling => "Overbilling",
            Discrepancy::AmountMismatch => "Amount Mismatch",
        }
    }

    pub fn parse(s: &str) -> Option<Discrepancy> {
        match s {
            "Missing PO" => Some(Discrepancy::MissingPo),
            "Quantity Mismatch" => Some(Discrepancy::QuantityMismatch),
            "Rate Mismatch" => Some(Discrepancy::RateMismatch),
            "Overbilling" => Some(Discrepancy::Overbilling),
            "Amount Mismatch" => Some(Discrepancy::AmountMismatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `validation_result` column: "Match" for an empty reason list,
/// otherwise the reasons joined with ", " in classification order.
pub fn format_validation_result(reasons: &[Discrepancy]) -> String {
    if reasons.is_empty() {
        "Match".to_string()
    } else {
        reasons
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn parse_validation_result(s: &str) -> Result<Vec<Discrepancy>, String> {
    if s == "Match" {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(str::trim)
        .map(|part| {
            Discrepancy::parse(part).ok_or_else(|| format!("unknown discrepancy reason {part:?}"))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    #[serde(rename = "VALID")]
    Valid,
    #[serde(rename = "INVALID")]
    Invalid,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ValidationStatus::Valid => "VALID",
            ValidationStatus::Invalid => "INVALID",
        })
    }
}

/// One row of the validation report artifact, rewritten every pass.
/// Column names and order match the persisted CSV exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReportRow {
    pub file_name: String,
    #[serde(rename = "invoice_number_inv")]
    pub invoice_number: i64,
    pub order_id: String,
    pub customer_name: String,
    #[serde(with = "due_date_serde")]
    pub due_date: Date,
    pub ship_to: String,
    pub discount: f64,
    pub shipping_cost: f64,
    pub total: f64,
    pub quantity_inv: u32,
    pub quantity_po: Option<u32>,
    pub rate_inv: f64,
    pub rate_po: Option<f64>,
    pub amount: f64,
    pub expected_amount: Option<f64>,
    #[serde(with = "validation_result_serde")]
    pub validation_result: Vec<Discrepancy>,
    pub validation_status: ValidationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    Auto,
    PreviouslyPaid,
}

impl std::fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PaymentMode::Auto => "Auto",
            PaymentMode::PreviouslyPaid => "PreviouslyPaid",
        })
    }
}

/// One row of the durable payment log: the only source of truth about which
/// payment actions have ever been taken. Appended to, never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLogEntry {
    pub order_id: String,
    pub customer_name: String,
    #[serde(with = "due_date_serde")]
    pub due_date: Date,
    pub amount: f64,
    pub transaction_id: String,
    pub status: String,
    pub timestamp: String,
    pub message: String,
    pub justification: String,
    pub payment_mode: PaymentMode,
}

impl PaymentLogEntry {
    /// Deduplication identity across the lifetime of the log.
    pub fn identity(&self) -> (&str, &str) {
        (&self.order_id, &self.customer_name)
    }
}

/// Serde adapter keeping `Date` fields in the "%b %d %Y" artifact format.
pub mod due_date_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_due_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_due_date(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter between the reason list and its comma-joined column text.
pub mod validation_result_serde {
    use super::Discrepancy;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        reasons: &[Discrepancy],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_validation_result(reasons))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Discrepancy>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_validation_result(&raw).map_err(serde::de::Error::custom)
    }
}
