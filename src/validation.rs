// src/validation.rs
//
// Matches extracted invoice line items against purchase orders and classifies
// every discrepancy. The join is left outer: every invoice line item appears
// in the report exactly once, matched or not.

use crate::model::{
    Discrepancy, InvoiceLineItem, JoinedRow, PurchaseOrderRecord, ValidationReportRow,
    ValidationStatus, parse_due_date,
};
use std::collections::HashMap;
use tracing::info;

type PoKey<'a> = (i64, &'a str, &'a str);

/// Validate extracted invoice line items against purchase orders.
/// Matching is on (invoice_number, order_id, customer_name), with the invoice
/// number coerced to an integer on both sides. Returns one report row per
/// input line item.
pub fn validate_invoices(
    invoices: &[InvoiceLineItem],
    purchase_orders: &[PurchaseOrderRecord],
) -> Result<Vec<ValidationReportRow>, Box<dyn std::error::Error>> {
    let index = build_po_index(purchase_orders)?;

    let mut report = Vec::with_capacity(invoices.len());
    for item in invoices {
        let joined = join_line_item(item, &index)?;
        let (reasons, status) = classify(&joined);
        report.push(to_report_row(joined, reasons, status)?);
    }

    let valid = report
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Valid)
        .count();
    info!(
        rows = report.len(),
        valid,
        flagged = report.len() - valid,
        "Validation report built"
    );
    Ok(report)
}

/// The PO side must supply at most one record per key. A duplicate means the
/// reference data itself is ambiguous, which nothing downstream can resolve.
fn build_po_index(
    purchase_orders: &[PurchaseOrderRecord],
) -> Result<HashMap<PoKey<'_>, &PurchaseOrderRecord>, Box<dyn std::error::Error>> {
    let mut index = HashMap::with_capacity(purchase_orders.len());
    for po in purchase_orders {
        let key = (
            po.invoice_number,
            po.order_id.as_str(),
            po.customer_name.as_str(),
        );
        if index.insert(key, po).is_some() {
            return Err(format!(
                "ambiguous purchase order data: more than one record for \
                 (invoice_number={}, order_id={}, customer_name={})",
                po.invoice_number, po.order_id, po.customer_name
            )
            .into());
        }
    }
    Ok(index)
}

fn join_line_item(
    item: &InvoiceLineItem,
    index: &HashMap<PoKey<'_>, &PurchaseOrderRecord>,
) -> Result<JoinedRow, Box<dyn std::error::Error>> {
    let invoice_number: i64 = item.invoice_number.trim().parse().map_err(|_| {
        format!(
            "invoice number {:?} in {} is not an integer",
            item.invoice_number, item.file_name
        )
    })?;

    let po = index.get(&(
        invoice_number,
        item.order_id.as_str(),
        item.customer_name.as_str(),
    ));

    Ok(JoinedRow {
        invoice: item.clone(),
        invoice_number,
        quantity_po: po.and_then(|p| p.quantity),
        rate_po: po.and_then(|p| p.rate),
        expected_amount: po.and_then(|p| p.expected_amount),
    })
}

/// Derive the ordered discrepancy list and overall status for one joined row.
///
/// The reason order is part of the artifact contract. Quantity and rate are
/// checked independently; the amount check is a single overbilling-or-under
/// branch. Numeric comparisons are exact, so any upstream float drift surfaces
/// as a mismatch.
pub fn classify(row: &JoinedRow) -> (Vec<Discrepancy>, ValidationStatus) {
    let (Some(quantity_po), Some(rate_po), Some(expected_amount)) =
        (row.quantity_po, row.rate_po, row.expected_amount)
    else {
        return (vec![Discrepancy::MissingPo], ValidationStatus::Invalid);
    };

    let mut reasons = Vec::new();
    if row.invoice.quantity != quantity_po {
        reasons.push(Discrepancy::QuantityMismatch);
    }
    if row.invoice.rate != rate_po {
        reasons.push(Discrepancy::RateMismatch);
    }
    if row.invoice.amount > expected_amount {
        reasons.push(Discrepancy::Overbilling);
    } else if row.invoice.amount < expected_amount {
        reasons.push(Discrepancy::AmountMismatch);
    }

    if reasons.is_empty() {
        (reasons, ValidationStatus::Valid)
    } else {
        (reasons, ValidationStatus::Invalid)
    }
}

fn to_report_row(
    row: JoinedRow,
    reasons: Vec<Discrepancy>,
    status: ValidationStatus,
) -> Result<ValidationReportRow, Box<dyn std::error::Error>> {
    let due_date = parse_due_date(&row.invoice.due_date)?;
    let inv = row.invoice;
    Ok(ValidationReportRow {
        file_name: inv.file_name,
        invoice_number: row.invoice_number,
        order_id: inv.order_id,
        customer_name: inv.customer_name,
        due_date,
        ship_to: inv.ship_to,
        discount: inv.discount,
        shipping_cost: inv.shipping_cost,
        total: inv.total,
        quantity_inv: inv.quantity,
        quantity_po: row.quantity_po,
        rate_inv: inv.rate,
        rate_po: row.rate_po,
        amount: inv.amount,
        expected_amount: row.expected_amount,
        validation_result: reasons,
        validation_status: status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format_validation_result;

    fn line_item(invoice_number: &str, quantity: u32, rate: f64, amount: f64) -> InvoiceLineItem {
        InvoiceLineItem {
            file_name: "invoice_1.pdf".to_string(),
            invoice_number: invoice_number.to_string(),
            order_id: "ES-2025-001".to_string(),
            customer_name: "Bill Eplett".to_string(),
            due_date: "Aug 06 2025".to_string(),
            ship_to: "100 Main St, Seattle, West".to_string(),
            discount: 0.0,
            shipping_cost: 25.0,
            total: amount,
            item_name: "Canon Wireless Fax".to_string(),
            quantity,
            rate,
            amount,
        }
    }

    fn purchase_order(
        invoice_number: i64,
        quantity: u32,
        rate: f64,
        expected_amount: f64,
    ) -> PurchaseOrderRecord {
        PurchaseOrderRecord {
            invoice_number,
            order_id: "ES-2025-001".to_string(),
            customer_name: "Bill Eplett".to_string(),
            quantity: Some(quantity),
            rate: Some(rate),
            expected_amount: Some(expected_amount),
        }
    }

    #[test]
    fn exact_match_is_valid() {
        let report = validate_invoices(
            &[line_item("1001", 100, 63.11, 6311.0)],
            &[purchase_order(1001, 100, 63.11, 6311.0)],
        )
        .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].validation_status, ValidationStatus::Valid);
        assert_eq!(format_validation_result(&report[0].validation_result), "Match");
    }

    #[test]
    fn quantity_then_overbilling_in_order() {
        // 150 billed against a PO for 100 at the same rate: both the quantity
        // check and the amount check fire, in that order.
        let report = validate_invoices(
            &[line_item("1001", 150, 63.11, 9466.50)],
            &[purchase_order(1001, 100, 63.11, 6311.00)],
        )
        .unwrap();
        assert_eq!(
            report[0].validation_result,
            vec![Discrepancy::QuantityMismatch, Discrepancy::Overbilling]
        );
        assert_eq!(report[0].validation_status, ValidationStatus::Invalid);
    }

    #[test]
    fn underbilling_is_amount_mismatch() {
        let report = validate_invoices(
            &[line_item("1001", 100, 63.11, 5000.0)],
            &[purchase_order(1001, 100, 63.11, 6311.0)],
        )
        .unwrap();
        assert_eq!(report[0].validation_result, vec![Discrepancy::AmountMismatch]);
    }

    #[test]
    fn rate_mismatch_is_independent_of_quantity() {
        let report = validate_invoices(
            &[line_item("1001", 100, 70.0, 6311.0)],
            &[purchase_order(1001, 100, 63.11, 6311.0)],
        )
        .unwrap();
        assert_eq!(report[0].validation_result, vec![Discrepancy::RateMismatch]);
    }

    #[test]
    fn unmatched_invoice_is_missing_po() {
        let report =
            validate_invoices(&[line_item("9999", 100, 63.11, 6311.0)], &[]).unwrap();
        assert_eq!(report[0].validation_result, vec![Discrepancy::MissingPo]);
        assert_eq!(report[0].quantity_po, None);
        assert_eq!(report[0].expected_amount, None);
    }

    #[test]
    fn blank_po_field_is_missing_po() {
        let mut po = purchase_order(1001, 100, 63.11, 6311.0);
        po.expected_amount = None;
        let report = validate_invoices(&[line_item("1001", 100, 63.11, 6311.0)], &[po]).unwrap();
        assert_eq!(report[0].validation_result, vec![Discrepancy::MissingPo]);
    }

    #[test]
    fn left_join_never_drops_rows() {
        let invoices = vec![
            line_item("1001", 100, 63.11, 6311.0),
            line_item("1002", 10, 5.0, 50.0),
            line_item("1003", 1, 1.0, 1.0),
        ];
        let report =
            validate_invoices(&invoices, &[purchase_order(1001, 100, 63.11, 6311.0)]).unwrap();
        assert_eq!(report.len(), invoices.len());
    }

    #[test]
    fn duplicate_po_key_is_fatal() {
        let result = validate_invoices(
            &[line_item("1001", 100, 63.11, 6311.0)],
            &[
                purchase_order(1001, 100, 63.11, 6311.0),
                purchase_order(1001, 200, 63.11, 12622.0),
            ],
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("ambiguous purchase order data"), "{err}");
    }

    #[test]
    fn non_integer_invoice_number_is_fatal() {
        let result = validate_invoices(&[line_item("INV-1001", 100, 63.11, 6311.0)], &[]);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_due_date_is_fatal() {
        let mut item = line_item("1001", 100, 63.11, 6311.0);
        item.due_date = "2025-08-06".to_string();
        assert!(validate_invoices(&[item], &[]).is_err());
    }

    #[test]
    fn classification_is_deterministic() {
        let invoices = vec![line_item("1001", 150, 70.0, 9466.50)];
        let orders = vec![purchase_order(1001, 100, 63.11, 6311.00)];
        let first = validate_invoices(&invoices, &orders).unwrap();
        let second = validate_invoices(&invoices, &orders).unwrap();
        assert_eq!(first[0].validation_result, second[0].validation_result);
        assert_eq!(first[0].validation_status, second[0].validation_status);
        assert_eq!(
            first[0].validation_result,
            vec![
                Discrepancy::QuantityMismatch,
                Discrepancy::RateMismatch,
                Discrepancy::Overbilling
            ]
        );
    }
}
