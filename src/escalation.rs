// src/escalation.rs
//
// Escalation payload for invoices a reviewer must look at, plus the rendered
// email content. Actual delivery belongs to the email collaborator; this
// module only produces the notice and its HTML/plain-text bodies.

use crate::genai::risk::RiskRecommendation;
use crate::model::{Discrepancy, ValidationReportRow, format_due_date, format_validation_result};
use regex::Regex;

/// One row of the field-by-field comparison table shown to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComparison {
    pub field: String,
    pub invoice_value: String,
    pub po_value: String,
}

/// Derive the comparison table from the discrepancy list, in classification
/// order. Missing-PO rows have nothing to compare against.
pub fn build_field_comparison(row: &ValidationReportRow) -> Vec<FieldComparison> {
    let mut comparison = Vec::new();
    for reason in &row.validation_result {
        match reason {
            Discrepancy::QuantityMismatch => comparison.push(FieldComparison {
                field: "Quantity".to_string(),
                invoice_value: row.quantity_inv.to_string(),
                po_value: row.quantity_po.map(|q| q.to_string()).unwrap_or_default(),
            }),
            Discrepancy::RateMismatch => comparison.push(FieldComparison {
                field: "Rate".to_string(),
                invoice_value: format!("${}", row.rate_inv),
                po_value: row
                    .rate_po
                    .map(|r| format!("${r}"))
                    .unwrap_or_default(),
            }),
            Discrepancy::Overbilling | Discrepancy::AmountMismatch => {
                comparison.push(FieldComparison {
                    field: "Total Amount".to_string(),
                    invoice_value: format!("${}", row.amount),
                    po_value: row
                        .expected_amount
                        .map(|a| format!("${a}"))
                        .unwrap_or_default(),
                })
            }
            Discrepancy::MissingPo => {}
        }
    }
    comparison
}

/// Everything the email collaborator needs to escalate one invoice.
#[derive(Debug, Clone)]
pub struct EscalationNotice {
    pub order_id: String,
    pub customer: String,
    pub amount: f64,
    pub due_date: String,
    pub recommendation: String,
    pub reason: String,
    pub field_comparison: Vec<FieldComparison>,
}

impl EscalationNotice {
    pub fn from_row(row: &ValidationReportRow, verdict: &RiskRecommendation) -> EscalationNotice {
        EscalationNotice {
            order_id: row.order_id.clone(),
            customer: row.customer_name.clone(),
            amount: row.total,
            due_date: format_due_date(row.due_date),
            recommendation: verdict.recommendation.clone(),
            reason: format!(
                "{} ({})",
                format_validation_result(&row.validation_result),
                verdict.reason
            ),
            field_comparison: build_field_comparison(row),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub plain_body: String,
}

pub fn render_email(notice: &EscalationNotice) -> RenderedEmail {
    let subject = format!(
        "Escalation Alert: Invoice {} Requires Review",
        notice.order_id
    );
    let html_body = render_html_body(notice);
    let plain_body = html_to_plain(&html_body);
    RenderedEmail {
        subject,
        html_body,
        plain_body,
    }
}

fn render_html_body(notice: &EscalationNotice) -> String {
    let mut table_rows = String::new();
    for item in &notice.field_comparison {
        table_rows.push_str(&format!(
            "\n            <tr>\
             \n                <td style=\"border: 1px solid #ddd; padding: 8px;\">{}</td>\
             \n                <td style=\"border: 1px solid #ddd; padding: 8px;\">{}</td>\
             \n                <td style=\"border: 1px solid #ddd; padding: 8px;\">{}</td>\
             \n            </tr>",
            item.field, item.invoice_value, item.po_value
        ));
    }

    format!(
        r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2 style="color: #d9534f;">Invoice Escalation Alert</h2>
        <p><strong>Order ID:</strong> {order_id}</p>
        <p><strong>Customer:</strong> {customer}</p>
        <p><strong>Amount:</strong> ${amount}</p>
        <p><strong>Due Date:</strong> {due_date}</p>
        <p><strong>Recommendation:</strong> <span style="color: #d9534f;">{recommendation}</span></p>
        <p><strong>Reason:</strong> {reason}</p>
        <h3>Field Comparison:</h3>
        <table style="border-collapse: collapse; width: 100%; margin-top: 10px;">
            <thead>
                <tr style="background-color: #f2f2f2;">
                    <th style="border: 1px solid #ddd; padding: 8px; text-align: left;">Field</th>
                    <th style="border: 1px solid #ddd; padding: 8px; text-align: left;">Invoice Value</th>
                    <th style="border: 1px solid #ddd; padding: 8px; text-align: left;">PO Value</th>
                </tr>
            </thead>
            <tbody>{table_rows}
            </tbody>
        </table>
        <p style="margin-top: 20px;"><em>Please review this invoice and take appropriate action.</em></p>
    </body>
    </html>"#,
        order_id = notice.order_id,
        customer = notice.customer,
        amount = notice.amount,
        due_date = notice.due_date,
        recommendation = notice.recommendation,
        reason = notice.reason,
        table_rows = table_rows,
    )
}

/// Plain-text rendition for clients that cannot display HTML: cell and block
/// boundaries become whitespace, every tag is dropped, blank lines collapse.
pub fn html_to_plain(html: &str) -> String {
    let cell_breaks = Regex::new(r"(?i)</t[dh]>").expect("static regex");
    let line_breaks = Regex::new(r"(?i)</(?:p|h\d|tr)>|<br\s*/?>").expect("static regex");
    let tags = Regex::new(r"<[^>]+>").expect("static regex");

    let spaced = cell_breaks.replace_all(html, " | ");
    let broken = line_breaks.replace_all(&spaced, "\n");
    let stripped = tags.replace_all(&broken, "");

    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValidationStatus;
    use time::macros::date;

    fn invalid_row() -> ValidationReportRow {
        ValidationReportRow {
            file_name: "invoice_1.pdf".to_string(),
            invoice_number: 11335139,
            order_id: "ES-2025-BE11335139-41340".to_string(),
            customer_name: "Bill Eplett".to_string(),
            due_date: date!(2025 - 08 - 06),
            ship_to: "Seattle, West".to_string(),
            discount: 0.0,
            shipping_cost: 25.0,
            total: 9466.5,
            quantity_inv: 150,
            quantity_po: Some(100),
            rate_inv: 63.11,
            rate_po: Some(63.11),
            amount: 9466.5,
            expected_amount: Some(6311.0),
            validation_result: vec![Discrepancy::QuantityMismatch, Discrepancy::Overbilling],
            validation_status: ValidationStatus::Invalid,
        }
    }

    fn escalate_verdict() -> RiskRecommendation {
        RiskRecommendation {
            recommendation: "Escalate".to_string(),
            reason: "Overbilled against the purchase order".to_string(),
        }
    }

    #[test]
    fn comparison_follows_classification_order() {
        let comparison = build_field_comparison(&invalid_row());
        assert_eq!(
            comparison,
            vec![
                FieldComparison {
                    field: "Quantity".to_string(),
                    invoice_value: "150".to_string(),
                    po_value: "100".to_string(),
                },
                FieldComparison {
                    field: "Total Amount".to_string(),
                    invoice_value: "$9466.5".to_string(),
                    po_value: "$6311".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_po_yields_no_comparison_rows() {
        let mut row = invalid_row();
        row.validation_result = vec![Discrepancy::MissingPo];
        assert!(build_field_comparison(&row).is_empty());
    }

    #[test]
    fn rendered_email_carries_the_key_facts() {
        let notice = EscalationNotice::from_row(&invalid_row(), &escalate_verdict());
        let email = render_email(&notice);
        assert_eq!(
            email.subject,
            "Escalation Alert: Invoice ES-2025-BE11335139-41340 Requires Review"
        );
        assert!(email.html_body.contains("Bill Eplett"));
        assert!(email.html_body.contains("Aug 06 2025"));
        assert!(email.html_body.contains("Quantity Mismatch, Overbilling"));
        assert!(email.html_body.contains("<td"));
    }

    #[test]
    fn plain_body_has_no_tags_but_keeps_content() {
        let notice = EscalationNotice::from_row(&invalid_row(), &escalate_verdict());
        let email = render_email(&notice);
        assert!(!email.plain_body.contains('<'));
        assert!(email.plain_body.contains("Order ID: ES-2025-BE11335139-41340"));
        assert!(email.plain_body.contains("Quantity | 150 | 100"));
        assert!(email.plain_body.contains("Please review this invoice"));
    }
}
