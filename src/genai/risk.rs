// src/genai/risk.rs

use crate::genai::{Generator, parse_json_response};
use crate::model::{ValidationReportRow, format_due_date, format_validation_result};
use serde::Deserialize;

/// Model verdict for an invalid invoice due today.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskRecommendation {
    pub recommendation: String,
    pub reason: String,
}

impl RiskRecommendation {
    pub fn is_escalate(&self) -> bool {
        self.recommendation.trim().eq_ignore_ascii_case("escalate")
    }
}

/// Ask whether to approve, escalate, or hold a mismatched invoice due today.
pub async fn generate_risk_recommendation(
    generator: &dyn Generator,
    row: &ValidationReportRow,
) -> Result<RiskRecommendation, Box<dyn std::error::Error>> {
    let prompt = format!(
        "An invoice is marked as INVALID due to the following reason: {}.\n\
         The invoice details are:\n\
         Order ID: {}\n\
         Customer Name: {}\n\
         Amount: ${:.2}\n\
         Due Date: {} (today)\n\n\
         Based on this information, provide a recommendation to either 'Approve', \
         'Escalate', or 'Hold' the invoice. Also provide a brief reason for your \
         recommendation in the following JSON format:\n\
         {{\n\"recommendation\": \"<Approve/Escalate/Hold>\",\n\"reason\": \"<brief explanation>\"\n}}",
        format_validation_result(&row.validation_result),
        row.order_id,
        row.customer_name,
        row.total,
        format_due_date(row.due_date)
    );
    parse_json_response(&generator.generate(&prompt).await?)
}
