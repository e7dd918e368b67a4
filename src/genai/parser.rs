// src/genai/parser.rs

use crate::genai::{Generator, parse_json_response};
use crate::model::InvoiceLineItem;
use serde::{Deserialize, Deserializer};

/// Keep prompts inside the service's context window; invoice PDFs rarely
/// come close to this.
const MAX_PROMPT_CHARS: usize = 12_000;

const EXTRACTION_RULES: &str = r#"You are an expert invoice data extraction system. Extract the following fields from the invoice text and return ONLY a valid JSON object.
EXTRACTION RULES:
1. customer_name: extract from the "Bill To" or "Billing Address" section - the company/person name only.
2. item_name may span multiple lines. Make sure to extract the full text for item_name.
3. Do not include any zero quantity items in item_details.
"#;

const RESPONSE_TEMPLATE: &str = r#"JSON Response:
{
    "invoice_number": "...",
    "order_id": "...",
    "customer_name": "...",
    "due_date": "...",
    "ship_to": "...",
    "discount": 0.0,
    "shipping_cost": 0.0,
    "total": 0.0,
    "item_details": [
        {
            "item_name": "...",
            "quantity": 0,
            "rate": 0.0,
            "amount": 0.0
        }
    ]
}"#;

/// The invoice-level JSON shape the extraction service returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedInvoice {
    #[serde(deserialize_with = "string_or_number")]
    pub invoice_number: String,
    pub order_id: String,
    pub customer_name: String,
    pub due_date: String,
    pub ship_to: String,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub shipping_cost: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub item_details: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedItem {
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub amount: f64,
}

/// Models sometimes emit invoice numbers as bare JSON numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Ask the extraction service for structured invoice data from raw PDF text.
pub async fn parse_invoice(
    generator: &dyn Generator,
    raw_text: &str,
) -> Result<ParsedInvoice, Box<dyn std::error::Error>> {
    let text = truncate_on_char_boundary(raw_text, MAX_PROMPT_CHARS);
    let prompt = format!("{EXTRACTION_RULES}\nInvoice Text:\n{text}\n{RESPONSE_TEMPLATE}");
    let response = generator.generate(&prompt).await?;
    parse_json_response(&response)
}

/// Flatten one parsed invoice into one line item per entry in item_details.
pub fn flatten_line_items(invoice: &ParsedInvoice, file_name: &str) -> Vec<InvoiceLineItem> {
    invoice
        .item_details
        .iter()
        .map(|item| InvoiceLineItem {
            file_name: file_name.to_string(),
            invoice_number: invoice.invoice_number.clone(),
            order_id: invoice.order_id.clone(),
            customer_name: invoice.customer_name.clone(),
            due_date: invoice.due_date.clone(),
            ship_to: invoice.ship_to.clone(),
            discount: invoice.discount,
            shipping_cost: invoice.shipping_cost,
            total: invoice.total,
            item_name: item.item_name.clone(),
            quantity: item.quantity,
            rate: item.rate,
            amount: item.amount,
        })
        .collect()
}

fn truncate_on_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedGenerator(String);

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    const RESPONSE: &str = r#"```json
    {
        "invoice_number": 11335139,
        "order_id": "ES-2025-001",
        "customer_name": "Bill Eplett",
        "due_date": "Aug 06 2025",
        "ship_to": "100 Main St, Seattle, West",
        "discount": 0.0,
        "shipping_cost": 25.0,
        "total": 9466.50,
        "item_details": [
            {"item_name": "Canon Wireless Fax", "quantity": 150, "rate": 63.11, "amount": 9466.50}
        ]
    }
    ```"#;

    #[tokio::test]
    async fn parses_fenced_response_with_numeric_invoice_number() {
        let generator = CannedGenerator(RESPONSE.to_string());
        let invoice = parse_invoice(&generator, "raw invoice text").await.unwrap();
        assert_eq!(invoice.invoice_number, "11335139");
        assert_eq!(invoice.item_details.len(), 1);
        assert_eq!(invoice.item_details[0].quantity, 150);
    }

    #[tokio::test]
    async fn malformed_response_is_a_parse_error() {
        let generator = CannedGenerator("{\"invoice_number\": }".to_string());
        let err = parse_invoice(&generator, "text").await.unwrap_err();
        assert!(err.to_string().contains("malformed JSON"), "{err}");
    }

    #[test]
    fn flattening_yields_one_row_per_item() {
        let invoice = ParsedInvoice {
            invoice_number: "1001".into(),
            order_id: "ES-2025-001".into(),
            customer_name: "Bill Eplett".into(),
            due_date: "Aug 06 2025".into(),
            ship_to: "Seattle, West".into(),
            discount: 0.0,
            shipping_cost: 25.0,
            total: 200.0,
            item_details: vec![
                ParsedItem {
                    item_name: "Fax".into(),
                    quantity: 1,
                    rate: 150.0,
                    amount: 150.0,
                },
                ParsedItem {
                    item_name: "Toner".into(),
                    quantity: 2,
                    rate: 25.0,
                    amount: 50.0,
                },
            ],
        };
        let rows = flatten_line_items(&invoice, "invoice_1.pdf");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].file_name, "invoice_1.pdf");
        assert_eq!(rows[0].total, 200.0);
        assert_eq!(rows[1].item_name, "Toner");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(10); // 2 bytes per char
        let cut = truncate_on_char_boundary(&text, 5);
        assert_eq!(cut.chars().count(), 2);
    }
}
