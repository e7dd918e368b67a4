// src/genai/justification.rs

use crate::genai::Generator;
use crate::payments::PaymentRequest;

/// Generate a one-line, audit-style justification for a clean invoice that
/// was just paid.
pub async fn generate_payment_justification(
    generator: &dyn Generator,
    request: &PaymentRequest,
) -> Result<String, Box<dyn std::error::Error>> {
    let prompt = format!(
        "Generate a formal payment justification for the following invoice details:\n\
         Order ID: {}\n\
         Customer Name: {}\n\
         Amount: ${:.2}\n\
         Due Date: {}\n\n\
         Provide only a one-line summary for audit purposes in the following format:\n\
         'Payment of $<amount> approved for <customer_name>. Order <order_id> verified \
         with no discrepancies and is due on today/<due_date>.'",
        request.order_id, request.customer_name, request.amount, request.due_date
    );
    let text = generator.generate(&prompt).await?;
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
            assert!(prompt.contains("Order ID: ES-2025-001"));
            assert!(prompt.contains("Amount: $6311.00"));
            Ok("  Payment of $6311.00 approved for Bill Eplett. \n".to_string())
        }
    }

    #[tokio::test]
    async fn returns_trimmed_narrative() {
        let request = PaymentRequest {
            order_id: "ES-2025-001".to_string(),
            customer_name: "Bill Eplett".to_string(),
            amount: 6311.0,
            due_date: "Aug 06 2025".to_string(),
        };
        let text = generate_payment_justification(&EchoGenerator, &request)
            .await
            .unwrap();
        assert_eq!(text, "Payment of $6311.00 approved for Bill Eplett.");
    }
}
