// src/genai/regions.rs

use crate::genai::{Generator, parse_json_response};
use crate::metrics::RegionStats;
use serde::Deserialize;

/// Generated narrative over the per-region aggregates.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionNarrative {
    pub summary: Vec<String>,
    pub insight: String,
}

/// Summarize regional sales/shipping aggregates into bullet points plus one
/// overall insight.
pub async fn summarize_regions(
    generator: &dyn Generator,
    stats: &[RegionStats],
) -> Result<RegionNarrative, Box<dyn std::error::Error>> {
    let records = serde_json::to_string(stats)?;
    let prompt = format!(
        "Given the following regional sales data, generate key points for summary and \
         overall insight in JSON format only:\n\n{records}\n\n\
         JSON Response:\n\
         {{\n  \"summary\": [\n    \"Region A has the highest total sales...\",\n    \
         \"Region B recorded the lowest shipping costs...\"\n  ],\n  \
         \"insight\": \"Overall, regional performance is strongest in ...\"\n}}"
    );
    parse_json_response(&generator.generate(&prompt).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
            assert!(prompt.contains("\"region\":\"West\""));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn parses_summary_and_insight() {
        let generator = CannedGenerator(
            "{\"summary\": [\"West has the highest sales\"], \"insight\": \"West dominates\"}",
        );
        let stats = vec![RegionStats {
            region: "West".to_string(),
            total_sales: 10_000.0,
            total_shipping: 500.0,
            num_invoices: 10,
        }];
        let narrative = summarize_regions(&generator, &stats).await.unwrap();
        assert_eq!(narrative.summary.len(), 1);
        assert_eq!(narrative.insight, "West dominates");
    }
}
