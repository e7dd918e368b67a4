use serde::Deserialize;
use std::path::PathBuf;
use std::{fs, path::Path};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub payment: PaymentSection,
    #[serde(default)]
    pub escalation: EscalationSection,
}

#[derive(Debug, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    #[serde(default = "default_purchase_orders")]
    pub purchase_orders: PathBuf,
    #[serde(default = "default_invoice_db")]
    pub invoice_db: PathBuf,
    #[serde(default = "default_validation_report")]
    pub validation_report: PathBuf,
    #[serde(default = "default_payment_log")]
    pub payment_log: PathBuf,
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("data/invoices")
}

fn default_purchase_orders() -> PathBuf {
    PathBuf::from("data/purchase_orders.csv")
}

fn default_invoice_db() -> PathBuf {
    PathBuf::from("output/invoices.db")
}

fn default_validation_report() -> PathBuf {
    PathBuf::from("output/validation_report.csv")
}

fn default_payment_log() -> PathBuf {
    PathBuf::from("output/payment_log.csv")
}

impl Default for PathsSection {
    fn default() -> Self {
        PathsSection {
            pdf_dir: default_pdf_dir(),
            purchase_orders: default_purchase_orders(),
            invoice_db: default_invoice_db(),
            validation_report: default_validation_report(),
            payment_log: default_payment_log(),
        }
    }
}

/// Extraction-service backend (an OpenAI-compatible chat completions API).
/// API keys are read from numbered environment variables
/// (`<api_key_env>_1`, `<api_key_env>_2`, ... falling back to the bare name)
/// and rotated on transient failure.
#[derive(Debug, Deserialize)]
pub struct ExtractionSection {
    #[serde(default = "default_extraction_base_url")]
    pub base_url: String,
    #[serde(default = "default_extraction_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_extraction_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_extraction_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GENAI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

impl Default for ExtractionSection {
    fn default() -> Self {
        ExtractionSection {
            base_url: default_extraction_base_url(),
            model: default_extraction_model(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentSection {
    #[serde(default = "default_payment_endpoint")]
    pub endpoint: String,
}

fn default_payment_endpoint() -> String {
    "http://localhost:8000/initiate_payment".to_string()
}

impl Default for PaymentSection {
    fn default() -> Self {
        PaymentSection {
            endpoint: default_payment_endpoint(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EscalationSection {
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_sender() -> String {
    "invoiceguard@company.com".to_string()
}

impl Default for EscalationSection {
    fn default() -> Self {
        EscalationSection {
            sender: default_sender(),
            recipients: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config file if present; otherwise run on defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        if path.as_ref().exists() {
            Config::load(path)
        } else {
            Ok(toml::from_str("")?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.paths.pdf_dir, PathBuf::from("data/invoices"));
        assert_eq!(cfg.extraction.max_retries, 3);
        assert_eq!(cfg.payment.endpoint, "http://localhost:8000/initiate_payment");
        assert!(cfg.escalation.recipients.is_empty());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [paths]
            pdf_dir = "incoming"

            [extraction]
            model = "gemini-2.5-pro"
            max_retries = 5

            [escalation]
            recipients = ["finance@example.com"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.paths.pdf_dir, PathBuf::from("incoming"));
        assert_eq!(cfg.extraction.model, "gemini-2.5-pro");
        assert_eq!(cfg.extraction.max_retries, 5);
        assert_eq!(cfg.paths.payment_log, PathBuf::from("output/payment_log.csv"));
        assert_eq!(cfg.escalation.recipients, vec!["finance@example.com"]);
    }
}
