mod config;
mod escalation;
mod genai;
mod ingest;
mod metrics;
mod model;
mod payments;
mod pdf_text;
mod store;
mod validation;

use config::{Config, EscalationSection};
use genai::{GenAiClient, Generator};
use model::{PaymentLogEntry, ValidationReportRow, ValidationStatus};
use payments::PaymentClient;
use store::InvoiceStore;
use time::OffsetDateTime;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let config_path = std::env::var("INVOICEGUARD_CONFIG")
        .unwrap_or_else(|_| "invoiceguard.toml".to_string());
    let cfg = Config::load_or_default(&config_path)?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None | Some("run") => run_pass(&cfg).await,
        Some("today") => todays_orders(&cfg).await,
        Some("regions") => region_report(&cfg).await,
        Some(other) => {
            Err(format!("unknown command {other:?} (expected: run, today, regions)").into())
        }
    }
}

/// One full processing pass: ingest new PDFs, rebuild the validation report,
/// take today's payment actions, and print the dashboard summary.
async fn run_pass(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let today = OffsetDateTime::now_utc().date();

    if let Some(parent) = cfg.paths.invoice_db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = InvoiceStore::new(&cfg.paths.invoice_db)?;
    let generator = GenAiClient::new(&cfg.extraction)?;

    let ingested = ingest::ingest_pdf_folder(&cfg.paths.pdf_dir, &store, &generator).await?;
    let (line_items, files) = store.counts()?;
    info!(ingested, line_items, files, "Extraction pass complete");

    let invoices = store.get_line_items()?;
    let purchase_orders = store::load_purchase_orders(&cfg.paths.purchase_orders)?;
    let report = validation::validate_invoices(&invoices, &purchase_orders)?;
    store::write_validation_report(&cfg.paths.validation_report, &report)?;

    let existing_log = store::load_payment_log(&cfg.paths.payment_log)?;
    let actions = payments::select_actions(&report, &existing_log, today);
    let processor = PaymentClient::new(cfg.payment.endpoint.clone());
    let new_entries = payments::execute_actions(&actions, &processor, &generator).await;
    let log = payments::append_log(existing_log, new_entries);
    store::write_payment_log(&cfg.paths.payment_log, &log)?;

    let summary = metrics::compute(&report, &log, today);
    print_metrics(&summary);
    print_payment_log(&metrics::payment_log_view(&log, today));
    print_overdue(&metrics::overdue_unpaid_view(&report, today));

    Ok(())
}

/// Today's orders: payment status for valid invoices, risk recommendation
/// and escalation for invalid ones.
async fn todays_orders(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let today = OffsetDateTime::now_utc().date();
    let report = store::load_validation_report(&cfg.paths.validation_report)?;
    let log = store::load_payment_log(&cfg.paths.payment_log)?;

    let due_today: Vec<&ValidationReportRow> =
        report.iter().filter(|r| r.due_date == today).collect();
    if due_today.is_empty() {
        println!("No invoices due today.");
        return Ok(());
    }

    let generator = GenAiClient::new(&cfg.extraction)?;
    for row in due_today {
        println!("\nOrder ID: {} | Customer: {}", row.order_id, row.customer_name);
        if row.validation_status == ValidationStatus::Valid {
            print_payment_status(row, &log);
        } else {
            handle_invalid_invoice(row, &generator, &cfg.escalation).await;
        }
    }
    Ok(())
}

fn print_payment_status(row: &ValidationReportRow, log: &[PaymentLogEntry]) {
    let entry = log
        .iter()
        .find(|e| e.identity() == (row.order_id.as_str(), row.customer_name.as_str()));
    match entry {
        Some(entry) if entry.status == "SUCCESS" => println!("  Paid: {}", entry.justification),
        Some(entry) => {
            println!(
                "  Payment attempted but did not succeed. Status: {}, Message: {}",
                entry.status, entry.message
            );
            println!("  {}", entry.justification);
        }
        None => println!("  Payment not yet processed."),
    }
}

async fn handle_invalid_invoice(
    row: &ValidationReportRow,
    generator: &dyn Generator,
    escalation_cfg: &EscalationSection,
) {
    match genai::risk::generate_risk_recommendation(generator, row).await {
        Ok(verdict) => {
            println!("  Recommendation: {}", verdict.recommendation);
            println!("  Reason: {}", verdict.reason);
            if verdict.is_escalate() {
                let notice = escalation::EscalationNotice::from_row(row, &verdict);
                let email = escalation::render_email(&notice);
                info!(
                    order_id = %row.order_id,
                    sender = %escalation_cfg.sender,
                    recipients = ?escalation_cfg.recipients,
                    subject = %email.subject,
                    "Escalation notice handed to email delivery"
                );
                println!("  Escalation email prepared:");
                for line in email.plain_body.lines() {
                    println!("    {line}");
                }
            }
        }
        Err(e) => {
            warn!(order_id = %row.order_id, error = %e, "Risk recommendation unavailable")
        }
    }
}

/// Regional sales rollup with a generated narrative.
async fn region_report(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let report = store::load_validation_report(&cfg.paths.validation_report)?;
    if report.is_empty() {
        println!("No validation data available. Run a processing pass first.");
        return Ok(());
    }

    let stats = metrics::region_stats(&report);
    println!("\n=== Sales by Region ===");
    println!(
        "{:<16} {:>14} {:>16} {:>10}",
        "Region", "Total Sales", "Total Shipping", "Invoices"
    );
    for s in &stats {
        println!(
            "{:<16} {:>14.2} {:>16.2} {:>10}",
            s.region, s.total_sales, s.total_shipping, s.num_invoices
        );
    }

    let generator = GenAiClient::new(&cfg.extraction)?;
    match genai::regions::summarize_regions(&generator, &stats).await {
        Ok(narrative) => {
            println!("\nSummary:");
            for line in &narrative.summary {
                println!("  - {line}");
            }
            println!("\nInsight: {}", narrative.insight);
        }
        Err(e) => warn!(error = %e, "Region narrative unavailable"),
    }
    Ok(())
}

fn print_metrics(summary: &metrics::Metrics) {
    println!("\n=== Invoice Metrics ===");
    println!("Total invoices:    {}", summary.total);
    println!("Clean invoices:    {}", summary.valid);
    println!("Flagged invoices:  {}", summary.flagged);
    println!("Paid today:        {}", summary.paid_today);
    println!("Overdue & unpaid:  {}", summary.overdue_unpaid);
}

fn print_payment_log(rows: &[metrics::PaymentLogViewRow]) {
    if rows.is_empty() {
        return;
    }
    println!("\n=== Payment Log ===");
    println!(
        "{:<26} {:<20} {:>10} {:<12} {:<16} {:<8} {:>5}  {}",
        "Order", "Customer", "Amount", "Due", "Transaction", "Status", "Days", "Mode"
    );
    for r in rows {
        println!(
            "{:<26} {:<20} {:>10.2} {:<12} {:<16} {:<8} {:>5}  {}",
            r.order_id,
            r.customer_name,
            r.amount,
            r.due_date,
            r.transaction_id,
            r.status,
            r.days_until_due,
            r.payment_mode
        );
    }
}

fn print_overdue(rows: &[metrics::OverdueUnpaidRow]) {
    if rows.is_empty() {
        return;
    }
    println!("\n=== Overdue and Unpaid Invoices ===");
    println!("{} overdue invoices not yet paid.", rows.len());
    for r in rows {
        println!(
            "{:<26} {:<20} {:>10.2} {:<12} {:<8} {:>5}  {}",
            r.order_id,
            r.customer_name,
            r.amount,
            r.due_date,
            r.status,
            r.days_until_due,
            r.validation_result
        );
    }
}
