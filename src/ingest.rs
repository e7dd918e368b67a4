// src/ingest.rs
//
// Folder ingestion: every PDF is extracted and parsed exactly once across
// the lifetime of the store. A failure affects only its own file, which
// stays unprocessed and is retried on the next pass.

use crate::genai::Generator;
use crate::genai::parser::{flatten_line_items, parse_invoice};
use crate::pdf_text;
use crate::store::InvoiceStore;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Scan `dir` for invoice PDFs not yet in the store, extract and parse each,
/// and persist the resulting line items. Returns the number of line items
/// added this pass.
pub async fn ingest_pdf_folder(
    dir: &Path,
    store: &InvoiceStore,
    generator: &dyn Generator,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| format!("cannot read PDF folder {}: {e}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut ingested = 0;
    for entry in entries {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }
        if store.is_file_processed(file_name)? {
            continue;
        }

        match ingest_file(&path, file_name, store, generator).await {
            Ok(count) => ingested += count,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Invoice ingestion failed; will retry next pass")
            }
        }
    }
    Ok(ingested)
}

async fn ingest_file(
    path: &Path,
    file_name: &str,
    store: &InvoiceStore,
    generator: &dyn Generator,
) -> Result<usize, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    let text = pdf_text::extract_invoice_text(&bytes)?;
    let invoice = parse_invoice(generator, &text).await?;
    let items = flatten_line_items(&invoice, file_name);

    for (idx, item) in items.iter().enumerate() {
        store.upsert_line_item(item, idx)?;
    }
    store.mark_file_processed(file_name)?;

    info!(
        file = %file_name,
        invoice_number = %invoice.invoice_number,
        customer = %invoice.customer_name,
        line_items = items.len(),
        "Invoice extracted and stored"
    );
    Ok(items.len())
}
