use chrono::Local;
use receipt_ble::{
    BtleHost, JsonFileStore, LineItem, Money, PrintSession, Receipt, ReceiptMeta, Result,
    ScanConfig, SessionConfig, StoreIdentity,
};
use std::sync::Arc;
use tracing::{error, info, warn};

fn sample_receipt() -> Receipt {
    let line_items = vec![
        LineItem::new("Masala Chai", 2, Money::from_major(25)),
        LineItem::new("Paneer Tikka Sandwich", 1, Money::from_decimal(149.5)),
        LineItem::new("Filter Coffee", 3, Money::from_major(30)),
    ];
    let total = line_items.iter().map(|item| item.line_total).sum();

    Receipt {
        header: StoreIdentity {
            name: "Corner Cafe".to_string(),
            address: "12 Station Road".to_string(),
            phone: "555-0142".to_string(),
        },
        meta: ReceiptMeta {
            document_id: "B-2041".to_string(),
            timestamp: Local::now().naive_local(),
            counterparty: "Walk-in".to_string(),
        },
        line_items,
        total,
        payment_label: "Cash".to_string(),
        footer_text: "Thank you!\nVisit again".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            SessionConfig::from_json_file(path)?
        }
        None => SessionConfig::default(),
    };

    let host = Arc::new(BtleHost::new(ScanConfig::default()).await?);
    let store = Box::new(JsonFileStore::new("printer.json"));
    let mut session = PrintSession::new(host, store, config)?;

    if session.resolve_saved().await.is_none() {
        let printer = session.discover().await?;
        info!("✅ Selected: {}", printer.display_name);
    }

    match session.print(&sample_receipt()).await {
        Ok(summary) => {
            info!("✅ Receipt sent ({} bytes)", summary.bytes);
            Ok(())
        }
        Err(e) if e.should_fall_back() => {
            warn!("Bluetooth printing unavailable, use the standard print path: {}", e);
            Ok(())
        }
        Err(e) => {
            error!("❌ Printing failed: {}", e);
            Err(e)
        }
    }
}
