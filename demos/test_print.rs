use receipt_ble::{BtleHost, JsonFileStore, PrintSession, Result, ScanConfig, SessionConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🧾 receipt-ble test print");

    let host = Arc::new(BtleHost::new(ScanConfig::default()).await?);
    let store = Box::new(JsonFileStore::new("printer.json"));
    let mut session = PrintSession::new(host, store, SessionConfig::default())?;

    if let Some(printer) = session.resolve_saved().await {
        info!("Using saved printer: {}", printer.display_name);
    } else {
        info!("No saved printer, scanning...");
        match session.discover().await {
            Ok(printer) => info!("✅ Selected: {} ({})", printer.display_name, printer.id),
            Err(e) if e.is_cancellation() => {
                info!("No printer found nearby");
                return Ok(());
            }
            Err(e) => {
                error!("❌ Discovery failed: {}", e);
                return Err(e);
            }
        }
    }

    match session.test_print("Printer OK").await {
        Ok(summary) => info!("✅ Sent {} bytes in {} chunk(s)", summary.bytes, summary.chunks),
        Err(e) => {
            error!("❌ Test print failed: {}", e);
            if e.should_rediscover() {
                info!("Forgetting the printer; run again to pick another one");
                session.forget_printer().await;
            }
            return Err(e);
        }
    }

    if let Some(printer) = session.current_printer() {
        info!("Status: {}", printer.link_status);
    }
    Ok(())
}
