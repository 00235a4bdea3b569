#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # receipt-ble 🧾
//!
//! A Rust library for printing receipts on Bluetooth Low Energy thermal printers.
//!
//! Cheap BLE receipt printers share the ESC/POS command language but almost
//! nothing else: every OEM hides its data channel behind a different GATT
//! service. This library finds that channel at connect time, so a printer that
//! was never seen before usually just works.
//!
//! ## Pipeline
//!
//! - **Discovery**: the user picks a printer once; its identity is persisted
//! - **Negotiation**: services are ranked against a catalog of known printer
//!   layouts, known characteristics are confirmed with `ESC @`, and any writable
//!   characteristic is accepted as a last resort
//! - **Encoding**: receipts are rendered into fixed 32-column text and control codes
//! - **Transport**: the payload is streamed in MTU-sized, paced writes and the
//!   printer is disconnected afterwards
//!
//! Every print is a single best-effort attempt. Nothing is queued or retried.
//!
//! ## Quick Start
//!
//! ```no_run
//! use receipt_ble::{BtleHost, JsonFileStore, PrintSession, ScanConfig, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Arc::new(BtleHost::new(ScanConfig::default()).await?);
//!     let store = Box::new(JsonFileStore::new("printer.json"));
//!     let mut session = PrintSession::new(host, store, SessionConfig::default())?;
//!
//!     // Reuse the saved printer, or pick one
//!     if session.resolve_saved().await.is_none() {
//!         session.discover().await?;
//!     }
//!
//!     session.test_print("Printer OK").await?;
//!     Ok(())
//! }
//! ```

/// `btleplug` backend
pub mod btle;
/// Known printer services and characteristics
pub mod catalog;
/// Printer selection
pub mod discovery;
/// Error types and handling
pub mod error;
/// Printer control codes
pub mod escpos;
/// Host platform traits
pub mod host;
/// In-memory host for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock;
/// Money amounts
pub mod money;
/// Channel negotiation
pub mod negotiate;
/// Receipt documents and their encoding
pub mod receipt;
/// Persistence of the chosen printer
pub mod registry;
/// Print orchestration
pub mod session;
/// Chunked transmission
pub mod transport;
/// Type definitions and data structures
pub mod types;

// Re-export the main types for convenient usage
pub use btle::{BtleHost, ById, DeviceChooser, FirstAllowListed, ScanConfig};
pub use catalog::ServiceCatalog;
pub use error::{PrintError, Result};
pub use escpos::{CommandBuffer, PrinterDialect};
pub use host::{BleHost, BlePeripheral, ChooserRequest};
pub use money::Money;
pub use receipt::{LineItem, Receipt, ReceiptEncoder, ReceiptLayout, ReceiptMeta, StoreIdentity};
pub use registry::{DeviceRegistry, JsonFileStore, MemoryStore, PrinterStore};
pub use session::{JobSource, PrintJob, PrintSession};
pub use transport::TransmitSummary;
pub use types::{
    GattChannel, LinkStatus, PrinterHandle, SavedPrinter, SessionConfig, TimeoutConfig,
    TransportConfig, WriteMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
