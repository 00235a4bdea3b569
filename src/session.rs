use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    catalog::ServiceCatalog,
    discovery,
    error::{PrintError, Result},
    host::BleHost,
    negotiate::ChannelNegotiator,
    receipt::{check_encodable, Receipt, ReceiptEncoder},
    registry::{DeviceRegistry, PrinterStore},
    transport::{ChunkedWriter, TransmitSummary},
    types::{LinkStatus, PrinterHandle, SessionConfig},
};

/// What a print job was rendered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    /// A business document
    Receipt {
        /// Document the receipt belongs to
        document_id: String,
    },
    /// A manual test page
    TestPage,
}

/// One rendered document on its way to the printer
#[derive(Debug, Clone)]
pub struct PrintJob {
    /// Encoded control codes and text
    pub payload: Bytes,
    /// Origin of the payload
    pub source: JobSource,
}

/// Context object for printing: one host, one current printer
///
/// Owns the pipeline order: resolve the printer, negotiate a channel,
/// transmit, disconnect.
pub struct PrintSession {
    host: Arc<dyn BleHost>,
    registry: DeviceRegistry,
    catalog: Arc<ServiceCatalog>,
    negotiator: ChannelNegotiator,
    writer: ChunkedWriter,
    encoder: ReceiptEncoder,
    strict_encoding: bool,
}

impl PrintSession {
    /// Create a session with the default service catalog
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Config`] if `config` is inconsistent.
    pub fn new(
        host: Arc<dyn BleHost>,
        store: Box<dyn PrinterStore>,
        config: SessionConfig,
    ) -> Result<Self> {
        Self::with_catalog(host, store, config, ServiceCatalog::default())
    }

    /// Create a session with a custom service catalog
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Config`] if `config` is inconsistent.
    pub fn with_catalog(
        host: Arc<dyn BleHost>,
        store: Box<dyn PrinterStore>,
        config: SessionConfig,
        catalog: ServiceCatalog,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(catalog);

        Ok(Self {
            host,
            registry: DeviceRegistry::new(store),
            negotiator: ChannelNegotiator::new(Arc::clone(&catalog), config.timeouts.clone()),
            writer: ChunkedWriter::new(config.transport, config.timeouts),
            encoder: ReceiptEncoder::new(config.dialect, config.layout)?,
            strict_encoding: config.strict_encoding,
            catalog,
        })
    }

    /// Service tables in use
    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Encoder used for receipts and test pages
    #[must_use]
    pub const fn encoder(&self) -> &ReceiptEncoder {
        &self.encoder
    }

    /// Open the device chooser and remember the selected printer
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Unsupported`] or [`PrintError::EmptySelection`].
    pub async fn discover(&mut self) -> Result<PrinterHandle> {
        discovery::discover(self.host.as_ref(), &mut self.registry, &self.catalog).await
    }

    /// Reconnect the session to the persisted printer, if it is still authorized
    pub async fn resolve_saved(&mut self) -> Option<PrinterHandle> {
        self.registry.resolve_saved(self.host.as_ref()).await
    }

    /// Forget the current and persisted printer
    pub async fn forget_printer(&mut self) {
        self.registry.forget().await;
    }

    /// Current printer, without any I/O
    #[must_use]
    pub const fn current_printer(&self) -> Option<&PrinterHandle> {
        self.registry.current()
    }

    /// Encode and print a receipt on the current printer
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::EncodingUnsupported`] in strict mode,
    /// [`PrintError::NoPrinterConfigured`] if no printer is current or
    /// resolvable, [`PrintError::ConnectionFailed`] if the saved printer is
    /// authorized but out of range, or the error of the failing connection, negotiation or
    /// transmission step.
    pub async fn print(&mut self, receipt: &Receipt) -> Result<TransmitSummary> {
        if self.strict_encoding {
            check_encodable(receipt)?;
        }
        let job = PrintJob {
            payload: Bytes::from(self.encoder.encode(receipt)),
            source: JobSource::Receipt {
                document_id: receipt.meta.document_id.clone(),
            },
        };
        self.run(job).await
    }

    /// Print a short test page on the current printer
    ///
    /// # Errors
    ///
    /// Same as [`Self::print`], without the encoding check.
    pub async fn test_print(&mut self, text: &str) -> Result<TransmitSummary> {
        let job = PrintJob {
            payload: Bytes::from(self.encoder.encode_test_page(text)),
            source: JobSource::TestPage,
        };
        self.run(job).await
    }

    /// Send an already rendered job to the current printer
    ///
    /// Runs one attempt; nothing is retried. The printer is disconnected
    /// afterwards whether or not the job succeeds.
    ///
    /// # Errors
    ///
    /// See [`Self::print`].
    #[instrument(skip_all, fields(source = ?job.source, bytes = job.payload.len()))]
    pub async fn run(&mut self, job: PrintJob) -> Result<TransmitSummary> {
        let handle = self.printer().await?;
        let Some(peripheral) = handle.native.clone() else {
            self.set_link_status(&handle.id, LinkStatus::Offline);
            return Err(PrintError::ConnectionFailed(format!(
                "{} is not in range",
                handle.display_name
            )));
        };
        info!("Printing on {} ({})", handle.display_name, handle.id);

        self.set_link_status(&handle.id, LinkStatus::Unknown);
        let channel = match self.negotiator.negotiate(peripheral.as_ref()).await {
            Ok(channel) => {
                self.set_link_status(&handle.id, LinkStatus::Online);
                channel
            }
            Err(e) => {
                self.set_link_status(&handle.id, LinkStatus::Offline);
                if let Err(disconnect_error) = peripheral.disconnect().await {
                    warn!("Disconnect after failed negotiation: {}", disconnect_error);
                }
                return Err(e);
            }
        };

        self.writer
            .transmit(peripheral.as_ref(), &channel, &job.payload)
            .await
    }

    async fn printer(&mut self) -> Result<PrinterHandle> {
        if let Some(handle) = self.registry.current().filter(|h| h.native.is_some()) {
            return Ok(handle.clone());
        }
        self.resolve_saved()
            .await
            .ok_or(PrintError::NoPrinterConfigured)
    }

    fn set_link_status(&mut self, id: &str, status: LinkStatus) {
        if let Some(handle) = self.registry.current_mut().filter(|h| h.id == id) {
            handle.link_status = status;
        }
    }
}
