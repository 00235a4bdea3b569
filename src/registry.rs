use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    host::BleHost,
    types::{PrinterHandle, SavedPrinter},
};

/// Durable storage for the chosen printer's identity
#[async_trait]
pub trait PrinterStore: Send + Sync {
    /// Read the saved printer, if any
    async fn load(&self) -> Result<Option<SavedPrinter>>;
    /// Replace the saved printer
    async fn save(&self, printer: &SavedPrinter) -> Result<()>;
    /// Remove the saved printer
    async fn clear(&self) -> Result<()>;
}

/// Printer identity kept in a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store the printer record at `path`; parent directories are created on first save
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PrinterStore for JsonFileStore {
    async fn load(&self) -> Result<Option<SavedPrinter>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, printer: &SavedPrinter) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_vec_pretty(printer)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Printer identity kept in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<SavedPrinter>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a record
    #[must_use]
    pub fn with_saved(printer: SavedPrinter) -> Self {
        Self {
            saved: Mutex::new(Some(printer)),
        }
    }
}

#[async_trait]
impl PrinterStore for MemoryStore {
    async fn load(&self) -> Result<Option<SavedPrinter>> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, printer: &SavedPrinter) -> Result<()> {
        *self.saved.lock().await = Some(printer.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.saved.lock().await = None;
        Ok(())
    }
}

#[async_trait]
impl<S: PrinterStore + ?Sized> PrinterStore for Arc<S> {
    async fn load(&self) -> Result<Option<SavedPrinter>> {
        (**self).load().await
    }

    async fn save(&self, printer: &SavedPrinter) -> Result<()> {
        (**self).save(printer).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

/// Remembers the chosen printer across restarts and holds the current handle
pub struct DeviceRegistry {
    store: Box<dyn PrinterStore>,
    current: Option<PrinterHandle>,
}

impl DeviceRegistry {
    /// Create a registry backed by `store`
    #[must_use]
    pub fn new(store: Box<dyn PrinterStore>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Persist the handle's identity and make it current
    ///
    /// Storage failures are logged; the handle still becomes current.
    pub async fn save(&mut self, handle: PrinterHandle) {
        if let Err(e) = self.store.save(&handle.to_saved()).await {
            warn!("Failed to persist printer {}: {}", handle.id, e);
        } else {
            info!("Saved printer {} ({})", handle.display_name, handle.id);
        }
        self.current = Some(handle);
    }

    /// Current printer, without any I/O
    #[must_use]
    pub const fn current(&self) -> Option<&PrinterHandle> {
        self.current.as_ref()
    }

    /// Mutable access to the current printer
    pub fn current_mut(&mut self) -> Option<&mut PrinterHandle> {
        self.current.as_mut()
    }

    /// Rebuild the current handle from the persisted record
    ///
    /// Returns `None` when nothing is saved, when storage or the host fails,
    /// or when the host reports the saved printer as no longer authorized; in
    /// the last case the record is cleared. An authorized printer that is out
    /// of range yields a handle without a peripheral reference.
    pub async fn resolve_saved(&mut self, host: &dyn BleHost) -> Option<PrinterHandle> {
        let saved = match self.store.load().await {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                debug!("No saved printer");
                return None;
            }
            Err(e) => {
                warn!("Failed to read saved printer: {}", e);
                return None;
            }
        };

        let devices = match host.authorized_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Could not list authorized devices: {}", e);
                return None;
            }
        };

        if let Some(peripheral) = devices.into_iter().find(|d| d.id() == saved.id) {
            let advertised = peripheral.name().filter(|name| !name.trim().is_empty());
            let mut handle = PrinterHandle::from_peripheral(peripheral);
            if advertised.is_none() && !saved.display_name.is_empty() {
                handle.display_name = saved.display_name;
            }
            info!("Resolved saved printer {} ({})", handle.display_name, handle.id);
            self.current = Some(handle.clone());
            return Some(handle);
        }

        match host.is_authorized(&saved.id).await {
            Ok(true) => {
                info!("Saved printer {} is authorized but not in range", saved.id);
                let handle = PrinterHandle::from_saved(saved);
                self.current = Some(handle.clone());
                return Some(handle);
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Could not check authorization of {}: {}", saved.id, e);
                return None;
            }
        }

        info!(
            "Saved printer {} is no longer authorized; forgetting it",
            saved.id
        );
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear saved printer: {}", e);
        }
        if self.current.as_ref().is_some_and(|h| h.id == saved.id) {
            self.current = None;
        }
        None
    }

    /// Drop both the persisted record and the current handle
    pub async fn forget(&mut self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear saved printer: {}", e);
        }
        self.current = None;
    }
}
