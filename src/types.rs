use btleplug::api::{CharPropFlags, WriteType};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    error::{PrintError, Result},
    escpos::PrinterDialect,
    host::BlePeripheral,
    receipt::ReceiptLayout,
};

/// Last known reachability of a printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// A channel was resolved in the current session
    Online,
    /// The last connection or negotiation attempt failed
    Offline,
    /// No attempt has completed since the last reset
    Unknown,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "Online"),
            Self::Offline => write!(f, "Offline"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// GATT write mode used for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Acknowledged write
    WithResponse,
    /// Unacknowledged write command
    WithoutResponse,
}

impl WriteMode {
    /// Pick the write mode for a characteristic, preferring acknowledged writes
    #[must_use]
    pub fn for_properties(properties: CharPropFlags) -> Option<Self> {
        if properties.contains(CharPropFlags::WRITE) {
            Some(Self::WithResponse)
        } else if properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
            Some(Self::WithoutResponse)
        } else {
            None
        }
    }
}

impl From<WriteMode> for WriteType {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::WithResponse => Self::WithResponse,
            WriteMode::WithoutResponse => Self::WithoutResponse,
        }
    }
}

/// Resolved transmission path for one connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattChannel {
    /// Service the characteristic belongs to
    pub service: Uuid,
    /// Writable characteristic
    pub characteristic: Uuid,
    /// Write mode to use
    pub write_mode: WriteMode,
}

impl fmt::Display for GattChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:?})",
            self.service, self.characteristic, self.write_mode
        )
    }
}

/// One enumerated GATT characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    /// Characteristic UUID
    pub uuid: Uuid,
    /// Supported operations
    pub properties: CharPropFlags,
}

impl CharacteristicInfo {
    /// Create characteristic info
    #[must_use]
    pub const fn new(uuid: Uuid, properties: CharPropFlags) -> Self {
        Self { uuid, properties }
    }

    /// Whether either write mode is supported
    #[must_use]
    pub fn is_writable(&self) -> bool {
        WriteMode::for_properties(self.properties).is_some()
    }
}

/// One enumerated primary GATT service with its characteristics in enumeration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service UUID
    pub uuid: Uuid,
    /// Characteristics of the service
    pub characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Create a service without characteristics
    #[must_use]
    pub const fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    /// Append a characteristic
    #[must_use]
    pub fn with_characteristic(mut self, uuid: Uuid, properties: CharPropFlags) -> Self {
        self.characteristics
            .push(CharacteristicInfo::new(uuid, properties));
        self
    }

    /// Look up a characteristic by UUID
    #[must_use]
    pub fn characteristic(&self, uuid: Uuid) -> Option<&CharacteristicInfo> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// An identified, possibly connectable printer
#[derive(Debug, Clone)]
pub struct PrinterHandle {
    /// Stable peripheral identifier
    pub id: String,
    /// Name shown to the user
    pub display_name: String,
    /// Session-only peripheral reference, never persisted
    pub native: Option<Arc<dyn BlePeripheral>>,
    /// Last known reachability
    pub link_status: LinkStatus,
}

impl PrinterHandle {
    /// Wrap a peripheral returned by the host
    #[must_use]
    pub fn from_peripheral(peripheral: Arc<dyn BlePeripheral>) -> Self {
        let id = peripheral.id();
        let display_name = peripheral
            .name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Printer {id}"));

        Self {
            id,
            display_name,
            native: Some(peripheral),
            link_status: LinkStatus::Unknown,
        }
    }

    /// Rebuild a handle for a remembered printer that is not reachable yet
    #[must_use]
    pub fn from_saved(saved: SavedPrinter) -> Self {
        Self {
            id: saved.id,
            display_name: saved.display_name,
            native: None,
            link_status: LinkStatus::Unknown,
        }
    }

    /// Persistable part of the handle
    #[must_use]
    pub fn to_saved(&self) -> SavedPrinter {
        SavedPrinter {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Persisted printer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrinter {
    /// Stable peripheral identifier
    pub id: String,
    /// Name shown to the user
    pub display_name: String,
}

/// Chunking parameters for the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Largest single write in bytes
    pub mtu: usize,
    /// Pause between consecutive chunks in milliseconds
    pub chunk_delay_ms: u64,
}

impl TransportConfig {
    /// Pause between consecutive chunks
    #[must_use]
    pub const fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mtu: 512,
            chunk_delay_ms: 100,
        }
    }
}

/// Per-stage timeouts; `None` leaves the stage to the host stack's own limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// GATT connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Service enumeration timeout in milliseconds
    pub discovery_timeout_ms: Option<u64>,
    /// Single write timeout in milliseconds
    pub write_timeout_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Some(10_000),
            discovery_timeout_ms: Some(10_000),
            write_timeout_ms: Some(5_000),
        }
    }
}

/// Everything a [`PrintSession`](crate::PrintSession) needs besides the host and the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Control-code dialect of the printer
    pub dialect: PrinterDialect,
    /// Paper width and item table columns
    pub layout: ReceiptLayout,
    /// Chunking parameters
    pub transport: TransportConfig,
    /// Per-stage timeouts
    pub timeouts: TimeoutConfig,
    /// Reject documents with characters the printer cannot encode
    pub strict_encoding: bool,
}

impl SessionConfig {
    /// Load configuration overrides from a JSON file
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Io`] if the file cannot be read, [`PrintError::Json`] if it
    /// is malformed, or [`PrintError::Config`] if the layout is inconsistent.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Config`] for a zero MTU or a layout whose columns do
    /// not add up to the line width.
    pub fn validate(&self) -> Result<()> {
        if self.transport.mtu == 0 {
            return Err(PrintError::Config("transport MTU must be positive".to_string()));
        }
        self.layout.validate()
    }
}
