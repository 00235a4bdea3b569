use async_trait::async_trait;
use std::{fmt, sync::Arc};
use uuid::Uuid;

use crate::{
    error::Result,
    types::{GattChannel, ServiceInfo},
};

/// Parameters for the host's device chooser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooserRequest {
    /// Offer every nearby device instead of filtering by advertised services
    pub accept_all_devices: bool,
    /// Services the application may access after selection
    pub optional_services: Vec<Uuid>,
}

/// A host Bluetooth stack
///
/// Discovery, negotiation and transport reach Bluetooth only through this
/// trait and [`BlePeripheral`].
#[async_trait]
pub trait BleHost: Send + Sync {
    /// Check that the host can do BLE at all
    ///
    /// # Errors
    ///
    /// Returns [`crate::PrintError::Unsupported`] with the reason when it cannot.
    async fn ensure_available(&self) -> Result<()>;

    /// Let the user pick a device; `Ok(None)` means the chooser was cancelled
    async fn request_device(
        &self,
        request: &ChooserRequest,
    ) -> Result<Option<Arc<dyn BlePeripheral>>>;

    /// Authorized devices the host can reach right now
    async fn authorized_devices(&self) -> Result<Vec<Arc<dyn BlePeripheral>>>;

    /// Whether access to `id` is still granted, reachable or not
    ///
    /// `Ok(false)` means the user revoked access or the host forgot the device.
    async fn is_authorized(&self, id: &str) -> Result<bool>;
}

/// A peripheral reference valid for the current session
#[async_trait]
pub trait BlePeripheral: Send + Sync + fmt::Debug {
    /// Stable identifier used as the persistence key
    fn id(&self) -> String;

    /// Advertised name, if any
    fn name(&self) -> Option<String>;

    /// Open the GATT connection
    async fn connect(&self) -> Result<()>;

    /// Enumerate primary services in the order the host reports them
    async fn primary_services(&self) -> Result<Vec<ServiceInfo>>;

    /// Write one value to a characteristic
    async fn write(&self, channel: &GattChannel, data: &[u8]) -> Result<()>;

    /// Close the GATT connection
    async fn disconnect(&self) -> Result<()>;
}
