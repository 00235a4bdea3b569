use async_trait::async_trait;
use btleplug::{
    api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType},
    platform::{Adapter, Manager, Peripheral},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{PrintError, Result},
    host::{BleHost, BlePeripheral, ChooserRequest},
    types::{CharacteristicInfo, GattChannel, ServiceInfo},
};

/// Scan parameters for the btleplug chooser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long to listen for advertisements
    pub scan_window_ms: u64,
    /// Which adapter to use when the host has several
    pub adapter_index: usize,
}

impl ScanConfig {
    /// Scan window as a duration
    #[must_use]
    pub const fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_window_ms: 5_000,
            adapter_index: 0,
        }
    }
}

/// A device seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Peripheral identifier
    pub id: String,
    /// Advertised name
    pub name: Option<String>,
    /// Signal strength
    pub rssi: Option<i16>,
    /// Advertised service UUIDs
    pub services: Vec<Uuid>,
}

/// Picks one candidate out of a scan, standing in for a system chooser
pub trait DeviceChooser: Send + Sync {
    /// Index of the chosen candidate; `None` cancels
    fn choose(&self, candidates: &[Candidate], request: &ChooserRequest) -> Option<usize>;
}

/// Chooses the first candidate advertising an allow-listed service
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAllowListed;

impl DeviceChooser for FirstAllowListed {
    fn choose(&self, candidates: &[Candidate], request: &ChooserRequest) -> Option<usize> {
        candidates.iter().position(|c| {
            c.services
                .iter()
                .any(|s| request.optional_services.contains(s))
        })
    }
}

/// Chooses the candidate with a given identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ById(pub String);

impl DeviceChooser for ById {
    fn choose(&self, candidates: &[Candidate], _request: &ChooserRequest) -> Option<usize> {
        candidates
            .iter()
            .position(|c| c.id.eq_ignore_ascii_case(&self.0))
    }
}

fn unsupported(context: &str, error: &btleplug::Error) -> PrintError {
    PrintError::Unsupported(format!("{context}: {error}"))
}

/// Host Bluetooth stack reached through btleplug
///
/// Desktop stacks have no system device chooser, so requests scan for a
/// fixed window and let a [`DeviceChooser`] pick among the candidates.
pub struct BtleHost {
    manager: Manager,
    scan: ScanConfig,
    chooser: Box<dyn DeviceChooser>,
}

impl BtleHost {
    /// Connect to the platform Bluetooth manager
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::Unsupported`] if the platform stack cannot be opened.
    pub async fn new(scan: ScanConfig) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| unsupported("Bluetooth manager unavailable", &e))?;

        Ok(Self {
            manager,
            scan,
            chooser: Box::new(FirstAllowListed),
        })
    }

    /// Replace the device chooser
    #[must_use]
    pub fn with_chooser(mut self, chooser: impl DeviceChooser + 'static) -> Self {
        self.chooser = Box::new(chooser);
        self
    }

    async fn adapter(&self) -> Result<Adapter> {
        let adapters = self
            .manager
            .adapters()
            .await
            .map_err(|e| unsupported("cannot list Bluetooth adapters", &e))?;

        adapters
            .into_iter()
            .nth(self.scan.adapter_index)
            .ok_or_else(|| PrintError::Unsupported("no Bluetooth adapter found".to_string()))
    }

    #[instrument(skip_all, level = "debug")]
    async fn scan(&self, adapter: &Adapter) -> Result<Vec<Peripheral>> {
        info!("Scanning for {:?}", self.scan.scan_window());
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| unsupported("cannot start scan", &e))?;

        tokio::time::sleep(self.scan.scan_window()).await;

        if let Err(e) = adapter.stop_scan().await {
            debug!(?e, "failed to stop scan cleanly");
        }
        Ok(adapter.peripherals().await?)
    }

    async fn candidate(peripheral: &Peripheral) -> Candidate {
        let id = peripheral.id().to_string();
        match peripheral.properties().await {
            Ok(Some(properties)) => Candidate {
                id,
                name: properties.local_name,
                rssi: properties.rssi,
                services: properties.services,
            },
            _ => Candidate {
                id,
                name: None,
                rssi: None,
                services: Vec::new(),
            },
        }
    }

    fn wrap(peripheral: Peripheral, candidate: Candidate) -> Arc<dyn BlePeripheral> {
        Arc::new(BtlePeripheral {
            peripheral,
            id: candidate.id,
            name: candidate.name,
        })
    }
}

#[async_trait]
impl BleHost for BtleHost {
    async fn ensure_available(&self) -> Result<()> {
        self.adapter().await.map(|_| ())
    }

    async fn request_device(
        &self,
        request: &ChooserRequest,
    ) -> Result<Option<Arc<dyn BlePeripheral>>> {
        let adapter = self.adapter().await?;
        let peripherals = self.scan(&adapter).await?;

        let candidates = join_all(peripherals.iter().map(Self::candidate)).await;
        info!("Scan found {} device(s)", candidates.len());

        let Some(index) = self.chooser.choose(&candidates, request) else {
            return Ok(None);
        };
        let (Some(peripheral), Some(candidate)) = (
            peripherals.into_iter().nth(index),
            candidates.into_iter().nth(index),
        ) else {
            warn!("Chooser returned out-of-range index {}", index);
            return Ok(None);
        };
        Ok(Some(Self::wrap(peripheral, candidate)))
    }

    async fn authorized_devices(&self) -> Result<Vec<Arc<dyn BlePeripheral>>> {
        let adapter = self.adapter().await?;
        let mut peripherals = adapter.peripherals().await?;
        if peripherals.is_empty() {
            // nothing cached by the stack yet
            peripherals = self.scan(&adapter).await?;
        }

        let candidates = join_all(peripherals.iter().map(Self::candidate)).await;
        Ok(peripherals
            .into_iter()
            .zip(candidates)
            .map(|(peripheral, candidate)| Self::wrap(peripheral, candidate))
            .collect())
    }

    async fn is_authorized(&self, id: &str) -> Result<bool> {
        // no permission model here: a chosen printer stays granted until forgotten
        debug!(id, "authorization is implicit on this host");
        Ok(true)
    }
}

/// A btleplug peripheral behind the host seam
#[derive(Debug)]
pub struct BtlePeripheral {
    peripheral: Peripheral,
    id: String,
    name: Option<String>,
}

impl BtlePeripheral {
    fn find_characteristic(&self, channel: &GattChannel) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == channel.characteristic && c.service_uuid == channel.service)
    }
}

#[async_trait]
impl BlePeripheral for BtlePeripheral {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn connect(&self) -> Result<()> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            return Ok(());
        }
        self.peripheral
            .connect()
            .await
            .map_err(|e| PrintError::ConnectionFailed(e.to_string()))
    }

    async fn primary_services(&self) -> Result<Vec<ServiceInfo>> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| PrintError::ConnectionFailed(e.to_string()))?;

        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.primary)
            .map(|s| ServiceInfo {
                uuid: s.uuid,
                characteristics: s
                    .characteristics
                    .into_iter()
                    .map(|c| CharacteristicInfo::new(c.uuid, c.properties))
                    .collect(),
            })
            .collect())
    }

    async fn write(&self, channel: &GattChannel, data: &[u8]) -> Result<()> {
        let characteristic =
            self.find_characteristic(channel)
                .ok_or_else(|| PrintError::TransmitFailed {
                    chunk: 0,
                    chunks: 0,
                    reason: format!("characteristic {} not found", channel.characteristic),
                })?;

        self.peripheral
            .write(&characteristic, data, WriteType::from(channel.write_mode))
            .await
            .map_err(|e| PrintError::TransmitFailed {
                chunk: 0,
                chunks: 0,
                reason: e.to_string(),
            })
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ServiceCatalog, GENERIC_ACCESS, PRINTER_18F0_SERVICE};
    use crate::discovery::chooser_request;

    fn candidate(id: &str, services: Vec<Uuid>) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: Some(format!("Device {id}")),
            rssi: Some(-60),
            services,
        }
    }

    #[test]
    fn test_first_allow_listed() {
        let request = chooser_request(&ServiceCatalog::default());
        let headphones = Uuid::from_u128(0x0000_110b_0000_1000_8000_0080_5f9b_34fb);
        let candidates = vec![
            candidate("01", vec![headphones]),
            candidate("02", vec![]),
            candidate("03", vec![PRINTER_18F0_SERVICE]),
            candidate("04", vec![GENERIC_ACCESS]),
        ];

        assert_eq!(FirstAllowListed.choose(&candidates, &request), Some(2));
        assert_eq!(FirstAllowListed.choose(&candidates[..2], &request), None);
    }

    #[test]
    fn test_by_id() {
        let request = chooser_request(&ServiceCatalog::default());
        let candidates = vec![candidate("AA:BB", vec![]), candidate("CC:DD", vec![])];

        assert_eq!(ById("cc:dd".to_string()).choose(&candidates, &request), Some(1));
        assert_eq!(ById("EE:FF".to_string()).choose(&candidates, &request), None);
    }

    #[test]
    fn test_scan_config_json() {
        let config: ScanConfig = serde_json::from_str(r#"{ "scan_window_ms": 2000 }"#).unwrap();
        assert_eq!(config.scan_window(), Duration::from_secs(2));
        assert_eq!(config.adapter_index, 0);
    }
}
