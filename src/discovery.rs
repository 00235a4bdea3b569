use tracing::{info, instrument};

use crate::{
    catalog::ServiceCatalog,
    error::{PrintError, Result},
    host::{BleHost, ChooserRequest},
    registry::DeviceRegistry,
    types::PrinterHandle,
};

/// Chooser request offering every nearby device with the catalog's allow-list
#[must_use]
pub fn chooser_request(catalog: &ServiceCatalog) -> ChooserRequest {
    ChooserRequest {
        accept_all_devices: true,
        optional_services: catalog.optional_services().to_vec(),
    }
}

/// Let the user pick a printer and remember it
///
/// # Errors
///
/// Returns [`PrintError::Unsupported`] if the host cannot do BLE and
/// [`PrintError::EmptySelection`] if the user cancels; in both cases the
/// registry is left untouched.
#[instrument(skip_all)]
pub async fn discover(
    host: &dyn BleHost,
    registry: &mut DeviceRegistry,
    catalog: &ServiceCatalog,
) -> Result<PrinterHandle> {
    host.ensure_available().await?;

    let request = chooser_request(catalog);
    info!(
        "Opening device chooser ({} optional service(s))",
        request.optional_services.len()
    );

    let Some(peripheral) = host.request_device(&request).await? else {
        info!("Device chooser cancelled");
        return Err(PrintError::EmptySelection);
    };

    let handle = PrinterHandle::from_peripheral(peripheral);
    info!("Selected printer {} ({})", handle.display_name, handle.id);
    registry.save(handle.clone()).await;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{MockHost, MockPeripheral},
        registry::{MemoryStore, PrinterStore},
        types::LinkStatus,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_discover_saves_selection() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = DeviceRegistry::new(Box::new(Arc::clone(&store)));
        let host = MockHost::new().selecting(Arc::new(MockPeripheral::new("AA:BB", "PT-210")));
        let catalog = ServiceCatalog::default();

        let handle = discover(&host, &mut registry, &catalog).await.unwrap();
        assert_eq!(handle.id, "AA:BB");
        assert_eq!(handle.display_name, "PT-210");
        assert_eq!(handle.link_status, LinkStatus::Unknown);
        assert_eq!(registry.current().unwrap().id, "AA:BB");
        assert_eq!(store.load().await.unwrap().unwrap().id, "AA:BB");

        let requests = host.chooser_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].accept_all_devices);
        assert_eq!(requests[0].optional_services, catalog.optional_services());
    }

    #[tokio::test]
    async fn test_discover_unnamed_device_gets_fallback_name() {
        let mut registry = DeviceRegistry::new(Box::new(MemoryStore::new()));
        let host = MockHost::new().selecting(Arc::new(MockPeripheral::unnamed("AA:BB")));

        let handle = discover(&host, &mut registry, &ServiceCatalog::default())
            .await
            .unwrap();
        assert_eq!(handle.display_name, "Printer AA:BB");
    }

    #[tokio::test]
    async fn test_cancelled_discovery_leaves_registry_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let mut registry = DeviceRegistry::new(Box::new(Arc::clone(&store)));
        let previous = Arc::new(MockPeripheral::new("11:22", "Old"));
        registry.save(PrinterHandle::from_peripheral(previous)).await;

        let host = MockHost::new();
        let error = discover(&host, &mut registry, &ServiceCatalog::default())
            .await
            .unwrap_err();
        assert!(error.is_cancellation());
        assert_eq!(registry.current().unwrap().id, "11:22");
        assert_eq!(store.load().await.unwrap().unwrap().id, "11:22");
    }

    #[tokio::test]
    async fn test_unsupported_host_never_opens_chooser() {
        let mut registry = DeviceRegistry::new(Box::new(MemoryStore::new()));
        let host = MockHost::unsupported("no Bluetooth adapter found");

        let error = discover(&host, &mut registry, &ServiceCatalog::default())
            .await
            .unwrap_err();
        assert!(matches!(error, PrintError::Unsupported(ref reason) if reason.contains("adapter")));
        assert!(host.chooser_requests().is_empty());
        assert!(registry.current().is_none());
    }
}
