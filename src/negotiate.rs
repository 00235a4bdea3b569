use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    catalog::ServiceCatalog,
    error::{PrintError, Result},
    escpos::INITIALIZE,
    host::BlePeripheral,
    types::{GattChannel, ServiceInfo, TimeoutConfig, WriteMode},
};

/// Progress of one negotiation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No connection yet
    Disconnected,
    /// Connect request in flight
    Connecting,
    /// Primary services enumerated
    ServicesEnumerated {
        /// Number of services reported
        services: usize,
    },
    /// A writable channel was selected
    ChannelFound,
    /// Every service was searched without success
    ChannelNotFound,
}

/// Run `future` under an optional limit, mapping expiry through `on_timeout`
pub(crate) async fn bounded<T, F>(
    limit_ms: Option<u64>,
    future: F,
    on_timeout: impl FnOnce(u64) -> PrintError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit_ms {
        Some(ms) => timeout(Duration::from_millis(ms), future)
            .await
            .map_err(|_| on_timeout(ms))?,
        None => future.await,
    }
}

fn connection_failure(stage: &str, error: PrintError) -> PrintError {
    match error {
        PrintError::ConnectionFailed(_) => error,
        other => PrintError::ConnectionFailed(format!("{stage}: {other}")),
    }
}

/// Resolves a writable [`GattChannel`] on a connected printer
///
/// Services are ranked against the [`ServiceCatalog`] and the first writable
/// channel that can be confirmed wins.
#[derive(Debug, Clone)]
pub struct ChannelNegotiator {
    catalog: Arc<ServiceCatalog>,
    timeouts: TimeoutConfig,
}

impl ChannelNegotiator {
    /// Create a negotiator using `catalog` for ranking and fast-path checks
    #[must_use]
    pub const fn new(catalog: Arc<ServiceCatalog>, timeouts: TimeoutConfig) -> Self {
        Self { catalog, timeouts }
    }

    /// Connect to `peripheral` and find its print channel
    ///
    /// The connection is left open on success. On failure the caller is
    /// responsible for disconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::ConnectionFailed`] if connecting or service
    /// enumeration fails or times out, and [`PrintError::ChannelNotFound`] if no
    /// service exposes a writable characteristic.
    #[instrument(skip_all, fields(peripheral = %peripheral.id()))]
    pub async fn negotiate(&self, peripheral: &dyn BlePeripheral) -> Result<GattChannel> {
        Self::trace(NegotiationState::Disconnected);

        Self::trace(NegotiationState::Connecting);
        bounded(self.timeouts.connect_timeout_ms, peripheral.connect(), |ms| {
            PrintError::ConnectionFailed(format!("connect timed out after {ms} ms"))
        })
        .await
        .map_err(|e| connection_failure("connect", e))?;

        let services = bounded(
            self.timeouts.discovery_timeout_ms,
            peripheral.primary_services(),
            |ms| PrintError::ConnectionFailed(format!("service discovery timed out after {ms} ms")),
        )
        .await
        .map_err(|e| connection_failure("service discovery", e))?;
        Self::trace(NegotiationState::ServicesEnumerated {
            services: services.len(),
        });

        let ranked = self.rank(services);
        let services_searched = ranked.len();
        for service in &ranked {
            if let Some(channel) = self.search_service(peripheral, service).await {
                Self::trace(NegotiationState::ChannelFound);
                info!("Using print channel {}", channel);
                return Ok(channel);
            }
        }

        Self::trace(NegotiationState::ChannelNotFound);
        warn!("No writable characteristic in {} service(s)", services_searched);
        Err(PrintError::ChannelNotFound { services_searched })
    }

    /// Order services by catalog priority; unknown services keep their relative order
    #[must_use]
    pub fn rank(&self, mut services: Vec<ServiceInfo>) -> Vec<ServiceInfo> {
        services.sort_by_key(|s| self.catalog.priority_of(s.uuid).unwrap_or(usize::MAX));
        services
    }

    async fn search_service(
        &self,
        peripheral: &dyn BlePeripheral,
        service: &ServiceInfo,
    ) -> Option<GattChannel> {
        let mut rejected = HashSet::new();

        for uuid in self.catalog.fast_path_characteristics() {
            let Some(channel) = Self::channel_for(service, *uuid) else {
                continue;
            };
            match self.confirm_write(peripheral, &channel).await {
                Ok(()) => return Some(channel),
                Err(e) => {
                    debug!("Confirming write to {} rejected: {}", channel, e);
                    rejected.insert(channel.characteristic);
                }
            }
        }

        service
            .characteristics
            .iter()
            .filter(|c| !rejected.contains(&c.uuid))
            .find_map(|c| {
                WriteMode::for_properties(c.properties).map(|write_mode| GattChannel {
                    service: service.uuid,
                    characteristic: c.uuid,
                    write_mode,
                })
            })
    }

    fn channel_for(service: &ServiceInfo, characteristic: Uuid) -> Option<GattChannel> {
        let info = service.characteristic(characteristic)?;
        let write_mode = WriteMode::for_properties(info.properties)?;
        Some(GattChannel {
            service: service.uuid,
            characteristic,
            write_mode,
        })
    }

    async fn confirm_write(&self, peripheral: &dyn BlePeripheral, channel: &GattChannel) -> Result<()> {
        bounded(
            self.timeouts.write_timeout_ms,
            peripheral.write(channel, &INITIALIZE),
            |ms| PrintError::ConnectionFailed(format!("confirming write timed out after {ms} ms")),
        )
        .await
    }

    fn trace(state: NegotiationState) {
        debug!(?state, "negotiation");
    }
}
