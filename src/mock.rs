use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use uuid::Uuid;

use crate::{
    error::{PrintError, Result},
    host::{BleHost, BlePeripheral, ChooserRequest},
    types::{GattChannel, ServiceInfo},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One recorded GATT write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// Channel the write went to
    pub channel: GattChannel,
    /// Bytes written
    pub data: Vec<u8>,
}

/// In-memory peripheral with a fixed GATT topology
#[derive(Debug, Default)]
pub struct MockPeripheral {
    id: String,
    name: Option<String>,
    services: Vec<ServiceInfo>,
    refuse_connect: bool,
    rejecting: HashSet<Uuid>,
    fail_after: Option<usize>,
    writes: Mutex<Vec<RecordedWrite>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockPeripheral {
    /// Create a named peripheral without services
    #[must_use]
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Create a peripheral that advertises no name
    #[must_use]
    pub fn unnamed(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    /// Add a primary service
    #[must_use]
    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.services.push(service);
        self
    }

    /// Make every connection attempt fail
    #[must_use]
    pub const fn refusing_connections(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Make writes to one characteristic fail
    #[must_use]
    pub fn rejecting_writes_to(mut self, characteristic: Uuid) -> Self {
        self.rejecting.insert(characteristic);
        self
    }

    /// Accept `count` writes, then fail every later one
    #[must_use]
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Successful writes so far
    #[must_use]
    pub fn writes(&self) -> Vec<RecordedWrite> {
        lock(&self.writes).clone()
    }

    /// Whether a connection is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of connect calls
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls
    #[must_use]
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlePeripheral for MockPeripheral {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect {
            return Err(PrintError::ConnectionFailed(format!(
                "{} is out of range",
                self.id
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn primary_services(&self) -> Result<Vec<ServiceInfo>> {
        if !self.is_connected() {
            return Err(PrintError::ConnectionFailed("not connected".to_string()));
        }
        Ok(self.services.clone())
    }

    async fn write(&self, channel: &GattChannel, data: &[u8]) -> Result<()> {
        let failure = |reason: &str| PrintError::TransmitFailed {
            chunk: 0,
            chunks: 0,
            reason: reason.to_string(),
        };

        if !self.is_connected() {
            return Err(failure("not connected"));
        }
        if self.rejecting.contains(&channel.characteristic) {
            return Err(failure("write rejected"));
        }

        let mut writes = lock(&self.writes);
        if self.fail_after.is_some_and(|limit| writes.len() >= limit) {
            return Err(failure("link lost"));
        }
        writes.push(RecordedWrite {
            channel: *channel,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory host with a scripted chooser
///
/// Lets the whole print path run without hardware.
#[derive(Debug, Default)]
pub struct MockHost {
    unsupported: Option<String>,
    selection: Option<Arc<MockPeripheral>>,
    authorized: Vec<Arc<MockPeripheral>>,
    out_of_range: Vec<String>,
    authorized_fails: bool,
    requests: Mutex<Vec<ChooserRequest>>,
}

impl MockHost {
    /// Host whose chooser is always cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host without BLE support
    #[must_use]
    pub fn unsupported(reason: &str) -> Self {
        Self {
            unsupported: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Make the chooser pick `peripheral`; it also becomes authorized
    #[must_use]
    pub fn selecting(mut self, peripheral: Arc<MockPeripheral>) -> Self {
        self.authorized.push(Arc::clone(&peripheral));
        self.selection = Some(peripheral);
        self
    }

    /// Add a previously authorized device
    #[must_use]
    pub fn with_authorized(mut self, peripheral: MockPeripheral) -> Self {
        self.authorized.push(Arc::new(peripheral));
        self
    }

    /// Keep access to `id` granted while the device itself is unreachable
    #[must_use]
    pub fn with_authorized_out_of_range(mut self, id: &str) -> Self {
        self.out_of_range.push(id.to_string());
        self
    }

    /// Make listing authorized devices fail
    #[must_use]
    pub const fn with_failing_authorized_list(mut self) -> Self {
        self.authorized_fails = true;
        self
    }

    /// Chooser requests received so far
    #[must_use]
    pub fn chooser_requests(&self) -> Vec<ChooserRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl BleHost for MockHost {
    async fn ensure_available(&self) -> Result<()> {
        match &self.unsupported {
            Some(reason) => Err(PrintError::Unsupported(reason.clone())),
            None => Ok(()),
        }
    }

    async fn request_device(
        &self,
        request: &ChooserRequest,
    ) -> Result<Option<Arc<dyn BlePeripheral>>> {
        lock(&self.requests).push(request.clone());
        Ok(self
            .selection
            .clone()
            .map(|p| p as Arc<dyn BlePeripheral>))
    }

    async fn authorized_devices(&self) -> Result<Vec<Arc<dyn BlePeripheral>>> {
        if self.authorized_fails {
            return Err(PrintError::Unsupported("permission query failed".to_string()));
        }
        Ok(self
            .authorized
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn BlePeripheral>)
            .collect())
    }

    async fn is_authorized(&self, id: &str) -> Result<bool> {
        if self.authorized_fails {
            return Err(PrintError::Unsupported("permission query failed".to_string()));
        }
        Ok(self.authorized.iter().any(|p| p.id == id) || self.out_of_range.iter().any(|o| o == id))
    }
}
