use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{PrintError, Result},
    escpos::INITIALIZE,
    host::BlePeripheral,
    negotiate::bounded,
    types::{GattChannel, TimeoutConfig, TransportConfig},
};

/// Outcome of a completed transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitSummary {
    /// Payload bytes written, excluding the initialize command
    pub bytes: usize,
    /// Payload writes issued, excluding the initialize command
    pub chunks: usize,
}

/// Streams a payload to a negotiated channel in MTU-sized, paced writes
#[derive(Debug, Clone, Default)]
pub struct ChunkedWriter {
    transport: TransportConfig,
    timeouts: TimeoutConfig,
}

impl ChunkedWriter {
    /// Create a writer
    #[must_use]
    pub const fn new(transport: TransportConfig, timeouts: TimeoutConfig) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    fn mtu(&self) -> usize {
        self.transport.mtu.max(1)
    }

    /// Number of payload writes needed for `len` bytes
    #[must_use]
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.mtu())
    }

    /// Send the initialize command followed by `payload`, then disconnect
    ///
    /// The peripheral is disconnected whether or not the transmission succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`PrintError::TransmitFailed`] naming the failed write if any
    /// write fails or times out. Nothing is retried.
    #[instrument(skip_all, fields(peripheral = %peripheral.id(), channel = %channel, bytes = payload.len()))]
    pub async fn transmit(
        &self,
        peripheral: &dyn BlePeripheral,
        channel: &GattChannel,
        payload: &[u8],
    ) -> Result<TransmitSummary> {
        let result = self.stream(peripheral, channel, payload).await;

        if let Err(e) = peripheral.disconnect().await {
            warn!("Disconnect after transmission failed: {}", e);
        }

        match &result {
            Ok(summary) => info!(
                "Sent {} byte(s) in {} chunk(s)",
                summary.bytes, summary.chunks
            ),
            Err(e) => warn!("Transmission aborted: {}", e),
        }
        result
    }

    async fn stream(
        &self,
        peripheral: &dyn BlePeripheral,
        channel: &GattChannel,
        payload: &[u8],
    ) -> Result<TransmitSummary> {
        let chunks = self.chunk_count(payload.len());
        let writes = chunks + 1;

        self.write_one(peripheral, channel, &INITIALIZE, 0, writes)
            .await?;

        for (index, chunk) in payload.chunks(self.mtu()).enumerate() {
            if index > 0 {
                sleep(self.transport.chunk_delay()).await;
            }
            debug!("Writing chunk {}/{} ({} bytes)", index + 1, chunks, chunk.len());
            self.write_one(peripheral, channel, chunk, index + 1, writes)
                .await?;
        }

        Ok(TransmitSummary {
            bytes: payload.len(),
            chunks,
        })
    }

    async fn write_one(
        &self,
        peripheral: &dyn BlePeripheral,
        channel: &GattChannel,
        data: &[u8],
        chunk: usize,
        chunks: usize,
    ) -> Result<()> {
        bounded(
            self.timeouts.write_timeout_ms,
            peripheral.write(channel, data),
            |ms| PrintError::TransmitFailed {
                chunk,
                chunks,
                reason: format!("write timed out after {ms} ms"),
            },
        )
        .await
        .map_err(|e| match e {
            PrintError::TransmitFailed { reason, .. } => PrintError::TransmitFailed {
                chunk,
                chunks,
                reason,
            },
            other => PrintError::TransmitFailed {
                chunk,
                chunks,
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mock::MockPeripheral, types::WriteMode};
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    fn channel() -> GattChannel {
        GattChannel {
            service: Uuid::from_u128(1),
            characteristic: Uuid::from_u128(2),
            write_mode: WriteMode::WithoutResponse,
        }
    }

    fn writer(chunk_delay_ms: u64) -> ChunkedWriter {
        ChunkedWriter::new(
            TransportConfig {
                mtu: 512,
                chunk_delay_ms,
            },
            TimeoutConfig::default(),
        )
    }

    async fn connected(peripheral: MockPeripheral) -> MockPeripheral {
        peripheral.connect().await.unwrap();
        peripheral
    }

    #[test]
    fn test_chunk_count() {
        let writer = writer(0);
        assert_eq!(writer.chunk_count(0), 0);
        assert_eq!(writer.chunk_count(1), 1);
        assert_eq!(writer.chunk_count(512), 1);
        assert_eq!(writer.chunk_count(513), 2);
        assert_eq!(writer.chunk_count(1300), 3);
    }

    #[tokio::test]
    async fn test_large_payload_is_chunked() {
        let peripheral = connected(MockPeripheral::new("AA:BB", "PT-210")).await;
        let payload: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();

        let summary = writer(0)
            .transmit(&peripheral, &channel(), &payload)
            .await
            .unwrap();
        assert_eq!(summary, TransmitSummary { bytes: 1300, chunks: 3 });

        let writes = peripheral.writes();
        let sizes: Vec<usize> = writes.iter().map(|w| w.data.len()).collect();
        assert_eq!(sizes, vec![2, 512, 512, 276]);
        assert_eq!(writes[0].data, INITIALIZE.to_vec());

        let reassembled: Vec<u8> = writes[1..].iter().flat_map(|w| w.data.clone()).collect();
        assert_eq!(reassembled, payload);
        assert!(!peripheral.is_connected());
        assert_eq!(peripheral.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_small_payload_is_one_write() {
        let peripheral = connected(MockPeripheral::new("AA:BB", "PT-210")).await;

        let summary = writer(0)
            .transmit(&peripheral, &channel(), b"hello\n")
            .await
            .unwrap();
        assert_eq!(summary.chunks, 1);
        assert_eq!(peripheral.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_payload_sends_only_initialize() {
        let peripheral = connected(MockPeripheral::new("AA:BB", "PT-210")).await;

        let summary = writer(0)
            .transmit(&peripheral, &channel(), &[])
            .await
            .unwrap();
        assert_eq!(summary.chunks, 0);
        assert_eq!(peripheral.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_still_disconnects() {
        // initialize and the first chunk succeed
        let peripheral =
            connected(MockPeripheral::new("AA:BB", "PT-210").failing_after(2)).await;

        let error = writer(0)
            .transmit(&peripheral, &channel(), &[0x41; 1300])
            .await
            .unwrap_err();
        match error {
            PrintError::TransmitFailed {
                chunk,
                chunks,
                reason,
            } => {
                assert_eq!(chunk, 2);
                assert_eq!(chunks, 4);
                assert_eq!(reason, "link lost");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(peripheral.writes().len(), 2);
        assert_eq!(peripheral.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_chunks_are_paced() {
        let peripheral = connected(MockPeripheral::new("AA:BB", "PT-210")).await;

        let started = Instant::now();
        writer(20)
            .transmit(&peripheral, &channel(), &[0x41; 1300])
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
