//! Timestamp-scheduled TX bursts.
//!
//! Drives a [`SyncTransport`] directly in the metadata format, one
//! single-call burst at a time, either immediately or at absolute
//! timestamps on the TX sample clock. Does not go through the device front.

use std::thread;
use std::time::Duration;

use sdrdev_core::NativeFormat;
use tracing::{debug, error, info, warn};

use super::bladerf::alloc_native;
use super::meta::Metadata;
use super::transport::{SyncParams, SyncTransport};
use super::StreamDirection;
use crate::device::{SdrError, SdrResult};

/// Interval between timestamp polls in [`wait_for_timestamp`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pause between immediate bursts, so each is sent, padded and drained.
pub const IMMEDIATE_BURST_GAP: Duration = Duration::from_millis(5);

/// Block until the `direction` sample clock reaches `target`.
///
/// Polls every [`POLL_INTERVAL`]. Returns `Timeout` once the accumulated
/// sleep exceeds `timeout`; a target already in the past returns at once.
pub fn wait_for_timestamp(
    transport: &mut dyn SyncTransport,
    direction: StreamDirection,
    target: u64,
    timeout: Duration,
) -> SdrResult<()> {
    let mut slept = Duration::ZERO;

    loop {
        let now = transport.timestamp(direction).map_err(|source| {
            error!("Failed to get {} timestamp: {}", direction, source);
            SdrError::Transport { direction, source }
        })?;

        if now >= target {
            return Ok(());
        }

        if slept > timeout {
            return Err(SdrError::Timeout(format!(
                "{} timestamp {} (now {})",
                direction, target, now
            )));
        }

        thread::sleep(POLL_INTERVAL);
        slept += POLL_INTERVAL;
    }
}

/// Fills a burst buffer with a constant I/Q pair.
///
/// The buffer is populated on first use only; later bursts reuse it.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    i: i16,
    q: i16,
    populated: bool,
}

impl ToneGenerator {
    pub fn new(i: i16, q: i16) -> Self {
        Self {
            i,
            q,
            populated: false,
        }
    }

    /// Constant carrier at about 98% of full scale on each rail.
    pub fn carrier() -> Self {
        Self::new(2000, 2000)
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Forget the previous fill so the next `produce` writes again.
    pub fn reset(&mut self) {
        self.populated = false;
    }

    /// Fill `native` unless it was already filled.
    pub fn produce(&mut self, native: &mut [i16]) {
        if self.populated {
            return;
        }
        for pair in native.chunks_exact_mut(2) {
            pair[0] = self.i;
            pair[1] = self.q;
        }
        self.populated = true;
    }
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::carrier()
    }
}

/// Sync and burst parameters for a [`BurstTransmitter`].
#[derive(Debug, Clone, PartialEq)]
pub struct BurstConfig {
    /// Samples per burst
    pub num_samples: usize,
    pub num_buffers: u32,
    /// Samples per transport buffer
    pub buffer_size: u32,
    pub num_transfers: u32,
    pub stream_timeout_ms: u32,
    /// Timeout for each `sync_tx` and each final wait
    pub timeout_ms: u32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            num_samples: 4096,
            num_buffers: 32,
            buffer_size: 2048,
            num_transfers: 16,
            stream_timeout_ms: 1000,
            timeout_ms: 2500,
        }
    }
}

impl BurstConfig {
    fn sync_params(&self) -> SyncParams {
        SyncParams {
            num_buffers: self.num_buffers,
            buffer_size: self.buffer_size,
            num_transfers: self.num_transfers,
            stream_timeout_ms: self.stream_timeout_ms,
        }
    }
}

/// Sends fixed-length bursts over a transport's TX path.
///
/// TX is configured for metadata and enabled on construction, and disabled
/// again on drop.
pub struct BurstTransmitter {
    transport: Box<dyn SyncTransport>,
    samples: Vec<i16>,
    num_samples: usize,
    timeout_ms: u32,
    enabled: bool,
}

impl BurstTransmitter {
    pub fn new(transport: Box<dyn SyncTransport>, config: &BurstConfig) -> SdrResult<Self> {
        if config.num_samples == 0 {
            return Err(SdrError::InvalidArgument("burst length must be nonzero".to_string()));
        }
        let samples = alloc_native(config.num_samples)?;

        let mut tx = Self {
            transport,
            samples,
            num_samples: config.num_samples,
            timeout_ms: config.timeout_ms,
            enabled: false,
        };

        tx.transport
            .sync_config(
                StreamDirection::Tx,
                NativeFormat::Sc16Q11Meta,
                &config.sync_params(),
            )
            .map_err(|source| {
                error!("Failed to configure TX sync interface: {}", source);
                SdrError::Configuration {
                    context: "TX sync interface".to_string(),
                    source,
                }
            })?;

        tx.transport
            .enable(StreamDirection::Tx, true)
            .map_err(|source| {
                error!("Failed to enable TX module: {}", source);
                SdrError::Configuration {
                    context: "enable TX".to_string(),
                    source,
                }
            })?;
        tx.enabled = true;

        Ok(tx)
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Current TX sample-clock timestamp.
    pub fn current_timestamp(&mut self) -> SdrResult<u64> {
        self.transport
            .timestamp(StreamDirection::Tx)
            .map_err(|source| {
                error!("Failed to get TX timestamp: {}", source);
                SdrError::Transport {
                    direction: StreamDirection::Tx,
                    source,
                }
            })
    }

    fn send(&mut self, meta: &mut Metadata) -> SdrResult<()> {
        self.transport
            .sync_tx(&self.samples, self.num_samples, meta, self.timeout_ms)
            .map_err(|source| {
                error!("TX failed: {}", source);
                SdrError::from_sync(StreamDirection::Tx, source)
            })
    }

    /// Send `tx_count` bursts as soon as possible.
    ///
    /// Waits until the clock passes two burst lengths beyond the last
    /// submission before returning.
    pub fn transmit_now(&mut self, tx_count: usize, signal: &mut ToneGenerator) -> SdrResult<()> {
        let mut meta = Metadata::burst_now();

        for _ in 0..tx_count {
            signal.produce(&mut self.samples);
            self.send(&mut meta)?;

            let ts = self.current_timestamp()?;
            info!("TX'd at approximately t={}", ts);
            thread::sleep(IMMEDIATE_BURST_GAP);
        }

        let ts = self.current_timestamp()?;
        let target = ts + 2 * self.num_samples as u64;
        debug!("Waiting for TX clock to reach {}", target);
        let timeout = self.timeout();
        wait_for_timestamp(self.transport.as_mut(), StreamDirection::Tx, target, timeout)
    }

    /// Send `tx_count` bursts at evenly spaced absolute timestamps.
    ///
    /// The clock is read once; bursts start `sample_rate / 200` samples
    /// (5 ms) apart after that. Returns the scheduled timestamps.
    pub fn transmit_scheduled(
        &mut self,
        tx_count: usize,
        sample_rate: u32,
        signal: &mut ToneGenerator,
    ) -> SdrResult<Vec<u64>> {
        let spacing = u64::from(sample_rate / 200);
        if spacing < self.num_samples as u64 {
            return Err(SdrError::InvalidArgument(format!(
                "burst spacing of {} samples at {} Hz is shorter than a {} sample burst",
                spacing, sample_rate, self.num_samples
            )));
        }

        let mut meta = Metadata::burst_at(self.current_timestamp()?);
        info!("Starting scheduled TX at t={}", meta.timestamp);

        let mut scheduled = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            signal.produce(&mut self.samples);
            meta.timestamp += spacing;
            self.send(&mut meta)?;
            info!("TX'd @ t={}", meta.timestamp);
            scheduled.push(meta.timestamp);
        }

        let target = meta.timestamp + 2 * spacing;
        debug!("Waiting for TX clock to reach {}", target);
        let timeout = self.timeout();
        wait_for_timestamp(self.transport.as_mut(), StreamDirection::Tx, target, timeout)?;
        Ok(scheduled)
    }
}

impl Drop for BurstTransmitter {
    fn drop(&mut self) {
        if self.enabled {
            if let Err(e) = self.transport.enable(StreamDirection::Tx, false) {
                warn!("Failed to disable TX module: {}", e);
            }
        }
        info!("Closing {} transport", self.transport.name());
    }
}
