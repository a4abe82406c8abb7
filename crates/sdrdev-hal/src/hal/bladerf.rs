//! bladeRF backend.
//!
//! Receive is chunked through one scratch buffer per direction, sized
//! `samples_per_buffer` at open. Each direction's sync interface is
//! configured and enabled on first use.
//!
//! Direct TX through the device front is not offered; scheduled bursts go
//! through [`BurstTransmitter`](super::burst::BurstTransmitter).

use sdrdev_core::io::sc16q11_to_complexf;
use sdrdev_core::types::{IQSample, NATIVE_VALUES_PER_SAMPLE};
use sdrdev_core::{NativeFormat, StreamConfig};
use tracing::{debug, error, info, warn};

use super::meta::Metadata;
use super::transport::{status, SyncParams, SyncTransport, TransportError};
use super::StreamDirection;
use crate::device::{DeviceBackend, SdrError, SdrResult};

/// Allocate a zeroed native buffer for `samples` samples.
///
/// Reports failure instead of aborting, so a caller can unwind cleanly.
pub(crate) fn alloc_native(samples: usize) -> SdrResult<Vec<i16>> {
    let len = samples
        .checked_mul(NATIVE_VALUES_PER_SAMPLE)
        .ok_or_else(|| SdrError::Allocation(format!("{} samples overflows", samples)))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| SdrError::Allocation(format!("{} samples: {}", samples, e)))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Open the radio's sync transport on its own, for use outside the device
/// front (e.g. by a [`BurstTransmitter`](super::burst::BurstTransmitter)).
#[cfg(feature = "bladerf")]
pub fn open_transport(specifier: Option<&str>) -> SdrResult<Box<dyn SyncTransport>> {
    Ok(Box::new(super::bladerf_ffi::LibBladeRf::open(specifier)?))
}

/// Without libbladeRF support every open fails.
#[cfg(not(feature = "bladerf"))]
pub fn open_transport(_specifier: Option<&str>) -> SdrResult<Box<dyn SyncTransport>> {
    Err(SdrError::Open(
        "bladeRF support not compiled in (enable the `bladerf` feature)".to_string(),
    ))
}

/// Per-direction state: enabled flag plus scratch buffer.
#[derive(Debug, Default)]
pub struct ChannelState {
    enabled: bool,
    buf: Vec<i16>,
}

impl ChannelState {
    /// State with a scratch buffer of `buf_len` samples.
    pub fn allocate(buf_len: usize) -> SdrResult<Self> {
        Ok(Self {
            enabled: false,
            buf: alloc_native(buf_len)?,
        })
    }

    /// State whose buffer was never allocated.
    pub fn unallocated() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Scratch buffer length in samples.
    pub fn buf_len(&self) -> usize {
        self.buf.len() / NATIVE_VALUES_PER_SAMPLE
    }

    fn release(&mut self) {
        self.enabled = false;
        self.buf = Vec::new();
    }
}

/// Hardware variant of the device front.
pub struct BladeRfDevice {
    transport: Option<Box<dyn SyncTransport>>,
    config: StreamConfig,
    timeout_ms: u32,
    rx: ChannelState,
    tx: ChannelState,
    overruns: u64,
}

impl BladeRfDevice {
    /// Open the radio named by `config.device_specifier` (any radio if unset).
    ///
    /// Scratch buffers are allocated before the radio is opened.
    pub fn open(config: &StreamConfig) -> SdrResult<Self> {
        let rx = ChannelState::allocate(config.samples_per_buffer)?;
        let tx = ChannelState::allocate(config.samples_per_buffer)?;
        let transport = open_transport(config.device_specifier.as_deref())?;
        Self::from_parts(config, transport, rx, tx).configured()
    }

    /// Build over an already opened transport.
    pub fn with_transport(
        config: &StreamConfig,
        transport: Box<dyn SyncTransport>,
    ) -> SdrResult<Self> {
        let rx = ChannelState::allocate(config.samples_per_buffer)?;
        let tx = ChannelState::allocate(config.samples_per_buffer)?;
        Self::from_parts(config, transport, rx, tx).configured()
    }

    /// Assemble a device from its parts without touching the transport.
    ///
    /// Useful when a direction's buffer could not be allocated; the result
    /// still deinitializes cleanly.
    pub fn from_parts(
        config: &StreamConfig,
        transport: Box<dyn SyncTransport>,
        rx: ChannelState,
        tx: ChannelState,
    ) -> Self {
        info!("Opened {} transport", transport.name());
        Self {
            transport: Some(transport),
            config: config.clone(),
            timeout_ms: config.sync_timeout_ms,
            rx,
            tx,
            overruns: 0,
        }
    }

    fn configured(mut self) -> SdrResult<Self> {
        if let Some(transport) = self.transport.as_mut() {
            transport
                .apply_board_config(&self.config.board)
                .map_err(|source| SdrError::Configuration {
                    context: "board settings".to_string(),
                    source,
                })?;
        }
        Ok(self)
    }

    pub fn rx_state(&self) -> &ChannelState {
        &self.rx
    }

    pub fn tx_state(&self) -> &ChannelState {
        &self.tx
    }

    /// Overruns reported since open.
    pub fn overrun_count(&self) -> u64 {
        self.overruns
    }

    /// Current sample-clock timestamp of one direction.
    pub fn timestamp(&mut self, direction: StreamDirection) -> SdrResult<u64> {
        let transport = self.transport.as_mut().ok_or(SdrError::Closed)?;
        transport
            .timestamp(direction)
            .map_err(|source| SdrError::Transport { direction, source })
    }

    fn channel_mut(&mut self, direction: StreamDirection) -> &mut ChannelState {
        match direction {
            StreamDirection::Rx => &mut self.rx,
            StreamDirection::Tx => &mut self.tx,
        }
    }

    /// Configure and enable one direction if it is not enabled yet.
    fn init_module(&mut self, direction: StreamDirection) -> SdrResult<()> {
        if direction == StreamDirection::Tx {
            return Err(SdrError::Unsupported(
                "enabling TX through the device front".to_string(),
            ));
        }
        if self.channel_mut(direction).enabled {
            return Ok(());
        }

        let params = SyncParams::from_config(&self.config)?;
        let transport = self.transport.as_mut().ok_or(SdrError::Closed)?;

        transport
            .sync_config(direction, NativeFormat::Sc16Q11, &params)
            .map_err(|source| {
                error!("Failed to configure {} sync interface: {}", direction, source);
                SdrError::Configuration {
                    context: format!("{} sync interface", direction),
                    source,
                }
            })?;

        transport.enable(direction, true).map_err(|source| {
            error!("Failed to enable {} module: {}", direction, source);
            SdrError::Configuration {
                context: format!("enable {}", direction),
                source,
            }
        })?;

        self.channel_mut(direction).enabled = true;
        debug!("Enabled {} module", direction);
        Ok(())
    }
}

impl DeviceBackend for BladeRfDevice {
    fn rx(&mut self, samples: &mut [IQSample]) -> SdrResult<u64> {
        self.init_module(StreamDirection::Rx)?;

        let buf_len = self.rx.buf_len();
        if buf_len == 0 {
            return Err(SdrError::Allocation("RX buffer not allocated".to_string()));
        }
        let transport = self.transport.as_mut().ok_or(SdrError::Closed)?;

        let count = samples.len();
        let mut meta = Metadata::rx_now();
        let mut first_timestamp = None;
        let mut total = 0;

        while total < count {
            let to_read = buf_len.min(count - total);
            let native = &mut self.rx.buf[..NATIVE_VALUES_PER_SAMPLE * to_read];

            transport
                .sync_rx(native, to_read, &mut meta, self.timeout_ms)
                .map_err(|source| {
                    error!("RX failure: {}", source);
                    SdrError::from_sync(StreamDirection::Rx, source)
                })?;

            if meta.status != 0 {
                if meta.overrun() {
                    warn!("Overrun detected in RX. Timestamp = {}", meta.timestamp);
                    self.overruns += 1;
                } else {
                    warn!("Unknown metadata status: {:#010x}", meta.status);
                }
            }

            let moved = (meta.actual_count as usize).min(to_read);
            if moved == 0 {
                error!("RX returned no samples");
                return Err(SdrError::Transport {
                    direction: StreamDirection::Rx,
                    source: TransportError {
                        status: status::UNEXPECTED,
                        message: "sync RX moved no samples".to_string(),
                    },
                });
            }

            first_timestamp.get_or_insert(meta.timestamp);
            sc16q11_to_complexf(
                &native[..NATIVE_VALUES_PER_SAMPLE * moved],
                &mut samples[total..total + moved],
            );
            total += moved;
        }

        Ok(first_timestamp.unwrap_or(0))
    }

    fn tx(&mut self, _timestamp: u64, _samples: &[IQSample]) -> SdrResult<()> {
        Err(SdrError::Unsupported(
            "direct TX on bladeRF; use BurstTransmitter".to_string(),
        ))
    }

    fn deinit(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            for direction in [StreamDirection::Rx, StreamDirection::Tx] {
                if self.channel_mut(direction).enabled {
                    if let Err(e) = transport.enable(direction, false) {
                        warn!("Failed to disable {} module: {}", direction, e);
                    }
                }
            }
            info!("Closing {} transport", transport.name());
        }
        self.rx.release();
        self.tx.release();
    }
}

impl Drop for BladeRfDevice {
    fn drop(&mut self) {
        self.deinit();
    }
}
