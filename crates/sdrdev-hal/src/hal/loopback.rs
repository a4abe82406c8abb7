//! In-process sync transport.
//!
//! Behaves like a radio with a free-running sample clock: RX returns PRNG
//! samples, TX records every burst. A [`LoopbackHandle`] shares the state
//! so a test (or the CLI dry-run) can inspect what the device layer did.
//!
//! Faults can be injected through [`LoopbackConfig`] to exercise error paths.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use sdrdev_core::{BoardConfig, NativeFormat, RandState, TRANSFER_GRANULARITY};

use super::meta::{Metadata, FLAG_TX_NOW, STATUS_OVERRUN};
use super::transport::{status, SyncParams, SyncTransport, TransportError, TransportResult};
use super::StreamDirection;

/// Behaviour of a [`LoopbackTransport`].
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Clock rate in samples per second. Zero freezes the clock.
    pub sample_rate: f64,
    /// Clock value at construction
    pub start_timestamp: u64,
    /// PRNG seed for received samples
    pub seed: u64,
    /// Cap on samples moved per `sync_rx` call
    pub max_rx_chunk: Option<usize>,
    /// Zero-based `sync_rx` call that reports an overrun
    pub overrun_on_call: Option<usize>,
    /// Fail `sync_rx` after this many successful calls
    pub fail_rx_after: Option<usize>,
    /// Fail `sync_tx` after this many successful calls
    pub fail_tx_after: Option<usize>,
    /// Time out `sync_rx` after this many successful calls
    pub timeout_rx_after: Option<usize>,
    /// Time out `sync_tx` after this many successful calls
    pub timeout_tx_after: Option<usize>,
    /// Reject `apply_board_config`
    pub fail_board_config: bool,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 0.0,
            start_timestamp: 0,
            seed: 1,
            max_rx_chunk: None,
            overrun_on_call: None,
            fail_rx_after: None,
            fail_tx_after: None,
            timeout_rx_after: None,
            timeout_tx_after: None,
            fail_board_config: false,
        }
    }
}

impl LoopbackConfig {
    /// Free-running clock at `sample_rate`.
    pub fn running(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }
}

/// One recorded `sync_tx` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstRecord {
    /// Scheduled timestamp, or the clock at submission for `TX_NOW`
    pub timestamp: u64,
    pub flags: u32,
    pub count: usize,
    /// First (I, Q) pair of the burst
    pub first: (i16, i16),
}

#[derive(Debug)]
struct LoopbackState {
    config: LoopbackConfig,
    epoch: Instant,
    clock_offset: u64,
    rng: RandState,
    rx_position: u64,
    formats: [Option<NativeFormat>; 2],
    enabled: [bool; 2],
    enable_calls: Vec<(StreamDirection, bool)>,
    board: Option<BoardConfig>,
    rx_chunks: Vec<usize>,
    bursts: Vec<BurstRecord>,
    closed: bool,
}

impl LoopbackState {
    fn now(&self) -> u64 {
        let running = if self.config.sample_rate > 0.0 {
            (self.epoch.elapsed().as_secs_f64() * self.config.sample_rate) as u64
        } else {
            0
        };
        self.config.start_timestamp + self.clock_offset + running
    }
}

fn lock(state: &Mutex<LoopbackState>) -> MutexGuard<'_, LoopbackState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`SyncTransport`] with no hardware behind it.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    pub fn new(config: LoopbackConfig) -> Self {
        let rng = RandState::new(config.seed);
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                config,
                epoch: Instant::now(),
                clock_offset: 0,
                rng,
                rx_position: 0,
                formats: [None, None],
                enabled: [false, false],
                enable_calls: Vec::new(),
                board: None,
                rx_chunks: Vec::new(),
                bursts: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Inspection handle sharing this transport's state.
    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SyncTransport for LoopbackTransport {
    fn name(&self) -> &str {
        "loopback"
    }

    fn apply_board_config(&mut self, board: &BoardConfig) -> TransportResult<()> {
        let mut state = lock(&self.state);
        if state.config.fail_board_config {
            return Err(TransportError::from_status(status::RANGE));
        }
        state.board = Some(board.clone());
        Ok(())
    }

    fn sync_config(
        &mut self,
        direction: StreamDirection,
        format: NativeFormat,
        params: &SyncParams,
    ) -> TransportResult<()> {
        let size = params.buffer_size as usize;
        let aligned = size != 0 && size % TRANSFER_GRANULARITY == 0;
        if !aligned || params.num_transfers >= params.num_buffers {
            return Err(TransportError::from_status(status::INVAL));
        }
        lock(&self.state).formats[direction.index()] = Some(format);
        Ok(())
    }

    fn enable(&mut self, direction: StreamDirection, enable: bool) -> TransportResult<()> {
        let mut state = lock(&self.state);
        if state.formats[direction.index()].is_none() {
            return Err(TransportError::from_status(status::NOT_INIT));
        }
        state.enabled[direction.index()] = enable;
        state.enable_calls.push((direction, enable));
        Ok(())
    }

    fn sync_rx(
        &mut self,
        native: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        _timeout_ms: u32,
    ) -> TransportResult<()> {
        let mut state = lock(&self.state);
        if !state.enabled[StreamDirection::Rx.index()] {
            return Err(TransportError::from_status(status::NOT_INIT));
        }
        if native.len() < 2 * count {
            return Err(TransportError::from_status(status::INVAL));
        }
        let call = state.rx_chunks.len();
        if state.config.fail_rx_after.is_some_and(|limit| call >= limit) {
            return Err(TransportError::from_status(status::IO));
        }
        if state.config.timeout_rx_after.is_some_and(|limit| call >= limit) {
            return Err(TransportError::from_status(status::TIMEOUT));
        }

        let moved = state.config.max_rx_chunk.map_or(count, |cap| count.min(cap));
        state.rng.fill_native(&mut native[..2 * moved]);

        meta.timestamp = state.rx_position;
        meta.actual_count = moved as u32;
        meta.status = if state.config.overrun_on_call == Some(call) {
            STATUS_OVERRUN
        } else {
            0
        };

        state.rx_position += moved as u64;
        state.rx_chunks.push(moved);
        Ok(())
    }

    fn sync_tx(
        &mut self,
        native: &[i16],
        count: usize,
        meta: &mut Metadata,
        _timeout_ms: u32,
    ) -> TransportResult<()> {
        let mut state = lock(&self.state);
        if !state.enabled[StreamDirection::Tx.index()] {
            return Err(TransportError::from_status(status::NOT_INIT));
        }
        if native.len() < 2 * count {
            return Err(TransportError::from_status(status::INVAL));
        }
        if state
            .config
            .fail_tx_after
            .is_some_and(|limit| state.bursts.len() >= limit)
        {
            return Err(TransportError::from_status(status::IO));
        }
        let sent = state.bursts.len();
        if state.config.timeout_tx_after.is_some_and(|limit| sent >= limit) {
            return Err(TransportError::from_status(status::TIMEOUT));
        }

        let timestamp = if meta.has_flag(FLAG_TX_NOW) {
            state.now()
        } else {
            meta.timestamp
        };
        let first = match native {
            [i, q, ..] => (*i, *q),
            _ => (0, 0),
        };
        state.bursts.push(BurstRecord {
            timestamp,
            flags: meta.flags,
            count,
            first,
        });
        meta.actual_count = count as u32;
        meta.status = 0;
        Ok(())
    }

    fn timestamp(&mut self, _direction: StreamDirection) -> TransportResult<u64> {
        Ok(lock(&self.state).now())
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.enabled = [false, false];
        state.closed = true;
    }
}

/// Shared view of a [`LoopbackTransport`]'s state.
#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHandle {
    /// Move the clock forward by `samples`.
    pub fn advance_clock(&self, samples: u64) {
        lock(&self.state).clock_offset += samples;
    }

    pub fn now(&self) -> u64 {
        lock(&self.state).now()
    }

    pub fn is_enabled(&self, direction: StreamDirection) -> bool {
        lock(&self.state).enabled[direction.index()]
    }

    pub fn format(&self, direction: StreamDirection) -> Option<NativeFormat> {
        lock(&self.state).formats[direction.index()]
    }

    /// Every `enable` call in order.
    pub fn enable_calls(&self) -> Vec<(StreamDirection, bool)> {
        lock(&self.state).enable_calls.clone()
    }

    /// Board settings last applied, if any.
    pub fn board(&self) -> Option<BoardConfig> {
        lock(&self.state).board.clone()
    }

    /// Samples moved by each `sync_rx` call.
    pub fn rx_chunks(&self) -> Vec<usize> {
        lock(&self.state).rx_chunks.clone()
    }

    pub fn bursts(&self) -> Vec<BurstRecord> {
        lock(&self.state).bursts.clone()
    }

    /// Whether the transport has been dropped.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(buffer_size: u32) -> SyncParams {
        SyncParams {
            num_buffers: 16,
            buffer_size,
            num_transfers: 8,
            stream_timeout_ms: 1000,
        }
    }

    #[test]
    fn test_sync_config_requires_granularity() {
        let mut t = LoopbackTransport::new(LoopbackConfig::default());
        let err = t
            .sync_config(StreamDirection::Rx, NativeFormat::Sc16Q11, &params(1000))
            .unwrap_err();
        assert_eq!(err.status, status::INVAL);
        t.sync_config(StreamDirection::Rx, NativeFormat::Sc16Q11, &params(2048))
            .unwrap();
        assert_eq!(t.handle().format(StreamDirection::Rx), Some(NativeFormat::Sc16Q11));
    }

    #[test]
    fn test_enable_before_config_fails() {
        let mut t = LoopbackTransport::new(LoopbackConfig::default());
        let err = t.enable(StreamDirection::Tx, true).unwrap_err();
        assert_eq!(err.status, status::NOT_INIT);
    }

    #[test]
    fn test_rx_requires_enable() {
        let mut t = LoopbackTransport::new(LoopbackConfig::default());
        let mut buf = vec![0i16; 8];
        let mut meta = Metadata::rx_now();
        let err = t.sync_rx(&mut buf, 4, &mut meta, 100).unwrap_err();
        assert_eq!(err.status, status::NOT_INIT);
    }

    #[test]
    fn test_rx_advances_position() {
        let config = LoopbackConfig {
            max_rx_chunk: Some(3),
            ..Default::default()
        };
        let mut t = LoopbackTransport::new(config);
        t.sync_config(StreamDirection::Rx, NativeFormat::Sc16Q11, &params(1024))
            .unwrap();
        t.enable(StreamDirection::Rx, true).unwrap();

        let mut buf = vec![0i16; 16];
        let mut meta = Metadata::rx_now();
        t.sync_rx(&mut buf, 8, &mut meta, 100).unwrap();
        assert_eq!(meta.timestamp, 0);
        assert_eq!(meta.actual_count, 3);
        t.sync_rx(&mut buf, 8, &mut meta, 100).unwrap();
        assert_eq!(meta.timestamp, 3);
        assert_eq!(t.handle().rx_chunks(), vec![3, 3]);
    }

    #[test]
    fn test_frozen_clock_advances_manually() {
        let mut t = LoopbackTransport::new(LoopbackConfig {
            start_timestamp: 100,
            ..Default::default()
        });
        let handle = t.handle();
        assert_eq!(t.timestamp(StreamDirection::Tx).unwrap(), 100);
        handle.advance_clock(50);
        assert_eq!(t.timestamp(StreamDirection::Tx).unwrap(), 150);
    }

    #[test]
    fn test_tx_records_bursts() {
        let mut t = LoopbackTransport::new(LoopbackConfig {
            start_timestamp: 7,
            ..Default::default()
        });
        t.sync_config(StreamDirection::Tx, NativeFormat::Sc16Q11Meta, &params(2048))
            .unwrap();
        t.enable(StreamDirection::Tx, true).unwrap();

        let buf = [2000i16, 2000, 2000, 2000];
        let mut now = Metadata::burst_now();
        t.sync_tx(&buf, 2, &mut now, 100).unwrap();
        let mut sched = Metadata::burst_at(500);
        t.sync_tx(&buf, 2, &mut sched, 100).unwrap();

        let bursts = t.handle().bursts();
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[0].timestamp, 7);
        assert_eq!(bursts[1].timestamp, 500);
        assert_eq!(bursts[1].first, (2000, 2000));
    }

    #[test]
    fn test_drop_marks_closed() {
        let t = LoopbackTransport::new(LoopbackConfig::default());
        let handle = t.handle();
        assert!(!handle.is_closed());
        drop(t);
        assert!(handle.is_closed());
    }
}
