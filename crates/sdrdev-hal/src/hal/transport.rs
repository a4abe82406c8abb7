//! Sync streaming contract consumed from the radio collaborator.
//!
//! The radio's USB/FPGA transport and its worker threads live behind this
//! trait. Everything above it is single-threaded and blocking: each call
//! either completes, times out, or fails within the call.
//!
//! Closing the device is `Drop`.

use sdrdev_core::{BoardConfig, NativeFormat, StreamConfig};

use super::meta::Metadata;
use super::StreamDirection;
use crate::device::{SdrError, SdrResult};

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Nonzero status returned by the transport, with its text description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (status {status})")]
pub struct TransportError {
    pub status: i32,
    pub message: String,
}

impl TransportError {
    /// Build an error from a status code using the built-in text table.
    pub fn from_status(status: i32) -> Self {
        Self {
            status,
            message: status::describe(status).to_string(),
        }
    }
}

/// Status codes shared with libbladeRF (`BLADERF_ERR_*`).
pub mod status {
    pub const UNEXPECTED: i32 = -1;
    pub const RANGE: i32 = -2;
    pub const INVAL: i32 = -3;
    pub const MEM: i32 = -4;
    pub const IO: i32 = -5;
    pub const TIMEOUT: i32 = -6;
    pub const NODEV: i32 = -7;
    pub const UNSUPPORTED: i32 = -8;
    pub const MISALIGNED: i32 = -9;
    pub const CHECKSUM: i32 = -10;
    pub const NO_FILE: i32 = -11;
    pub const UPDATE_FPGA: i32 = -12;
    pub const UPDATE_FW: i32 = -13;
    pub const TIME_PAST: i32 = -14;
    pub const QUEUE_FULL: i32 = -15;
    pub const FPGA_OP: i32 = -16;
    pub const PERMISSION: i32 = -17;
    pub const WOULD_BLOCK: i32 = -18;
    pub const NOT_INIT: i32 = -19;

    /// Text for a status code, matching `bladerf_strerror`.
    pub fn describe(status: i32) -> &'static str {
        match status {
            0 => "Success",
            UNEXPECTED => "An unexpected error occurred",
            RANGE => "Provided parameter was out of the allowable range",
            INVAL => "Invalid operation or parameter",
            MEM => "A memory allocation error occurred",
            IO => "File or device I/O failure",
            TIMEOUT => "Operation timed out",
            NODEV => "No devices available",
            UNSUPPORTED => "Operation not supported",
            MISALIGNED => "Misaligned flash access",
            CHECKSUM => "Invalid checksum",
            NO_FILE => "File not found",
            UPDATE_FPGA => "An FPGA update is required",
            UPDATE_FW => "A firmware update is required",
            TIME_PAST => "Requested timestamp is in the past",
            QUEUE_FULL => "Could not enqueue data into full queue",
            FPGA_OP => "An FPGA operation reported a failure",
            PERMISSION => "Insufficient permissions for the requested operation",
            WOULD_BLOCK => "The operation would block, but has been requested to be non-blocking",
            NOT_INIT => "Insufficient initialization for the requested operation",
            _ => "Unknown error code",
        }
    }
}

/// Buffering parameters for `sync_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncParams {
    pub num_buffers: u32,
    /// Samples per buffer; must be a multiple of the transfer granularity
    pub buffer_size: u32,
    pub num_transfers: u32,
    pub stream_timeout_ms: u32,
}

impl SyncParams {
    /// Take the buffering fields from a stream configuration.
    ///
    /// Fails if `samples_per_buffer` does not fit the transport's 32-bit field.
    pub fn from_config(config: &StreamConfig) -> SdrResult<Self> {
        let buffer_size = u32::try_from(config.samples_per_buffer).map_err(|_| {
            SdrError::InvalidArgument(format!(
                "samples_per_buffer {} exceeds {}",
                config.samples_per_buffer,
                u32::MAX
            ))
        })?;
        Ok(Self {
            num_buffers: config.num_buffers,
            buffer_size,
            num_transfers: config.num_transfers,
            stream_timeout_ms: config.stream_timeout_ms,
        })
    }
}

/// Synchronous streaming interface of a radio.
///
/// Sample buffers are interleaved SC16Q11; `count` is in samples, so a call
/// touches `2 * count` values of the buffer.
pub trait SyncTransport: Send {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Apply board settings (frequency, rate, bandwidth, gain).
    fn apply_board_config(&mut self, board: &BoardConfig) -> TransportResult<()>;

    /// Configure the sync interface of one direction.
    fn sync_config(
        &mut self,
        direction: StreamDirection,
        format: NativeFormat,
        params: &SyncParams,
    ) -> TransportResult<()>;

    /// Enable or disable one direction. Must follow `sync_config`.
    fn enable(&mut self, direction: StreamDirection, enable: bool) -> TransportResult<()>;

    /// Receive `count` samples. `meta.actual_count` reports what was moved.
    fn sync_rx(
        &mut self,
        native: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        timeout_ms: u32,
    ) -> TransportResult<()>;

    /// Transmit `count` samples framed by `meta.flags`.
    fn sync_tx(
        &mut self,
        native: &[i16],
        count: usize,
        meta: &mut Metadata,
        timeout_ms: u32,
    ) -> TransportResult<()>;

    /// Current sample-clock timestamp of one direction.
    fn timestamp(&mut self, direction: StreamDirection) -> TransportResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(status::describe(0), "Success");
        assert_eq!(status::describe(status::TIMEOUT), "Operation timed out");
        assert_eq!(status::describe(-1000), "Unknown error code");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::from_status(status::INVAL);
        assert_eq!(err.to_string(), "Invalid operation or parameter (status -3)");
    }

    #[test]
    fn test_sync_params_from_config() {
        let config = StreamConfig::default();
        let params = SyncParams::from_config(&config).unwrap();
        assert_eq!(params.num_buffers, 64);
        assert_eq!(params.buffer_size, 8192);
        assert_eq!(params.num_transfers, 16);
        assert_eq!(params.stream_timeout_ms, 5000);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_sync_params_rejects_oversized_buffer() {
        let config = StreamConfig {
            samples_per_buffer: u32::MAX as usize + 1,
            ..Default::default()
        };
        assert!(matches!(
            SyncParams::from_config(&config),
            Err(SdrError::InvalidArgument(_))
        ));
    }
}
