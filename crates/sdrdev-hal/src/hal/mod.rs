//! # Hardware Abstraction Layer (HAL)
//!
//! Backends behind the [`Device`](crate::device::Device) front, and the seam
//! to the radio collaborator:
//!
//! - **SyncTransport**: the narrow sync-streaming contract a radio must offer
//! - **Metadata**: per-call timestamp/flags/status record
//! - **FileDevice**: replay/record of a raw SC16Q11 container
//! - **BladeRfDevice**: chunked rx over a `SyncTransport`
//! - **BurstTransmitter**: timestamp-scheduled TX bursts, used directly
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Application (IQSample buffers)               │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   Device (rx / tx / deinit)  │  BurstTransmitter (direct)   │
//! ├───────────────┬──────────────┴──────────────────────────────┤
//! │  FileDevice   │  BladeRfDevice                              │
//! ├───────────────┼─────────────────────────────────────────────┤
//! │  std::fs      │  SyncTransport: libbladeRF | Loopback       │
//! └───────────────┴─────────────────────────────────────────────┘
//! ```

pub mod bladerf;
#[cfg(feature = "bladerf")]
pub mod bladerf_ffi;
pub mod burst;
pub mod file;
pub mod loopback;
pub mod meta;
pub mod transport;

pub use bladerf::{open_transport, BladeRfDevice, ChannelState};
pub use burst::{wait_for_timestamp, BurstConfig, BurstTransmitter, ToneGenerator, POLL_INTERVAL};
pub use file::{FileDevice, BUF_LEN_SAMPLES};
pub use loopback::{BurstRecord, LoopbackConfig, LoopbackHandle, LoopbackTransport};
pub use meta::Metadata;
pub use transport::{status, SyncParams, SyncTransport, TransportError, TransportResult};

/// Stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Receive stream
    Rx,
    /// Transmit stream
    Tx,
}

impl StreamDirection {
    /// Module/channel index used by the libbladeRF C API.
    pub const fn code(&self) -> i32 {
        match self {
            StreamDirection::Rx => 0,
            StreamDirection::Tx => 1,
        }
    }

    /// Index into per-direction arrays.
    pub(crate) const fn index(&self) -> usize {
        self.code() as usize
    }
}

impl std::fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamDirection::Rx => write!(f, "RX"),
            StreamDirection::Tx => write!(f, "TX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_codes() {
        assert_eq!(StreamDirection::Rx.code(), 0);
        assert_eq!(StreamDirection::Tx.code(), 1);
        assert_eq!(StreamDirection::Tx.index(), 1);
        assert_eq!(format!("{}", StreamDirection::Rx), "RX");
    }
}
