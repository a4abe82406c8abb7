//! Per-call sync stream metadata.
//!
//! A caller owns one `Metadata` per logical burst (TX) or per call (RX) and
//! passes it to every chunk call, so the timestamp and flags carry across
//! calls within one burst.

/// First sample of a TX burst
pub const FLAG_TX_BURST_START: u32 = 1 << 0;
/// Last sample of a TX burst; the radio pads and drains after it
pub const FLAG_TX_BURST_END: u32 = 1 << 1;
/// Transmit as soon as possible, ignoring `timestamp`
pub const FLAG_TX_NOW: u32 = 1 << 2;
/// Receive from the current stream position, ignoring `timestamp`
pub const FLAG_RX_NOW: u32 = 1 << 31;

/// Samples were dropped because software could not keep up
pub const STATUS_OVERRUN: u32 = 1 << 0;

/// Timestamp, flags and status accompanying one sync call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Sample-clock timestamp of the first sample
    pub timestamp: u64,
    /// `FLAG_*` bits chosen by the caller
    pub flags: u32,
    /// `STATUS_*` bits reported by the transport after the call
    pub status: u32,
    /// Samples actually moved by the call; may be fewer than requested
    pub actual_count: u32,
}

impl Metadata {
    /// Metadata for an unscheduled receive.
    pub fn rx_now() -> Self {
        Self {
            flags: FLAG_RX_NOW,
            ..Default::default()
        }
    }

    /// Single-call burst sent immediately.
    pub fn burst_now() -> Self {
        Self {
            flags: FLAG_TX_BURST_START | FLAG_TX_NOW | FLAG_TX_BURST_END,
            ..Default::default()
        }
    }

    /// Single-call burst scheduled at `timestamp`.
    pub fn burst_at(timestamp: u64) -> Self {
        Self {
            timestamp,
            flags: FLAG_TX_BURST_START | FLAG_TX_BURST_END,
            ..Default::default()
        }
    }

    /// Check a flag bit.
    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Whether the transport reported an overrun.
    pub fn overrun(&self) -> bool {
        self.status & STATUS_OVERRUN != 0
    }
}
