//! # libbladeRF FFI Bindings
//!
//! Sync-interface subset of libbladeRF 2.x, loaded at runtime with
//! libloading so the same binary runs with or without the library
//! installed. [`LibBladeRf`] adapts it to [`SyncTransport`].
//!
//! Only channel 0 of each direction is used.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::ptr;
use std::sync::OnceLock;

use libloading::Library;
use sdrdev_core::{BoardConfig, NativeFormat};

use super::meta::Metadata;
use super::transport::{status, SyncParams, SyncTransport, TransportError, TransportResult};
use super::StreamDirection;
use crate::device::{SdrError, SdrResult};

/// Opaque `struct bladerf *`.
pub type BladeRfHandle = *mut c_void;

/// `BLADERF_RX_X1` / `BLADERF_TX_X1` channel layouts.
const LAYOUT_RX_X1: c_int = 0;
const LAYOUT_TX_X1: c_int = 1;

/// `BLADERF_CHANNEL_RX(0)` / `BLADERF_CHANNEL_TX(0)`.
const CHANNEL_RX0: c_int = 0;
const CHANNEL_TX0: c_int = 1;

/// `struct bladerf_metadata`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct RawMetadata {
    timestamp: u64,
    flags: u32,
    status: u32,
    actual_count: c_uint,
    reserved: [u8; 32],
}

impl From<&Metadata> for RawMetadata {
    fn from(meta: &Metadata) -> Self {
        Self {
            timestamp: meta.timestamp,
            flags: meta.flags,
            status: meta.status,
            actual_count: meta.actual_count,
            reserved: [0; 32],
        }
    }
}

impl RawMetadata {
    fn store(&self, meta: &mut Metadata) {
        meta.timestamp = self.timestamp;
        meta.status = self.status;
        meta.actual_count = self.actual_count;
    }
}

type OpenFn = unsafe extern "C" fn(*mut BladeRfHandle, *const c_char) -> c_int;
type CloseFn = unsafe extern "C" fn(BladeRfHandle);
type SyncConfigFn =
    unsafe extern "C" fn(BladeRfHandle, c_int, c_int, c_uint, c_uint, c_uint, c_uint) -> c_int;
type EnableModuleFn = unsafe extern "C" fn(BladeRfHandle, c_int, bool) -> c_int;
type SyncRxFn =
    unsafe extern "C" fn(BladeRfHandle, *mut c_void, c_uint, *mut RawMetadata, c_uint) -> c_int;
type SyncTxFn =
    unsafe extern "C" fn(BladeRfHandle, *const c_void, c_uint, *mut RawMetadata, c_uint) -> c_int;
type GetTimestampFn = unsafe extern "C" fn(BladeRfHandle, c_int, *mut u64) -> c_int;
type StrErrorFn = unsafe extern "C" fn(c_int) -> *const c_char;
type SetFrequencyFn = unsafe extern "C" fn(BladeRfHandle, c_int, u64) -> c_int;
type SetRateFn = unsafe extern "C" fn(BladeRfHandle, c_int, u32, *mut u32) -> c_int;
type SetGainFn = unsafe extern "C" fn(BladeRfHandle, c_int, c_int) -> c_int;

struct Symbols {
    open: OpenFn,
    close: CloseFn,
    sync_config: SyncConfigFn,
    enable_module: EnableModuleFn,
    sync_rx: SyncRxFn,
    sync_tx: SyncTxFn,
    get_timestamp: GetTimestampFn,
    strerror: StrErrorFn,
    set_frequency: SetFrequencyFn,
    set_sample_rate: SetRateFn,
    set_bandwidth: SetRateFn,
    set_gain: SetGainFn,
}

/// Loaded libbladeRF. Function pointers stay valid while `_lib` lives.
struct BladeRfLib {
    sym: Symbols,
    _lib: Library,
}

static BLADERF_LIB: OnceLock<Option<BladeRfLib>> = OnceLock::new();

#[cfg(target_os = "linux")]
const LIB_NAMES: &[&str] = &["libbladeRF.so.2", "libbladeRF.so"];

#[cfg(target_os = "macos")]
const LIB_NAMES: &[&str] = &["libbladeRF.dylib", "libbladeRF.2.dylib"];

#[cfg(target_os = "windows")]
const LIB_NAMES: &[&str] = &["bladeRF.dll"];

unsafe fn load_symbols(lib: &Library) -> Result<Symbols, libloading::Error> {
    Ok(Symbols {
        open: *lib.get::<OpenFn>(b"bladerf_open\0")?,
        close: *lib.get::<CloseFn>(b"bladerf_close\0")?,
        sync_config: *lib.get::<SyncConfigFn>(b"bladerf_sync_config\0")?,
        enable_module: *lib.get::<EnableModuleFn>(b"bladerf_enable_module\0")?,
        sync_rx: *lib.get::<SyncRxFn>(b"bladerf_sync_rx\0")?,
        sync_tx: *lib.get::<SyncTxFn>(b"bladerf_sync_tx\0")?,
        get_timestamp: *lib.get::<GetTimestampFn>(b"bladerf_get_timestamp\0")?,
        strerror: *lib.get::<StrErrorFn>(b"bladerf_strerror\0")?,
        set_frequency: *lib.get::<SetFrequencyFn>(b"bladerf_set_frequency\0")?,
        set_sample_rate: *lib.get::<SetRateFn>(b"bladerf_set_sample_rate\0")?,
        set_bandwidth: *lib.get::<SetRateFn>(b"bladerf_set_bandwidth\0")?,
        set_gain: *lib.get::<SetGainFn>(b"bladerf_set_gain\0")?,
    })
}

fn load_library() -> Option<BladeRfLib> {
    for name in LIB_NAMES {
        let Ok(lib) = (unsafe { Library::new(name) }) else {
            continue;
        };
        match unsafe { load_symbols(&lib) } {
            Ok(sym) => {
                tracing::info!("Loaded bladeRF library: {}", name);
                return Some(BladeRfLib { sym, _lib: lib });
            }
            Err(e) => tracing::debug!("{} is missing symbols: {}", name, e),
        }
    }
    tracing::debug!("bladeRF library not found");
    None
}

fn get_lib() -> Option<&'static BladeRfLib> {
    BLADERF_LIB.get_or_init(load_library).as_ref()
}

/// Check if libbladeRF is available.
pub fn is_available() -> bool {
    get_lib().is_some()
}

/// Library text for a status code, falling back to the built-in table.
pub fn strerror(code: c_int) -> String {
    get_lib()
        .map(|lib| {
            let ptr = unsafe { (lib.sym.strerror)(code) };
            if ptr.is_null() {
                status::describe(code).to_string()
            } else {
                unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
            }
        })
        .unwrap_or_else(|| status::describe(code).to_string())
}

fn check(code: c_int) -> TransportResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(TransportError {
            status: code,
            message: strerror(code),
        })
    }
}

fn channel(direction: StreamDirection) -> c_int {
    match direction {
        StreamDirection::Rx => CHANNEL_RX0,
        StreamDirection::Tx => CHANNEL_TX0,
    }
}

/// An open bladeRF.
pub struct LibBladeRf {
    lib: &'static BladeRfLib,
    handle: BladeRfHandle,
    label: String,
}

// The handle is only used through &mut self.
unsafe impl Send for LibBladeRf {}

impl LibBladeRf {
    /// Open a device by identifier string, or the first one found.
    pub fn open(specifier: Option<&str>) -> SdrResult<Self> {
        let lib = get_lib().ok_or_else(|| {
            SdrError::Open("libbladeRF not found - install the bladeRF package".to_string())
        })?;

        let ident = specifier
            .map(CString::new)
            .transpose()
            .map_err(|_| SdrError::InvalidArgument("device specifier contains NUL".to_string()))?;
        let ident_ptr = ident.as_ref().map_or(ptr::null(), |s| s.as_ptr());

        let mut handle: BladeRfHandle = ptr::null_mut();
        let code = unsafe { (lib.sym.open)(&mut handle, ident_ptr) };
        if code != 0 || handle.is_null() {
            return Err(SdrError::Open(format!(
                "Unable to open device: {}",
                strerror(code)
            )));
        }

        Ok(Self {
            lib,
            handle,
            label: format!("bladeRF({})", specifier.unwrap_or("*")),
        })
    }
}

impl SyncTransport for LibBladeRf {
    fn name(&self) -> &str {
        &self.label
    }

    fn apply_board_config(&mut self, board: &BoardConfig) -> TransportResult<()> {
        for direction in [StreamDirection::Rx, StreamDirection::Tx] {
            let ch = channel(direction);
            if let Some(freq) = board.frequency_hz {
                check(unsafe { (self.lib.sym.set_frequency)(self.handle, ch, freq) })?;
            }
            if let Some(rate) = board.sample_rate {
                let mut actual = 0u32;
                let set_rate = self.lib.sym.set_sample_rate;
                check(unsafe { set_rate(self.handle, ch, rate, &mut actual) })?;
                if actual != rate {
                    tracing::debug!("{} sample rate {} set to {}", direction, rate, actual);
                }
            }
            if let Some(bw) = board.bandwidth_hz {
                let mut actual = 0u32;
                check(unsafe { (self.lib.sym.set_bandwidth)(self.handle, ch, bw, &mut actual) })?;
            }
            let gain = match direction {
                StreamDirection::Rx => board.rx_gain_db,
                StreamDirection::Tx => board.tx_gain_db,
            };
            if let Some(gain) = gain {
                check(unsafe { (self.lib.sym.set_gain)(self.handle, ch, gain) })?;
            }
        }
        Ok(())
    }

    fn sync_config(
        &mut self,
        direction: StreamDirection,
        format: NativeFormat,
        params: &SyncParams,
    ) -> TransportResult<()> {
        let layout = match direction {
            StreamDirection::Rx => LAYOUT_RX_X1,
            StreamDirection::Tx => LAYOUT_TX_X1,
        };
        check(unsafe {
            (self.lib.sym.sync_config)(
                self.handle,
                layout,
                format.code(),
                params.num_buffers,
                params.buffer_size,
                params.num_transfers,
                params.stream_timeout_ms,
            )
        })
    }

    fn enable(&mut self, direction: StreamDirection, enable: bool) -> TransportResult<()> {
        check(unsafe { (self.lib.sym.enable_module)(self.handle, channel(direction), enable) })
    }

    fn sync_rx(
        &mut self,
        native: &mut [i16],
        count: usize,
        meta: &mut Metadata,
        timeout_ms: u32,
    ) -> TransportResult<()> {
        if native.len() < 2 * count {
            return Err(TransportError::from_status(status::INVAL));
        }
        let mut raw = RawMetadata::from(&*meta);
        check(unsafe {
            (self.lib.sym.sync_rx)(
                self.handle,
                native.as_mut_ptr().cast(),
                count as c_uint,
                &mut raw,
                timeout_ms,
            )
        })?;
        raw.store(meta);
        Ok(())
    }

    fn sync_tx(
        &mut self,
        native: &[i16],
        count: usize,
        meta: &mut Metadata,
        timeout_ms: u32,
    ) -> TransportResult<()> {
        if native.len() < 2 * count {
            return Err(TransportError::from_status(status::INVAL));
        }
        let mut raw = RawMetadata::from(&*meta);
        check(unsafe {
            (self.lib.sym.sync_tx)(
                self.handle,
                native.as_ptr().cast(),
                count as c_uint,
                &mut raw,
                timeout_ms,
            )
        })?;
        raw.store(meta);
        Ok(())
    }

    fn timestamp(&mut self, direction: StreamDirection) -> TransportResult<u64> {
        let mut ts = 0u64;
        check(unsafe { (self.lib.sym.get_timestamp)(self.handle, direction.code(), &mut ts) })?;
        Ok(ts)
    }
}

impl Drop for LibBladeRf {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.lib.sym.close)(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_layout() {
        assert_eq!(std::mem::size_of::<RawMetadata>(), 8 + 4 + 4 + 4 + 32 + 4);
    }

    #[test]
    fn test_metadata_conversion() {
        let meta = Metadata::burst_at(99);
        let mut raw = RawMetadata::from(&meta);
        raw.status = 1;
        raw.actual_count = 10;
        let mut back = meta;
        raw.store(&mut back);
        assert_eq!(back.timestamp, 99);
        assert_eq!(back.flags, meta.flags);
        assert!(back.overrun());
        assert_eq!(back.actual_count, 10);
    }

    #[test]
    fn test_strerror_fallback() {
        assert!(!strerror(status::TIMEOUT).is_empty());
    }

    #[test]
    fn test_library_availability() {
        if is_available() {
            println!("libbladeRF is available");
        } else {
            println!("libbladeRF not available (expected on most dev machines)");
            assert!(matches!(LibBladeRf::open(None), Err(SdrError::Open(_))));
        }
    }
}
