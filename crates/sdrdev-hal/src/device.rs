//! SDR Device Abstraction
//!
//! One `rx` / `tx` / `deinit` contract in [`IQSample`]s over a closed set of
//! backends. The backend is chosen once at [`Device::init`] and owned by the
//! device until it is dropped or deinitialized.

use std::str::FromStr;

use sdrdev_core::types::IQSample;
use sdrdev_core::StreamConfig;

use crate::hal::bladerf::BladeRfDevice;
use crate::hal::file::FileDevice;
use crate::hal::transport::{status, SyncTransport, TransportError};
use crate::hal::StreamDirection;

/// Result type for device operations
pub type SdrResult<T> = Result<T, SdrError>;

/// Errors that can occur during device operations
#[derive(Debug, thiserror::Error)]
pub enum SdrError {
    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Failed to open device: {0}")]
    Open(String),

    #[error("Configuration failed ({context}): {source}")]
    Configuration {
        context: String,
        source: TransportError,
    },

    #[error("{direction} failure: {source}")]
    Transport {
        direction: StreamDirection,
        source: TransportError,
    },

    #[error("End of stream after {delivered} samples")]
    EndOfStream { delivered: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device has been deinitialized")]
    Closed,
}

impl SdrError {
    /// Classify a failed sync call. A transport timeout is a `Timeout`; any
    /// other status is a `Transport` failure.
    pub fn from_sync(direction: StreamDirection, source: TransportError) -> Self {
        if source.status == status::TIMEOUT {
            SdrError::Timeout(format!("{} sync call: {}", direction, source))
        } else {
            SdrError::Transport { direction, source }
        }
    }
}

/// Backend variants a [`Device`] can be built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Raw SC16Q11 file container
    Sc16Q11File,
    /// bladeRF radio through its sync interface
    BladeRf,
}

impl DeviceType {
    pub const fn name(&self) -> &'static str {
        match self {
            DeviceType::Sc16Q11File => "sc16q11-file",
            DeviceType::BladeRf => "bladerf",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "sc16q11" | "sc16q11-file" => Ok(DeviceType::Sc16Q11File),
            "bladerf" | "hw" | "hardware" => Ok(DeviceType::BladeRf),
            _ => Err(format!("Unknown device type '{}'. Valid types: file, bladerf", s)),
        }
    }
}

/// Contract every backend implements.
pub trait DeviceBackend: Send {
    /// Fill `samples` completely, returning the timestamp of the first sample.
    fn rx(&mut self, samples: &mut [IQSample]) -> SdrResult<u64>;

    /// Transmit all of `samples`, nominally starting at `timestamp`.
    fn tx(&mut self, timestamp: u64, samples: &[IQSample]) -> SdrResult<()>;

    /// Disable streaming and release the underlying resource.
    ///
    /// Safe to call more than once and on partially constructed backends.
    fn deinit(&mut self);
}

/// The concrete backend owned by a [`Device`].
pub enum Backend {
    File(FileDevice),
    BladeRf(BladeRfDevice),
}

impl Backend {
    fn as_dyn(&mut self) -> &mut dyn DeviceBackend {
        match self {
            Backend::File(dev) => dev,
            Backend::BladeRf(dev) => dev,
        }
    }
}

/// A device: one backend plus its own copy of the configuration.
pub struct Device {
    config: StreamConfig,
    backend: Backend,
}

impl Device {
    /// Build a device over the selected backend.
    ///
    /// Any failure releases whatever the backend had acquired; no partial
    /// device is returned.
    pub fn init(config: &StreamConfig, device_type: DeviceType) -> SdrResult<Self> {
        let backend = match device_type {
            DeviceType::Sc16Q11File => Backend::File(FileDevice::open(config)?),
            DeviceType::BladeRf => Backend::BladeRf(BladeRfDevice::open(config)?),
        };

        tracing::info!(
            "Initialized {} device ({})",
            device_type,
            config.device_specifier.as_deref().unwrap_or("<default>")
        );

        Ok(Self {
            config: config.clone(),
            backend,
        })
    }

    /// Build a hardware-variant device over an already opened transport.
    pub fn with_transport(
        config: &StreamConfig,
        transport: Box<dyn SyncTransport>,
    ) -> SdrResult<Self> {
        let dev = BladeRfDevice::with_transport(config, transport)?;
        Ok(Self {
            config: config.clone(),
            backend: Backend::BladeRf(dev),
        })
    }

    /// Which backend variant this device uses.
    pub fn device_type(&self) -> DeviceType {
        match self.backend {
            Backend::File(_) => DeviceType::Sc16Q11File,
            Backend::BladeRf(_) => DeviceType::BladeRf,
        }
    }

    /// The device's copy of its configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    /// Receive `samples.len()` samples.
    ///
    /// Returns the timestamp of the first sample delivered.
    pub fn rx(&mut self, samples: &mut [IQSample]) -> SdrResult<u64> {
        self.backend.as_dyn().rx(samples)
    }

    /// Transmit `samples`, nominally at `timestamp`.
    pub fn tx(&mut self, timestamp: u64, samples: &[IQSample]) -> SdrResult<()> {
        self.backend.as_dyn().tx(timestamp, samples)
    }

    /// Release the backend and the device itself.
    pub fn deinit(mut self) {
        self.backend.as_dyn().deinit();
        tracing::debug!("Deinitialized {} device", self.device_type());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::loopback::{LoopbackConfig, LoopbackTransport};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_native(path: &std::path::Path, native: &[i16]) {
        let mut bytes = Vec::new();
        sdrdev_core::io::encode_le(native, &mut bytes);
        File::create(path).unwrap().write_all(&bytes).unwrap();
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!("file".parse::<DeviceType>().unwrap(), DeviceType::Sc16Q11File);
        assert_eq!("bladeRF".parse::<DeviceType>().unwrap(), DeviceType::BladeRf);
        assert!("uhd".parse::<DeviceType>().is_err());
        assert_eq!(DeviceType::BladeRf.to_string(), "bladerf");
    }

    #[test]
    fn test_init_file_device_copies_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rec.sc16q11");
        write_native(&path, &[2048, 0, 0, 2048]);

        let mut config = StreamConfig::with_specifier(path.to_string_lossy());
        let mut dev = Device::init(&config, DeviceType::Sc16Q11File).unwrap();

        // Later changes to the caller's config do not reach the device
        config.device_specifier = Some("elsewhere".to_string());
        assert_eq!(
            dev.config().device_specifier.as_deref(),
            Some(path.to_string_lossy().as_ref())
        );
        assert_eq!(dev.device_type(), DeviceType::Sc16Q11File);

        let mut samples = vec![IQSample::default(); 2];
        assert_eq!(dev.rx(&mut samples).unwrap(), 0);
        assert_eq!(samples, vec![IQSample::new(1.0, 0.0), IQSample::new(0.0, 1.0)]);
        dev.deinit();
    }

    #[test]
    fn test_init_missing_file_fails() {
        let config = StreamConfig::with_specifier("/nonexistent/dir/rec.sc16q11");
        let result = Device::init(&config, DeviceType::Sc16Q11File);
        assert!(matches!(result, Err(SdrError::Open(_))));
    }

    #[test]
    fn test_init_file_without_specifier_fails() {
        let result = Device::init(&StreamConfig::default(), DeviceType::Sc16Q11File);
        assert!(matches!(result, Err(SdrError::Open(_))));
    }

    #[cfg(not(feature = "bladerf"))]
    #[test]
    fn test_init_bladerf_without_support_fails() {
        let result = Device::init(&StreamConfig::default(), DeviceType::BladeRf);
        assert!(matches!(result, Err(SdrError::Open(_))));
    }

    #[test]
    fn test_hardware_device_over_loopback() {
        let transport = LoopbackTransport::new(LoopbackConfig::default());
        let handle = transport.handle();

        let mut config = StreamConfig::default();
        config.samples_per_buffer = 1024;
        let mut dev = Device::with_transport(&config, Box::new(transport)).unwrap();
        assert_eq!(dev.device_type(), DeviceType::BladeRf);

        let mut samples = vec![IQSample::default(); 3000];
        assert_eq!(dev.rx(&mut samples).unwrap(), 0);
        assert_eq!(handle.rx_chunks(), vec![1024, 1024, 952]);

        let err = dev.tx(0, &samples).unwrap_err();
        assert!(matches!(err, SdrError::Unsupported(_)));

        dev.deinit();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_drop_releases_backend() {
        let transport = LoopbackTransport::new(LoopbackConfig::default());
        let handle = transport.handle();
        {
            let mut config = StreamConfig::default();
            config.samples_per_buffer = 1024;
            let mut dev = Device::with_transport(&config, Box::new(transport)).unwrap();
            let mut samples = vec![IQSample::default(); 10];
            dev.rx(&mut samples).unwrap();
            assert!(handle.is_enabled(StreamDirection::Rx));
        }
        assert!(!handle.is_enabled(StreamDirection::Rx));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_device_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Device>();
    }

    #[test]
    fn test_sync_timeout_is_timeout() {
        let err = SdrError::from_sync(
            StreamDirection::Rx,
            TransportError::from_status(status::TIMEOUT),
        );
        assert!(matches!(err, SdrError::Timeout(_)));

        let err = SdrError::from_sync(StreamDirection::Tx, TransportError::from_status(status::IO));
        assert!(matches!(
            err,
            SdrError::Transport {
                direction: StreamDirection::Tx,
                ..
            }
        ));
    }
}
