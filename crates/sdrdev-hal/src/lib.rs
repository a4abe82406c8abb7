//! # sdrdev Device Layer
//!
//! A uniform receive/transmit front over interchangeable backends:
//!
//! - **File**: replay and record raw SC16Q11 containers
//! - **bladeRF**: sync-interface streaming from the radio (`bladerf` feature)
//!
//! plus a burst transmitter that schedules TX on the radio's sample clock.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sdrdev_core::{IQSample, StreamConfig};
//! use sdrdev_hal::{Device, DeviceType};
//!
//! let config = StreamConfig::with_specifier("capture.sc16q11");
//! let mut dev = Device::init(&config, DeviceType::Sc16Q11File)?;
//!
//! let mut samples = vec![IQSample::default(); 4096];
//! let timestamp = dev.rx(&mut samples)?;
//! println!("first sample at t={}", timestamp);
//! dev.deinit();
//! # Ok::<(), sdrdev_hal::SdrError>(())
//! ```

pub mod device;
pub mod hal;

pub use device::{Backend, Device, DeviceBackend, DeviceType, SdrError, SdrResult};
pub use hal::{StreamDirection, SyncTransport};
