//! # sdrdev Core Library
//!
//! Shared building blocks for the sdrdev device layer:
//!
//! - **Sample types**: the floating-point [`IQSample`] used by application code
//! - **Format conversion**: SC16Q11 fixed-point I/Q to and from `IQSample`
//! - **Configuration**: [`StreamConfig`] for sync streaming, YAML-loadable
//! - **Test signals**: a small xorshift64* PRNG for deterministic test data
//!
//! ## Example
//!
//! ```rust
//! use sdrdev_core::io::{complexf_to_sc16q11, sc16q11_to_complexf};
//! use sdrdev_core::types::IQSample;
//!
//! let native = [2048i16, -1024, 0, 2047];
//! let mut samples = vec![IQSample::default(); 2];
//! sc16q11_to_complexf(&native, &mut samples);
//! assert_eq!(samples[0], IQSample::new(1.0, -0.5));
//!
//! let mut back = [0i16; 4];
//! complexf_to_sc16q11(&samples, &mut back);
//! assert_eq!(back, native);
//! ```

pub mod config;
pub mod io;
pub mod random;
pub mod types;

pub use config::{BoardConfig, ConfigError, StreamConfig, TRANSFER_GRANULARITY};
pub use io::NativeFormat;
pub use random::RandState;
pub use types::IQSample;
