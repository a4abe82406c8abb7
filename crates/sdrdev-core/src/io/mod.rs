//! I/O utilities for native sample data.
//!
//! The native representation everywhere below the device abstraction is
//! SC16Q11: interleaved signed 16-bit I/Q with 11 fractional bits, so that
//! a full-scale value of `2048` maps to `1.0`.
//!
//! # Example
//!
//! ```rust
//! use sdrdev_core::io::{NativeFormat, decode_le, encode_le};
//!
//! let native = [100i16, -100, 2047, -2048];
//! let mut bytes = Vec::new();
//! encode_le(&native, &mut bytes);
//! assert_eq!(bytes.len(), 2 * NativeFormat::Sc16Q11.bytes_per_sample());
//!
//! let mut back = [0i16; 4];
//! decode_le(&bytes, &mut back);
//! assert_eq!(back, native);
//! ```

mod format;

pub use format::{
    complexf_to_sc16q11, decode_le, encode_le, sc16q11_to_complexf, NativeFormat, SC16Q11_SCALE,
};
