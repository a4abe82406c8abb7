//! SC16Q11 sample format handling.
//!
//! This module is the single place where native fixed-point samples are
//! turned into [`IQSample`]s and back, for both the file container and the
//! radio's sync interface.
//!
//! # Supported Formats
//!
//! | Format      | Bytes/Sample | Description |
//! |-------------|--------------|-------------|
//! | Sc16Q11     | 4            | Interleaved int16 I/Q, Q11 fixed point |
//! | Sc16Q11Meta | 4            | Same samples, with per-call timestamp metadata |
//!
//! # Scaling Conventions
//!
//! - To float: divide each component by 2048
//! - To fixed: multiply by 2048, clamp to the i16 range, truncate toward zero
//!
//! Every i16 value survives a fixed -> float -> fixed round trip exactly,
//! since 2048 is a power of two and an f32 mantissa holds 16 bits.

use crate::types::{IQSample, NATIVE_VALUES_PER_SAMPLE};

/// Full-scale value of one Q11 component.
pub const SC16Q11_SCALE: f32 = 2048.0;

/// Native sample formats understood by the sync streaming interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NativeFormat {
    /// Interleaved int16 I/Q, 11 fractional bits; no metadata
    #[default]
    Sc16Q11,

    /// SC16Q11 samples with timestamp/flags metadata on every call.
    /// Required for scheduled (timestamped) transmission.
    Sc16Q11Meta,
}

impl NativeFormat {
    /// Returns the size of one I/Q sample in bytes.
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        NATIVE_VALUES_PER_SAMPLE * std::mem::size_of::<i16>()
    }

    /// Format code used by the libbladeRF C API (`bladerf_format`).
    pub const fn code(&self) -> i32 {
        match self {
            NativeFormat::Sc16Q11 => 0,
            NativeFormat::Sc16Q11Meta => 1,
        }
    }

    /// Whether sync calls in this format carry metadata.
    pub const fn has_metadata(&self) -> bool {
        matches!(self, NativeFormat::Sc16Q11Meta)
    }

    /// Returns a short name for the format (for CLI output, etc.).
    pub const fn short_name(&self) -> &'static str {
        match self {
            NativeFormat::Sc16Q11 => "sc16q11",
            NativeFormat::Sc16Q11Meta => "sc16q11_meta",
        }
    }

    /// Parse a format from a string, accepting a few common aliases.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sc16q11" | "sc16_q11" | "sc16" | "ci16" => Some(NativeFormat::Sc16Q11),
            "sc16q11_meta" | "sc16_q11_meta" | "meta" => Some(NativeFormat::Sc16Q11Meta),
            _ => None,
        }
    }
}

impl std::fmt::Display for NativeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl std::str::FromStr for NativeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NativeFormat::from_str(s).ok_or_else(|| {
            format!("Unknown native format '{}'. Valid formats: sc16q11, sc16q11_meta", s)
        })
    }
}

/// Convert interleaved SC16Q11 values to complex floats.
///
/// Converts `min(native.len() / 2, out.len())` samples and returns that
/// count. A trailing odd I value without its Q partner is ignored.
pub fn sc16q11_to_complexf(native: &[i16], out: &mut [IQSample]) -> usize {
    let mut n = 0;
    for (pair, sample) in native.chunks_exact(NATIVE_VALUES_PER_SAMPLE).zip(out.iter_mut()) {
        *sample = IQSample::new(pair[0] as f32 / SC16Q11_SCALE, pair[1] as f32 / SC16Q11_SCALE);
        n += 1;
    }
    n
}

/// Convert complex floats to interleaved SC16Q11 values.
///
/// Converts `min(samples.len(), native.len() / 2)` samples and returns that
/// count. Components outside the representable range saturate.
pub fn complexf_to_sc16q11(samples: &[IQSample], native: &mut [i16]) -> usize {
    let mut n = 0;
    for (sample, pair) in samples.iter().zip(native.chunks_exact_mut(NATIVE_VALUES_PER_SAMPLE)) {
        pair[0] = to_q11(sample.re);
        pair[1] = to_q11(sample.im);
        n += 1;
    }
    n
}

#[inline]
fn to_q11(v: f32) -> i16 {
    (v * SC16Q11_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Append native values to `bytes` in little-endian order.
pub fn encode_le(native: &[i16], bytes: &mut Vec<u8>) {
    bytes.reserve(native.len() * 2);
    for v in native {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian bytes into native values.
///
/// Decodes `min(bytes.len() / 2, native.len())` values and returns that count.
pub fn decode_le(bytes: &[u8], native: &mut [i16]) -> usize {
    let mut n = 0;
    for (b, v) in bytes.chunks_exact(2).zip(native.iter_mut()) {
        *v = i16::from_le_bytes([b[0], b[1]]);
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_sample() {
        assert_eq!(NativeFormat::Sc16Q11.bytes_per_sample(), 4);
        assert_eq!(NativeFormat::Sc16Q11Meta.bytes_per_sample(), 4);
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(NativeFormat::Sc16Q11.code(), 0);
        assert_eq!(NativeFormat::Sc16Q11Meta.code(), 1);
        assert!(NativeFormat::Sc16Q11Meta.has_metadata());
        assert!(!NativeFormat::Sc16Q11.has_metadata());
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(NativeFormat::from_str("SC16Q11"), Some(NativeFormat::Sc16Q11));
        assert_eq!(NativeFormat::from_str("sc16"), Some(NativeFormat::Sc16Q11));
        assert_eq!(NativeFormat::from_str("meta"), Some(NativeFormat::Sc16Q11Meta));
        assert_eq!(NativeFormat::from_str("cf32"), None);

        let parsed: Result<NativeFormat, _> = "bogus".parse();
        assert!(parsed.is_err());
    }

    #[test]
    fn test_native_to_float_scaling() {
        let native = [2048i16, -2048, 1024, 0];
        let mut out = [IQSample::default(); 2];
        assert_eq!(sc16q11_to_complexf(&native, &mut out), 2);
        assert_eq!(out[0], IQSample::new(1.0, -1.0));
        assert_eq!(out[1], IQSample::new(0.5, 0.0));
    }

    #[test]
    fn test_full_range_roundtrip_is_exact() {
        // Every i16 must come back bit-identical through float
        let native: Vec<i16> = (i16::MIN..=i16::MAX).collect();
        let mut floats = vec![IQSample::default(); native.len() / 2];
        sc16q11_to_complexf(&native, &mut floats);

        let mut back = vec![0i16; native.len()];
        complexf_to_sc16q11(&floats, &mut back);
        assert_eq!(back, native);
    }

    #[test]
    fn test_range_endpoints() {
        let native = [i16::MIN, i16::MAX];
        let mut out = [IQSample::default(); 1];
        sc16q11_to_complexf(&native, &mut out);
        assert_eq!(out[0].re, -16.0);
        assert_eq!(out[0].im, 32767.0 / 2048.0);

        let mut back = [0i16; 2];
        complexf_to_sc16q11(&out, &mut back);
        assert_eq!(back, native);
    }

    #[test]
    fn test_float_to_native_truncates_and_saturates() {
        let samples = [IQSample::new(0.00074, -0.00074), IQSample::new(100.0, -100.0)];
        let mut native = [0i16; 4];
        complexf_to_sc16q11(&samples, &mut native);
        // 0.00074 * 2048 = 1.515 -> 1, truncated toward zero
        assert_eq!(native[0], 1);
        assert_eq!(native[1], -1);
        assert_eq!(native[2], i16::MAX);
        assert_eq!(native[3], i16::MIN);
    }

    #[test]
    fn test_zero_count_is_noop() {
        let mut out: [IQSample; 0] = [];
        assert_eq!(sc16q11_to_complexf(&[1, 2, 3, 4], &mut out), 0);

        let mut native = [7i16; 4];
        assert_eq!(complexf_to_sc16q11(&[], &mut native), 0);
        assert_eq!(native, [7; 4]);
    }

    #[test]
    fn test_converts_shorter_side_only() {
        let native = [2048i16, 2048, 2048, 2048, 2048];
        let mut out = [IQSample::default(); 4];
        assert_eq!(sc16q11_to_complexf(&native, &mut out), 2);
        assert_eq!(out[2], IQSample::default());
    }

    #[test]
    fn test_le_codec() {
        let native = [0x0102i16, -2];
        let mut bytes = Vec::new();
        encode_le(&native, &mut bytes);
        assert_eq!(bytes, vec![0x02, 0x01, 0xfe, 0xff]);

        let mut back = [0i16; 2];
        assert_eq!(decode_le(&bytes, &mut back), 2);
        assert_eq!(back, native);
    }
}
