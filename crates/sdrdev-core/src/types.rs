//! Core sample types
//!
//! Application code works in complex single-precision floats. Radios and the
//! file container work in interleaved 16-bit fixed point; see [`crate::io`]
//! for the conversion between the two.
//!
//! ```text
//!   native buffer (i16):  [ I0 | Q0 | I1 | Q1 | I2 | Q2 | ... ]
//!                            \____/    \____/    \____/
//!   IQSample buffer:        s[0]      s[1]      s[2]
//! ```

use num_complex::Complex32;

/// A single complex I/Q sample, `re` = I and `im` = Q
pub type IQSample = Complex32;

/// Number of `i16` values that make up one native sample (I and Q)
pub const NATIVE_VALUES_PER_SAMPLE: usize = 2;
