//! Tolerance constants for sample comparisons.
//!
//! Cache and chunk paths copy values verbatim, so most comparisons are exact.
//! These cover the paths that convert or scale.

/// Floating point rounding errors (scaling, float passthrough).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size.
/// Use when comparing against a signal written as 16-bit PCM.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
