//! Test helpers and fixtures for wavestream integration tests.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (copies, float WAV)
//! - `INT16_EPSILON`: Signals round-tripped through 16-bit PCM

#![allow(dead_code)]

pub mod tolerances;

use std::path::Path;
use std::sync::Arc;
use wavestream::prelude::*;

/// Default test sample rate.
pub const TEST_SAMPLE_RATE: u32 = 48000;

/// Install a test-friendly tracing subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Deterministic Signal Generators
// =============================================================================

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate an integer staircase signal [0, 1, 2, ..., n-1] as f32.
///
/// Each sample equals its index, so misplaced reads show up as the wrong
/// number rather than a slightly different waveform.
pub fn generate_integer_staircase(num_samples: usize) -> Vec<f32> {
    (0..num_samples).map(|i| i as f32).collect()
}

/// Generate white noise (random samples in -1..1) from a fixed seed.
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_samples).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Interleave per-channel buffers of equal length.
pub fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.first().map_or(0, Vec::len);
    (0..frames)
        .flat_map(|frame| channels.iter().map(move |channel| channel[frame]))
        .collect()
}

// =============================================================================
// Handle Utilities
// =============================================================================

/// Read a whole open handle with one request per `chunk_size` values.
pub fn read_chunked(handle: &DataHandle, chunk_size: usize) -> Vec<f32> {
    let length = handle.length() as usize;
    let mut out = vec![0.0; length];
    let mut offset = 0;
    while offset < length {
        let end = (offset + chunk_size).min(length);
        let n = handle
            .read(offset as i64, &mut out[offset..end])
            .expect("read failed");
        assert!(n > 0, "zero-length read at {}", offset);
        offset += n;
    }
    out
}

/// Read a whole open handle, looping over short reads.
pub fn read_all(handle: &DataHandle) -> Vec<f32> {
    let mut out = vec![0.0; handle.length() as usize];
    let n = handle.read_exact(0, &mut out).expect("read failed");
    assert_eq!(n, out.len());
    out
}

/// Cache manager for tests with a budget of `budget_nodes` aged nodes.
pub fn test_manager(node_size: usize, budget_nodes: usize) -> Arc<CacheManager> {
    let config = StreamConfig::with_node_size(node_size)
        .memory_budget(budget_nodes * node_size * std::mem::size_of::<f32>())
        .wave_chunk_pads(4, 16);
    CacheManager::new(config).expect("invalid test config")
}

// =============================================================================
// Audio Comparison Utilities
// =============================================================================

/// Result of comparing two audio buffers.
#[derive(Debug, Clone)]
struct AudioComparisonResult {
    /// Whether all samples are within tolerance.
    equal: bool,
    /// Maximum absolute difference between any two samples.
    max_diff: f32,
    /// Index of first sample that exceeds tolerance (if any).
    first_diff_sample: Option<usize>,
    /// Number of samples that exceed tolerance.
    num_diffs: usize,
}

/// Compare two audio buffers with epsilon tolerance.
fn compare_audio(a: &[f32], b: &[f32], epsilon: f32) -> AudioComparisonResult {
    if a.len() != b.len() {
        return AudioComparisonResult {
            equal: false,
            max_diff: f32::MAX,
            first_diff_sample: Some(0),
            num_diffs: a.len().max(b.len()),
        };
    }

    let mut max_diff: f32 = 0.0;
    let mut first_diff = None;
    let mut num_diffs = 0;
    for (i, (&x, &y)) in a.iter().zip(b).enumerate() {
        let diff = (x - y).abs();
        max_diff = max_diff.max(diff);
        if diff > epsilon {
            num_diffs += 1;
            first_diff.get_or_insert(i);
        }
    }

    AudioComparisonResult {
        equal: num_diffs == 0,
        max_diff,
        first_diff_sample: first_diff,
        num_diffs,
    }
}

/// Assert two signals are equal within tolerance, with detailed error message.
pub fn assert_signals_equal(a: &[f32], b: &[f32], epsilon: f32, context: &str) {
    let result = compare_audio(a, b, epsilon);
    assert!(
        result.equal,
        "{}: Signals differ - first diff at sample {:?}, max_diff={:.6}, num_diffs={}",
        context,
        result.first_diff_sample,
        result.max_diff,
        result.num_diffs
    );
}

// =============================================================================
// WAV File I/O
// =============================================================================

/// Write interleaved samples as 16-bit PCM.
pub fn save_wav_file_pcm16(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| e.to_string())?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        writer.write_sample(value).map_err(|e| e.to_string())?;
    }
    writer.finalize().map_err(|e| e.to_string())
}

/// Write interleaved samples as 32-bit float.
pub fn save_wav_file_float(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), String> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| e.to_string())?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| e.to_string())?;
    }
    writer.finalize().map_err(|e| e.to_string())
}
