//! Wave chunk integration tests.
//!
//! Plays looped WAV files block by block, forward and backward, and compares
//! the result with the loop unrolled into a plain vector.
//!
//! Run with:
//! ```bash
//! cargo test -p wavestream --test chunk_integration
//! ```

#![cfg(feature = "wav")]

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{
    assert_signals_equal, generate_noise, init_tracing, interleave, save_wav_file_float,
    test_manager, TEST_SAMPLE_RATE,
};
use std::path::Path;
use wavestream::prelude::*;
use wavestream::SegmentKind;

/// Frames of `values` (interleaved, `ch` channels) as slices.
fn frames(values: &[f32], ch: usize) -> Vec<&[f32]> {
    values.chunks_exact(ch).collect()
}

/// The wave `spec` produces from `values`, written out frame by frame.
fn unroll(values: &[f32], ch: usize, spec: &LoopSpec) -> Vec<f32> {
    if spec.loop_type == LoopType::None {
        return values.to_vec();
    }
    let src = frames(values, ch);
    let (a, b) = ((spec.first as usize) / ch, (spec.last as usize) / ch);
    let mut out: Vec<&[f32]> = src[..=b].to_vec();
    match spec.loop_type {
        LoopType::None => unreachable!(),
        LoopType::Jump => {
            for _ in 0..spec.count {
                out.extend_from_slice(&src[a..=b]);
            }
            out.extend_from_slice(&src[b + 1..]);
        }
        LoopType::PingPong => {
            let (mut pos, mut step) = (b, -1isize);
            for _ in 0..spec.count as usize * (b - a) {
                pos = (pos as isize + step) as usize;
                out.push(src[pos]);
                if pos == a || pos == b {
                    step = -step;
                }
            }
            if step < 0 {
                out.extend_from_slice(&src[b + 1..]);
            } else {
                out.extend(src[..a].iter().rev());
            }
        }
    }
    out.concat()
}

fn write_fixture(dir: &Path, channels: u16, n_frames: usize) -> (std::path::PathBuf, Vec<f32>) {
    let per_channel: Vec<Vec<f32>> = (0..channels)
        .map(|c| generate_noise(n_frames, 100 + c as u64))
        .collect();
    let samples = interleave(&per_channel);
    let path = dir.join(format!("noise_{}ch.wav", channels));
    save_wav_file_float(&path, &samples, channels, TEST_SAMPLE_RATE).unwrap();
    (path, samples)
}

fn open_chunk(path: &Path, channels: usize, spec: LoopSpec) -> WaveChunk {
    let manager = test_manager(256, 16);
    let padding = manager.config().chunk_cache_padding(channels);
    let cache = manager
        .create_cache(WaveFileHandle::new(path, 440.0), padding)
        .unwrap();
    let chunk = WaveChunk::new(cache, spec);
    chunk.open().unwrap();
    chunk
}

/// Walk the whole wave forward, checking the frame after every block
/// through the block's padding.
fn play_forward(chunk: &WaveChunk, expected: &[f32]) -> Vec<f32> {
    let ch = chunk.n_channels() as usize;
    let wave_length = chunk.wave_length();
    let mut out = Vec::with_capacity(expected.len());
    let mut offset = 0;
    while offset < wave_length {
        let block = chunk.use_block(offset, PlayDirection::Forward);
        let mut values = vec![0.0; block.length()];
        block.copy_to(&mut values);
        out.extend_from_slice(&values);

        let next = block.next_offset() as usize;
        for c in 0..ch {
            let lookahead = expected.get(next + c).copied().unwrap_or(0.0);
            assert_eq!(block.sample(block.frames() as isize, c), lookahead);
        }
        offset = block.next_offset();
        chunk.unuse_block(block);
    }
    out.truncate(expected.len());
    out
}

/// Walk the whole wave backward and return it in forward order.
fn play_backward(chunk: &WaveChunk) -> Vec<f32> {
    let ch = chunk.n_channels() as i64;
    let mut frames_rev: Vec<Vec<f32>> = Vec::new();
    let mut offset = chunk.wave_length() - ch;
    while offset >= 0 {
        let block = chunk.use_block(offset, PlayDirection::Reverse);
        for n in 0..block.frames() as isize {
            frames_rev.push((0..ch as usize).map(|c| block.sample(n, c)).collect());
        }
        offset = block.next_offset();
        chunk.unuse_block(block);
    }
    let skip = frames_rev.len() - (chunk.wave_length() / ch) as usize;
    frames_rev.into_iter().rev().skip(skip).flatten().collect()
}

// =============================================================================
// Playback
// =============================================================================

#[test]
fn test_unlooped_playback_matches_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 1, 5000);
    let chunk = open_chunk(&path, 1, LoopSpec::none());
    assert_eq!(chunk.wave_length(), 5000);
    assert_eq!(chunk.mix_freq(), TEST_SAMPLE_RATE as f32);

    assert_signals_equal(&play_forward(&chunk, &samples), &samples, 0.0, "forward");
    assert_signals_equal(&play_backward(&chunk), &samples, 0.0, "backward");
    chunk.close();
}

#[test]
fn test_jump_loop_playback() {
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 2, 3000);
    let spec = LoopSpec::jump(2 * 700, 2 * 1500, 4);
    let expected = unroll(&samples, 2, &spec);

    let chunk = open_chunk(&path, 2, spec);
    assert_eq!(chunk.wave_length() as usize, expected.len());
    assert_eq!(chunk.wave_length(), 6000 + 4 * 2 * 801);

    assert_signals_equal(&play_forward(&chunk, &expected), &expected, 0.0, "jump forward");
    assert_signals_equal(&play_backward(&chunk), &expected, 0.0, "jump backward");
    chunk.close();
}

#[test]
fn test_ping_pong_loop_playback() {
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 2, 3000);
    for count in [1, 2, 5] {
        let spec = LoopSpec::ping_pong(2 * 400, 2 * 2000, count);
        let expected = unroll(&samples, 2, &spec);

        let chunk = open_chunk(&path, 2, spec);
        assert_eq!(chunk.wave_length() as usize, expected.len());
        assert_eq!(chunk.ends_backwards(), count % 2 == 1);
        assert!(chunk.segment(SegmentKind::PingPongWrap).is_some());

        let context = format!("ping-pong x{}", count);
        assert_signals_equal(&play_forward(&chunk, &expected), &expected, 0.0, &context);
        assert_signals_equal(&play_backward(&chunk), &expected, 0.0, &context);
        chunk.close();
    }
}

#[test]
fn test_short_loops_in_three_channels() {
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 3, 900);
    for spec in [
        LoopSpec::jump(3 * 300, 3 * 302, 50),
        LoopSpec::ping_pong(3 * 10, 3 * 13, 9),
    ] {
        let expected = unroll(&samples, 3, &spec);
        let chunk = open_chunk(&path, 3, spec);
        assert_eq!(chunk.wave_length() as usize, expected.len());
        let context = format!("{:?}", spec);
        assert_signals_equal(&play_forward(&chunk, &expected), &expected, 0.0, &context);
        assert_signals_equal(&play_backward(&chunk), &expected, 0.0, &context);
        chunk.close();
    }
}

#[test]
fn test_concurrent_voices_share_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 1, 4000);
    let spec = LoopSpec::ping_pong(1000, 3000, 3);
    let expected = unroll(&samples, 1, &spec);
    let chunk = open_chunk(&path, 1, spec);

    std::thread::scope(|scope| {
        for voice in 0..4i64 {
            let chunk = &chunk;
            let expected = &expected;
            scope.spawn(move || {
                let mut offset = voice * 997;
                while offset < chunk.wave_length() {
                    let block = chunk.use_block(offset, PlayDirection::Forward);
                    for n in 0..block.frames() {
                        let at = (offset + n as i64) as usize;
                        if at >= expected.len() {
                            break;
                        }
                        assert_eq!(block.sample(n as isize, 0), expected[at], "voice {}", voice);
                    }
                    offset = block.next_offset();
                }
            });
        }
    });
    chunk.close();
}

#[test]
fn test_reopen_rebuilds_layout() {
    let dir = tempfile::tempdir().unwrap();
    let (path, samples) = write_fixture(dir.path(), 1, 2000);
    let spec = LoopSpec::jump(500, 900, 2);
    let chunk = open_chunk(&path, 1, spec);
    chunk.close();
    assert!(!chunk.is_open());
    assert!(!chunk.cache().handle().is_open());

    chunk.open().unwrap();
    let expected = unroll(&samples, 1, &spec);
    assert_eq!(chunk.debug_block(0, expected.len()), expected);
    chunk.close();
}

#[test]
fn test_missing_file_fails_chunk_open() {
    let dir = tempfile::tempdir().unwrap();
    let manager = test_manager(256, 16);
    let cache = manager
        .create_cache(WaveFileHandle::new(dir.path().join("nope.wav"), 440.0), 8)
        .unwrap();
    let chunk = WaveChunk::new(cache.clone(), LoopSpec::none());
    assert!(matches!(
        chunk.open(),
        Err(wavestream::sampler::Error::Core(_))
    ));
    assert!(!chunk.is_open());
    assert!(!cache.is_open());
}
