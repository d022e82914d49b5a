//! WAV file handle backed by `hound`.

use super::{xinfo, DataHandle, DataSource, HandleSetup, Xinfos};
use crate::error::{Error, OpenReason, Result};
use hound::{SampleFormat, WavReader};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct OpenReader {
    reader: WavReader<BufReader<File>>,
    format: SampleFormat,
    bits: u16,
    /// Value offset the reader is positioned at, negative once a failed
    /// read left the decoder out of step with the file.
    position: i64,
}

/// Streams samples from a RIFF WAV file.
///
/// Integer PCM is scaled to `[-1, 1)`; float data passes through.
pub struct WaveFileHandle {
    path: PathBuf,
    osc_freq: f32,
    reader: Mutex<Option<OpenReader>>,
}

impl WaveFileHandle {
    /// Handle over the WAV file at `path`. The file is opened on first open.
    pub fn new(path: impl AsRef<Path>, osc_freq: f32) -> Arc<DataHandle> {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        DataHandle::new(
            name,
            Self {
                path,
                osc_freq,
                reader: Mutex::new(None),
            },
        )
    }

    fn fill(open: &mut OpenReader, values: &mut [f32]) -> std::result::Result<usize, hound::Error> {
        let mut n = 0;
        match open.format {
            SampleFormat::Float => {
                for (slot, sample) in values.iter_mut().zip(open.reader.samples::<f32>()) {
                    *slot = sample?;
                    n += 1;
                }
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (open.bits - 1)) as f32;
                for (slot, sample) in values.iter_mut().zip(open.reader.samples::<i32>()) {
                    *slot = sample? as f32 * scale;
                    n += 1;
                }
            }
        }
        Ok(n)
    }

    /// Replace a reader a failed read left mid-sample.
    fn reopen(&self, open: &mut OpenReader) -> std::result::Result<(), hound::Error> {
        let reader = WavReader::open(&self.path)?;
        let spec = reader.spec();
        if spec.sample_format != open.format || spec.bits_per_sample != open.bits {
            return Err(hound::Error::FormatError("file format changed while open"));
        }
        open.reader = reader;
        open.position = 0;
        Ok(())
    }

    /// Position the reader at `offset` if needed and fill `values`.
    fn read_at(
        open: &mut OpenReader,
        channels: i64,
        offset: i64,
        values: &mut [f32],
    ) -> std::result::Result<usize, hound::Error> {
        if open.position != offset {
            let frame = offset / channels;
            open.reader.seek(frame as u32)?;
            open.position = frame * channels;
            let mut skip = [0.0f32; 1];
            while open.position < offset {
                if Self::fill(open, &mut skip)? == 0 {
                    break;
                }
                open.position += 1;
            }
        }
        Self::fill(open, values)
    }
}

impl DataSource for WaveFileHandle {
    fn open(&self, name: &str) -> Result<HandleSetup> {
        let reader = WavReader::open(&self.path).map_err(|err| {
            let reason = match err {
                hound::Error::IoError(io) => OpenReason::Unavailable(io.to_string()),
                other => OpenReason::FormatInvalid(other.to_string()),
            };
            Error::open(name, reason)
        })?;
        let spec = reader.spec();
        let setup = HandleSetup {
            n_values: reader.len() as i64,
            n_channels: spec.channels as u32,
            bit_depth: spec.bits_per_sample as u32,
            mix_freq: spec.sample_rate as f32,
            osc_freq: self.osc_freq,
            needs_cache: false,
            xinfos: Xinfos::new().with(xinfo::OSC_FREQ, self.osc_freq.to_string()),
        };
        *self.reader.lock() = Some(OpenReader {
            reader,
            format: spec.sample_format,
            bits: spec.bits_per_sample,
            position: 0,
        });
        Ok(setup)
    }

    fn read(&self, setup: &HandleSetup, offset: i64, values: &mut [f32]) -> Result<usize> {
        let name = self.path.display().to_string();
        let mut guard = self.reader.lock();
        let Some(open) = guard.as_mut() else {
            return Err(Error::read(&name, offset, "file not open"));
        };

        if open.position < 0 {
            self.reopen(open)
                .map_err(|err| Error::read(&name, offset, err.to_string()))?;
        }
        let result = Self::read_at(open, i64::from(setup.n_channels), offset, values);
        match result {
            Ok(n) => {
                open.position += n as i64;
                Ok(n)
            }
            Err(err) => {
                open.position = -1;
                Err(Error::read(&name, offset, err.to_string()))
            }
        }
    }

    fn close(&self) {
        *self.reader.lock() = None;
    }
}
