use std::{io::Read, path::Path};

use hound::WavReader;
use log::debug;
use thiserror::Error;

use crate::provider::{AudioFormat, AudioProvider, DecodeError, MemoryProvider};

#[derive(Debug, Error)]
pub enum WavError {
    #[error("failed to read WAV data: {0}")]
    Read(#[from] hound::Error),

    #[error("unsupported WAV layout: {0}")]
    Unsupported(String),
}

/// `WavProvider` is a `.wav` file decoded into memory in its native layout.
///
/// Supports:
/// - Any channel count
/// - 8, 16, 24 and 32-bit integer PCM (8-bit stored unsigned with bias 128)
/// - 32-bit float
///
/// # Example
/// ```no_run
/// use audio_engine::provider::{AudioProvider, WavProvider};
///
/// let provider = WavProvider::open("assets/wav/dialogue.wav").unwrap();
/// println!("{} frames", provider.num_samples());
/// ```
#[derive(Debug)]
pub struct WavProvider {
    /// file name
    name: String,
    inner: MemoryProvider,
}

impl WavProvider {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reader = WavReader::open(path)?;
        Self::from_reader(reader, &name)
    }

    pub fn from_stream<R: Read>(stream: R) -> Result<Self, WavError> {
        Self::from_reader(WavReader::new(stream)?, "stream")
    }

    fn from_reader<R: Read>(reader: WavReader<R>, name: &str) -> Result<Self, WavError> {
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(WavError::Unsupported("no channels".into()));
        }

        let format = AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bytes_per_sample: spec.bits_per_sample / 8,
            float_samples: spec.sample_format == hound::SampleFormat::Float,
        };
        let data = Self::decode_native(reader)?;
        debug!(
            target: "audio_provider",
            "Loaded {name}: {} Hz, {} channels, {} bits, {} bytes",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            data.len()
        );

        Ok(Self {
            name: name.to_owned(),
            inner: MemoryProvider::new(format, data),
        })
    }

    /// Re-encodes the decoded samples as little-endian bytes of their
    /// original width.
    fn decode_native<R: Read>(reader: WavReader<R>) -> Result<Vec<u8>, WavError> {
        let spec = reader.spec();
        let width = usize::from(spec.bits_per_sample / 8);
        let mut data = Vec::with_capacity(reader.len() as usize * width);

        match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => {
                for sample in reader.into_samples::<f32>() {
                    data.extend_from_slice(&sample?.to_le_bytes());
                }
            }
            // hound hands 8-bit samples out signed; restore the WAV bias
            (hound::SampleFormat::Int, 8) => {
                for sample in reader.into_samples::<i32>() {
                    data.push((sample? + 128) as u8);
                }
            }
            (hound::SampleFormat::Int, 16 | 24 | 32) => {
                for sample in reader.into_samples::<i32>() {
                    data.extend_from_slice(&sample?.to_le_bytes()[..width]);
                }
            }
            (sample_format, bits) => {
                return Err(WavError::Unsupported(format!(
                    "{bits}-bit {sample_format:?} samples"
                )));
            }
        }

        Ok(data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AudioProvider for WavProvider {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn num_samples(&self) -> u64 {
        self.inner.num_samples()
    }

    fn fill_buffer(&self, buf: &mut [u8], start: u64) -> Result<(), DecodeError> {
        self.inner.fill_buffer(buf, start)
    }
}
