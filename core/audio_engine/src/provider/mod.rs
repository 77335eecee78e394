use thiserror::Error;

pub mod fill;
pub mod memory;
pub mod wav;

pub use fill::AudioProviderExt;
pub use memory::MemoryProvider;
pub use wav::WavProvider;

/// Layout of the interleaved frames a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Width of a single channel sample in bytes.
    pub bytes_per_sample: u16,
    /// `true` for IEEE float samples, `false` for integer PCM.
    pub float_samples: bool,
}

impl AudioFormat {
    /// Signed 16-bit mono, the canonical format every provider can be read as.
    pub fn mono_int16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bytes_per_sample: 2,
            float_samples: false,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bytes_per_sample)
    }

    pub fn is_mono_int16(&self) -> bool {
        !self.float_samples && self.bytes_per_sample == 2 && self.channels == 1
    }

    /// Byte value that encodes silence: 8-bit PCM is unsigned with a bias
    /// of 128, every other format is signed around zero.
    pub fn silence_byte(&self) -> u8 {
        if self.bytes_per_sample == 1 { 128 } else { 0 }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("unsupported {bytes_per_sample}-byte sample (float: {float_samples})")]
    UnsupportedFormat {
        bytes_per_sample: u16,
        float_samples: bool,
    },
}

/// Source of decoded audio frames.
///
/// Implementors only deal with in-range requests: the fill helpers in
/// [`AudioProviderExt`] clamp every request to `[0, num_samples)` and pad the
/// remainder with silence before calling [`AudioProvider::fill_buffer`].
pub trait AudioProvider: Send + Sync {
    fn format(&self) -> AudioFormat;

    /// Total number of frames in the stream.
    fn num_samples(&self) -> u64;

    /// Writes `buf.len() / bytes_per_frame` native-format frames starting
    /// at frame `start` into `buf`.
    fn fill_buffer(&self, buf: &mut [u8], start: u64) -> Result<(), DecodeError>;
}
