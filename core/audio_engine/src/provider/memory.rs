use crate::provider::{AudioFormat, AudioProvider, DecodeError};

/// Fully decoded audio held in memory as native-format interleaved bytes.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    format: AudioFormat,
    data: Vec<u8>,
}

impl MemoryProvider {
    /// Wraps `data`; a trailing partial frame is ignored.
    pub fn new(format: AudioFormat, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    pub fn from_int16_mono(sample_rate: u32, samples: &[i16]) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(AudioFormat::mono_int16(sample_rate), data)
    }

    /// The `len` bytes starting at frame `start`, if all of them exist.
    fn bytes_at(&self, start: u64, len: usize) -> Option<&[u8]> {
        let offset = usize::try_from(start)
            .ok()?
            .checked_mul(self.format.bytes_per_frame())?;
        self.data.get(offset..offset.checked_add(len)?)
    }
}

impl AudioProvider for MemoryProvider {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn num_samples(&self) -> u64 {
        match self.format.bytes_per_frame() {
            0 => 0,
            frame => (self.data.len() / frame) as u64,
        }
    }

    fn fill_buffer(&self, buf: &mut [u8], start: u64) -> Result<(), DecodeError> {
        let Some(source) = self.bytes_at(start, buf.len()) else {
            return Err(DecodeError::Decode(format!(
                "read of {} bytes at frame {start} is outside the buffer",
                buf.len()
            )));
        };

        buf.copy_from_slice(source);
        Ok(())
    }
}
