use crate::provider::{AudioFormat, DecodeError};

/// How a single channel sample is laid out in a provider buffer.
///
/// Resolved once per buffer from `(bytes_per_sample, float_samples)`, so the
/// per-sample loop only dispatches on an already known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// 8-bit unsigned, bias 128.
    U8,
    /// Signed little-endian integer of `bytes` width (2 or more).
    Int { bytes: usize },
    F32,
    F64,
}

impl SampleKind {
    pub fn from_format(format: &AudioFormat) -> Result<Self, DecodeError> {
        match (format.bytes_per_sample, format.float_samples) {
            (1, false) => Ok(Self::U8),
            (bytes @ 2.., false) => Ok(Self::Int {
                bytes: usize::from(bytes),
            }),
            (4, true) => Ok(Self::F32),
            (8, true) => Ok(Self::F64),
            (bytes_per_sample, float_samples) => Err(DecodeError::UnsupportedFormat {
                bytes_per_sample,
                float_samples,
            }),
        }
    }

    pub fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::Int { bytes } => bytes,
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Converts one sample of exactly [`width`](Self::width) bytes.
    ///
    /// Wide integers keep only their most significant 16 bits; the low bits
    /// are truncated, not rounded.
    pub fn to_int16(self, raw: &[u8]) -> i16 {
        match self {
            Self::U8 => (i16::from(raw[0]) - 128) << 8,
            Self::Int { bytes } => i16::from_le_bytes([raw[bytes - 2], raw[bytes - 1]]),
            Self::F32 => float_to_int16(f64::from(le_f32(raw))),
            Self::F64 => float_to_int16(le_f64(raw)),
        }
    }

    /// Converts one sample to a float in `[-1.0, 1.0)`, keeping up to 32
    /// bits of integer precision.
    pub fn to_f32(self, raw: &[u8]) -> f32 {
        match self {
            Self::U8 => (f32::from(raw[0]) - 128.0) / 128.0,
            Self::Int { bytes } => {
                let take = bytes.min(4);
                let mut word = [0u8; 4];
                word[4 - take..].copy_from_slice(&raw[bytes - take..bytes]);
                i32::from_le_bytes(word) as f32 / 2_147_483_648.0
            }
            Self::F32 => le_f32(raw),
            Self::F64 => le_f64(raw) as f32,
        }
    }

    /// Converts `dest.len()` interleaved frames of `channels` samples each,
    /// averaging the channels of every frame into one value.
    pub fn to_int16_mono(self, src: &[u8], channels: u16, dest: &mut [i16]) {
        let width = self.width();
        let channels = usize::from(channels.max(1));

        if channels == 1 {
            for (out, sample) in dest.iter_mut().zip(src.chunks_exact(width)) {
                *out = self.to_int16(sample);
            }
            return;
        }

        for (out, frame) in dest.iter_mut().zip(src.chunks_exact(width * channels)) {
            let sum: i32 = frame
                .chunks_exact(width)
                .map(|sample| i32::from(self.to_int16(sample)))
                .sum();
            *out = (sum / channels as i32) as i16;
        }
    }
}

/// Scales a float sample by 32768 and saturates into the 16-bit range.
/// In-range values are truncated toward zero.
fn float_to_int16(sample: f64) -> i16 {
    let expanded = sample * 32768.0;
    if expanded < -32768.0 {
        i16::MIN
    } else if expanded > 32767.0 {
        i16::MAX
    } else {
        expanded as i16
    }
}

fn le_f32(raw: &[u8]) -> f32 {
    f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

fn le_f64(raw: &[u8]) -> f64 {
    f64::from_le_bytes([
        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
    ])
}
