use std::panic::{self, AssertUnwindSafe};

use log::error;

use crate::{
    convert::SampleKind,
    provider::{AudioProvider, DecodeError},
    volume,
};

const LOG_TARGET: &str = "audio_provider";

/// A request of `count` frames at `start` split against the stream bounds:
/// `lead` frames of silence, `len` frames read from `start`, then `trail`
/// frames of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    lead: usize,
    start: u64,
    len: usize,
    trail: usize,
}

impl Window {
    fn new(start: i64, count: usize, num_samples: u64) -> Self {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let num_samples = i64::try_from(num_samples).unwrap_or(i64::MAX);

        let lead = if start < 0 {
            start.saturating_neg().min(count)
        } else {
            0
        };
        let start = start.max(0);
        let remaining = count - lead;
        let overhang = (start.saturating_add(remaining) - num_samples).max(0);
        let trail = remaining.min(overhang);

        Self {
            lead: lead as usize,
            start: start as u64,
            len: (remaining - trail) as usize,
            trail: trail as usize,
        }
    }
}

/// Runs a provider fill, turning both decode errors and panics raised by
/// the provider into a message for the log.
fn contain<F>(fill: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), DecodeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(fill)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("Unknown audio decoding error".to_owned()),
    }
}

/// Range-safe reads on top of [`AudioProvider::fill_buffer`].
///
/// Every `get_*` method accepts requests that start before frame 0 or run
/// past the end of the stream and pads those parts with silence. Decode
/// failures never reach the caller: they are logged and the requested
/// region comes back silent.
pub trait AudioProviderExt: AudioProvider {
    /// Writes native-format silence over `buf`.
    fn zero_fill(&self, buf: &mut [u8]) {
        buf.fill(self.format().silence_byte());
    }

    /// Reads `buf.len()` frames starting at `start` as signed 16-bit mono.
    ///
    /// Providers that already produce 16-bit mono fill `buf` directly; all
    /// others are read into a scratch buffer and converted.
    fn fill_buffer_int16_mono(&self, buf: &mut [i16], start: u64) -> Result<(), DecodeError> {
        let format = self.format();
        if format.is_mono_int16() && cfg!(target_endian = "little") {
            return self.fill_buffer(bytemuck::cast_slice_mut(buf), start);
        }

        let kind = SampleKind::from_format(&format)?;
        let mut raw = vec![0u8; buf.len() * format.bytes_per_frame()];
        self.fill_buffer(&mut raw, start)?;
        kind.to_int16_mono(&raw, format.channels, buf);
        Ok(())
    }

    /// Reads `buf.len() / bytes_per_frame` native-format frames at `start`.
    fn get_audio(&self, buf: &mut [u8], start: i64) {
        let frame = self.format().bytes_per_frame();
        if frame == 0 {
            return;
        }

        let window = Window::new(start, buf.len() / frame, self.num_samples());
        let (lead, rest) = buf.split_at_mut(window.lead * frame);
        let (body, rest) = rest.split_at_mut(window.len * frame);
        self.zero_fill(lead);
        self.zero_fill(&mut rest[..window.trail * frame]);

        if window.len == 0 {
            return;
        }

        if let Err(message) = contain(|| self.fill_buffer(body, window.start)) {
            error!(target: LOG_TARGET, "{message}");
            self.zero_fill(body);
        }
    }

    /// Reads `buf.len()` frames at `start` as signed 16-bit mono.
    fn get_int16_mono_audio(&self, buf: &mut [i16], start: i64) {
        let window = Window::new(start, buf.len(), self.num_samples());
        let (lead, rest) = buf.split_at_mut(window.lead);
        let (body, rest) = rest.split_at_mut(window.len);
        lead.fill(0);
        rest[..window.trail].fill(0);

        if window.len == 0 {
            return;
        }

        if let Err(message) = contain(|| self.fill_buffer_int16_mono(body, window.start)) {
            error!(target: LOG_TARGET, "{message}");
            body.fill(0);
        }
    }

    /// Same as [`get_int16_mono_audio`](Self::get_int16_mono_audio), scaled by `volume`.
    fn get_int16_mono_audio_with_volume(&self, buf: &mut [i16], start: i64, volume: f64) {
        self.get_int16_mono_audio(buf, start);
        volume::apply_volume(buf, volume);
    }
}

impl<P: AudioProvider + ?Sized> AudioProviderExt for P {}
