/// Converts a time in milliseconds to a sample index, rounding up.
///
/// `ms_to_sample_ceil(1, 44100)` is 45, not 44: a clip that starts one
/// millisecond in must not include the sample that sits before that instant.
pub fn ms_to_sample_ceil(ms: i64, sample_rate: u32) -> i64 {
    let scaled = ms.saturating_mul(i64::from(sample_rate));
    scaled.saturating_add(999).div_euclid(1000)
}

/// Half-open range of sample frames `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRange {
    pub start: u64,
    pub end: u64,
}

impl SampleRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Builds the range covered by `[start_ms, end_ms)` in a stream of
    /// `num_samples` frames. Both bounds are rounded up to whole samples and
    /// clamped into the stream, and `end` never precedes `start`.
    pub fn from_millis(start_ms: i64, end_ms: i64, sample_rate: u32, num_samples: u64) -> Self {
        let max = i64::try_from(num_samples).unwrap_or(i64::MAX);
        let start = ms_to_sample_ceil(start_ms, sample_rate).clamp(0, max);
        let end = ms_to_sample_ceil(end_ms, sample_rate).clamp(start, max);

        Self {
            start: start as u64,
            end: end as u64,
        }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Splits the range into consecutive `(first_frame, frame_count)` windows
    /// of at most `max_frames` frames each.
    pub fn chunks(self, max_frames: usize) -> impl Iterator<Item = (u64, usize)> {
        let end = self.end;
        let step = max_frames.max(1);

        (self.start..end)
            .step_by(step)
            .map(move |first| {
                let len = (end - first).min(step as u64);
                (first, len as usize)
            })
    }
}
