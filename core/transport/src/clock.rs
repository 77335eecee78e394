use std::time::Instant;

/// Estimates the frame being heard from the wall-clock time elapsed since
/// playback last (re)started.
///
/// The estimate ignores device latency and underruns; it is only as good as
/// the assumption that the output consumes frames at exactly `sample_rate`.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    sample_rate: u32,
    start_frame: i64,
    restarted_at: Option<Instant>,
}

impl PlaybackClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            start_frame: 0,
            restarted_at: None,
        }
    }

    pub fn restart(&mut self, start_frame: i64) {
        self.restart_at(start_frame, Instant::now());
    }

    pub fn restart_at(&mut self, start_frame: i64, now: Instant) {
        self.start_frame = start_frame;
        self.restarted_at = Some(now);
    }

    pub fn stop(&mut self) {
        self.restarted_at = None;
    }

    /// Frame expected to be audible at `now`, or 0 when the clock is stopped.
    pub fn frame_at(&self, now: Instant) -> i64 {
        let Some(restarted_at) = self.restarted_at else {
            return 0;
        };

        let elapsed_ms = now.saturating_duration_since(restarted_at).as_millis() as i64;
        self.start_frame + elapsed_ms * i64::from(self.sample_rate) / 1000
    }

    pub fn current_frame(&self) -> i64 {
        self.frame_at(Instant::now())
    }
}
