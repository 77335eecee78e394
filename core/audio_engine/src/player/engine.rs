use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, warn};

use crate::{
    device::{SubmittedBuffer, Voice, VoiceError, VoiceFactory},
    player::{
        LOG_TARGET, PlayerConfig,
        command::{BufferReturn, PlayerCommand},
        slots::SlotArena,
        status::Status,
    },
    provider::{AudioFormat, AudioProvider, AudioProviderExt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// Opens a voice at the provider's native format, falling back once to
/// 16-bit mono when the backend rejects the native parameters.
pub(crate) fn open_voice<F: VoiceFactory>(
    factory: &mut F,
    native: AudioFormat,
    completions: &BufferReturn,
) -> Result<(F::Voice, AudioFormat), VoiceError> {
    match factory.open(&native, completions.clone()) {
        Ok(voice) => Ok((voice, native)),
        Err(VoiceError::InvalidParameters(reason)) => {
            let fallback = AudioFormat::mono_int16(native.sample_rate);
            debug!(
                target: LOG_TARGET,
                "Native format rejected ({reason}), retrying with 16-bit mono"
            );
            let voice = factory.open(&fallback, completions.clone())?;
            Ok((voice, fallback))
        }
        Err(e) => Err(e),
    }
}

/// Body of the playback thread.
///
/// Opens the voice, reports readiness through `ready`, then handles one
/// command per wake-up until told to terminate or the voice fails.
pub(crate) fn run<F: VoiceFactory>(
    provider: Arc<dyn AudioProvider>,
    mut factory: F,
    config: PlayerConfig,
    commands: Receiver<PlayerCommand>,
    completions: BufferReturn,
    status: Arc<Status>,
    ready: Sender<Result<(), VoiceError>>,
) {
    let (voice, format) = match open_voice(&mut factory, provider.format(), &completions) {
        Ok(opened) => opened,
        Err(e) => {
            status.report_error(format!("failed initializing voice: {e}"));
            let _ = ready.send(Err(e));
            return;
        }
    };
    drop(completions);

    let mut engine = Engine::new(provider, voice, format, &config, Arc::clone(&status));
    status.set_running(true);
    let _ = ready.send(Ok(()));

    while let Ok(command) = commands.recv() {
        if engine.handle(command) == Flow::Exit {
            break;
        }
    }

    status.set_running(false);
    debug!(target: LOG_TARGET, "Playback thread exiting");
}

pub(crate) struct Engine<V: Voice> {
    provider: Arc<dyn AudioProvider>,
    voice: V,
    status: Arc<Status>,
    /// `false` when the voice was opened with the 16-bit mono fallback.
    native: bool,
    block_align: usize,
    /// Frames per ring slot.
    wanted_frames: i64,
    slots: SlotArena,
    /// Conversion space for the mono fallback.
    scratch: Vec<i16>,
    next_input_frame: i64,
    end_frame: i64,
    playing: bool,
}

impl<V: Voice> Engine<V> {
    pub fn new(
        provider: Arc<dyn AudioProvider>,
        voice: V,
        format: AudioFormat,
        config: &PlayerConfig,
        status: Arc<Status>,
    ) -> Self {
        let block_align = format.bytes_per_frame();
        let period_ms = i64::from(config.latency_ms);
        let wanted_frames = (period_ms * i64::from(format.sample_rate) / 1000).max(1);
        let slot_bytes = wanted_frames as usize * block_align;
        let slots = SlotArena::new(config.buffer_count as usize, slot_bytes);

        Self {
            native: format == provider.format(),
            provider,
            voice,
            status,
            block_align,
            wanted_frames,
            slots,
            scratch: Vec::new(),
            next_input_frame: 0,
            end_frame: 0,
            playing: false,
        }
    }

    pub fn handle(&mut self, command: PlayerCommand) -> Flow {
        let mut reply = None;
        let result = match command {
            PlayerCommand::Play { start, end, ack } => {
                reply = Some(ack);
                self.play(start, end)
            }
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::SetEnd(end) => self.set_end(end),
            PlayerCommand::SetVolume(volume) => self.voice.set_volume(volume),
            PlayerCommand::BufferConsumed { slot, buffer } => self.buffer_consumed(slot, buffer),
            PlayerCommand::Terminate => {
                if let Err(e) = self.stop() {
                    warn!(target: LOG_TARGET, "Failed stopping voice on shutdown: {e}");
                }
                return Flow::Exit;
            }
        };

        match result {
            Ok(()) => {
                if let Some(ack) = reply {
                    let _ = ack.send(());
                }
                Flow::Continue
            }
            // `reply` is dropped only after the error is published
            Err(e) => {
                error!(target: LOG_TARGET, "Playback thread: {e}");
                self.status.report_error(format!("playback thread: {e}"));
                Flow::Exit
            }
        }
    }

    fn play(&mut self, start: i64, end: i64) -> Result<(), VoiceError> {
        self.voice.stop()?;
        self.voice.flush()?;

        self.next_input_frame = start;
        self.end_frame = end;
        self.playing = true;
        self.voice.start()?;
        self.status.set_playing(true);

        self.fill_buffers()
    }

    fn stop(&mut self) -> Result<(), VoiceError> {
        self.status.set_playing(false);
        self.playing = false;
        self.voice.stop()?;
        self.voice.flush()
    }

    fn set_end(&mut self, end: i64) -> Result<(), VoiceError> {
        self.end_frame = end;
        if end <= self.next_input_frame {
            return self.stop();
        }
        self.fill_buffers()
    }

    fn buffer_consumed(&mut self, slot: usize, buffer: Vec<u8>) -> Result<(), VoiceError> {
        if !self.slots.release(slot, buffer) {
            warn!(target: LOG_TARGET, "Voice returned buffer {slot}, which was not submitted");
        }
        self.fill_buffers()
    }

    /// Queues as many free slots as the remaining range allows.
    fn fill_buffers(&mut self) -> Result<(), VoiceError> {
        if !self.playing {
            return Ok(());
        }

        for slot in 0..self.slots.len() {
            if !self.slots.is_free(slot) {
                continue;
            }

            let fill_len = (self.end_frame - self.next_input_frame).min(self.wanted_frames);
            if fill_len <= 0 {
                break;
            }

            let Some(mut data) = self.slots.claim(slot) else {
                continue;
            };
            let bytes = fill_len as usize * self.block_align;
            debug_assert!(bytes <= self.slots.slot_bytes());
            data.resize(bytes, 0);
            self.read_frames(&mut data, fill_len as usize);
            self.next_input_frame += fill_len;

            self.voice.submit(SubmittedBuffer {
                slot,
                data,
                end_of_stream: self.next_input_frame == self.end_frame,
            })?;
        }

        if self.next_input_frame >= self.end_frame && self.slots.all_free() {
            debug!(target: LOG_TARGET, "Playback reached frame {}", self.end_frame);
            self.playing = false;
            self.status.set_playing(false);
        }

        Ok(())
    }

    fn read_frames(&mut self, data: &mut [u8], frames: usize) {
        if self.native {
            self.provider.get_audio(data, self.next_input_frame);
            return;
        }

        self.scratch.resize(frames, 0);
        self.provider
            .get_int16_mono_audio(&mut self.scratch, self.next_input_frame);
        for (bytes, sample) in data.chunks_exact_mut(2).zip(&self.scratch) {
            bytes.copy_from_slice(&sample.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam::channel::{self, Receiver};

    use super::*;
    use crate::{
        player::testing::{FakeFactory, FakeVoice, VoiceEvent, VoiceLog},
        provider::MemoryProvider,
    };

    const RATE: u32 = 1000;

    struct Harness {
        engine: Engine<FakeVoice>,
        returns: Receiver<PlayerCommand>,
        log: VoiceLog,
        status: Arc<Status>,
    }

    impl Harness {
        fn new(provider: MemoryProvider, mut factory: FakeFactory, buffer_count: i32) -> Self {
            let (sender, returns) = channel::unbounded();
            let completions = BufferReturn::new(sender);
            let log = factory.log.clone();
            let status = Arc::new(Status::default());
            let native = provider.format();
            let (voice, format) = open_voice(&mut factory, native, &completions).unwrap();
            let config = PlayerConfig {
                latency_ms: 100,
                buffer_count,
            };
            let provider = Arc::new(provider);
            let engine = Engine::new(provider, voice, format, &config, Arc::clone(&status));

            Self {
                engine,
                returns,
                log,
                status,
            }
        }

        fn play(&mut self, start: i64, end: i64) -> Flow {
            let (ack, acked) = channel::bounded(1);
            let flow = self.engine.handle(PlayerCommand::Play { start, end, ack });
            if flow == Flow::Continue {
                assert!(acked.try_recv().is_ok(), "play must be acknowledged");
            }
            flow
        }

        /// Delivers every buffer the voice has handed back so far.
        fn pump(&mut self) {
            while let Ok(command) = self.returns.try_recv() {
                self.engine.handle(command);
            }
        }

        fn complete(&mut self, count: usize) {
            for _ in 0..count {
                assert!(self.log.complete_next());
            }
            self.pump();
        }
    }

    fn ramp(frames: i16) -> MemoryProvider {
        let samples: Vec<i16> = (0..frames).collect();
        MemoryProvider::from_int16_mono(RATE, &samples)
    }

    fn first_sample(data: &[u8]) -> i16 {
        i16::from_le_bytes([data[0], data[1]])
    }

    #[test]
    fn test_play_fills_every_slot() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        assert_eq!(h.play(0, 1000), Flow::Continue);

        assert_eq!(
            h.log.submissions(),
            vec![(0, 200, false), (1, 200, false), (2, 200, false)]
        );
        assert!(h.status.is_playing());
        assert!(h.log.events().contains(&VoiceEvent::Start));
    }

    #[test]
    fn test_last_buffer_marked_end_of_stream() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 5);
        h.play(0, 250);

        assert_eq!(
            h.log.submissions(),
            vec![(0, 200, false), (1, 200, false), (2, 100, true)]
        );
        assert_eq!(first_sample(&h.log.submitted_data()[2]), 200);
    }

    #[test]
    fn test_consumed_buffer_is_refilled() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 1000);
        h.complete(1);

        let submissions = h.log.submissions();
        assert_eq!(submissions.len(), 4);
        assert_eq!(submissions[3], (0, 200, false));
        assert_eq!(first_sample(&h.log.submitted_data()[3]), 300);
    }

    #[test]
    fn test_set_end_before_cursor_stops_playback() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 1000);
        assert_eq!(h.engine.handle(PlayerCommand::SetEnd(200)), Flow::Continue);

        assert!(!h.status.is_playing());
        let events = h.log.events();
        assert!(events.ends_with(&[VoiceEvent::Stop, VoiceEvent::Flush]));

        // flushed buffers come back but nothing new is queued
        h.pump();
        assert_eq!(h.log.submissions().len(), 3);
    }

    #[test]
    fn test_set_end_extends_playback() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 150);
        assert_eq!(h.log.submissions(), vec![(0, 200, false), (1, 100, true)]);

        h.engine.handle(PlayerCommand::SetEnd(400));
        assert_eq!(h.log.submissions()[2], (2, 200, false));
        assert_eq!(first_sample(&h.log.submitted_data()[2]), 150);

        h.complete(2);
        let submissions = h.log.submissions();
        assert_eq!(&submissions[3..], &[(0, 200, false), (1, 100, true)]);
    }

    #[test]
    fn test_set_end_after_finish_queues_nothing() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 150);
        h.complete(2);
        assert!(!h.status.is_playing());

        let submitted = h.log.submissions().len();
        assert_eq!(h.engine.handle(PlayerCommand::SetEnd(400)), Flow::Continue);
        h.pump();
        assert_eq!(h.log.submissions().len(), submitted);
        assert!(!h.status.is_playing());
    }

    #[test]
    fn test_set_end_while_idle_queues_nothing() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        assert_eq!(h.engine.handle(PlayerCommand::SetEnd(400)), Flow::Continue);

        assert!(h.log.submissions().is_empty());
        assert!(!h.status.is_playing());
    }

    #[test]
    fn test_set_end_truncates_queued_range() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 1000);
        h.engine.handle(PlayerCommand::SetEnd(350));
        assert_eq!(h.log.submissions().len(), 3);

        h.complete(1);
        assert_eq!(h.log.submissions()[3], (0, 100, true));
        assert!(h.status.is_playing());
    }

    #[test]
    fn test_playback_finishes_when_all_buffers_return() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 150);
        h.complete(1);
        assert!(h.status.is_playing());

        h.complete(1);
        assert!(!h.status.is_playing());
    }

    #[test]
    fn test_restart_reuses_flushed_slots() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 1000);
        h.play(500, 600);

        // the ring is still owned by the voice until the flush is delivered
        assert_eq!(h.log.submissions().len(), 3);
        h.pump();

        let submissions = h.log.submissions();
        assert_eq!(&submissions[3..], &[(0, 200, true)]);
        assert_eq!(first_sample(&h.log.submitted_data()[3]), 500);
    }

    #[test]
    fn test_start_before_stream_is_padded() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 1);
        h.play(-50, 50);

        let data = &h.log.submitted_data()[0];
        assert_eq!(data.len(), 200);
        assert!(data[..100].iter().all(|&b| b == 0));
        assert_eq!(i16::from_le_bytes([data[100], data[101]]), 0);
        assert_eq!(i16::from_le_bytes([data[198], data[199]]), 49);
    }

    #[test]
    fn test_volume_forwarded_to_voice() {
        let mut h = Harness::new(ramp(10), FakeFactory::default(), 3);
        h.engine.handle(PlayerCommand::SetVolume(0.5));
        assert_eq!(h.log.events().last(), Some(&VoiceEvent::Volume(0.5)));
    }

    #[test]
    fn test_native_format_kept_when_accepted() {
        let format = AudioFormat {
            sample_rate: RATE,
            channels: 2,
            bytes_per_sample: 2,
            float_samples: false,
        };
        let provider = MemoryProvider::new(format, vec![0; 4000]);
        let mut h = Harness::new(provider, FakeFactory::default(), 2);
        assert_eq!(h.log.opened(), vec![format]);

        h.play(0, 1000);
        assert_eq!(h.log.submissions(), vec![(0, 400, false), (1, 400, false)]);
    }

    #[test]
    fn test_rejected_format_falls_back_to_mono() {
        let format = AudioFormat {
            sample_rate: RATE,
            channels: 2,
            bytes_per_sample: 1,
            float_samples: false,
        };
        let provider = MemoryProvider::new(format, vec![255, 255, 0, 0, 128, 128]);
        let factory = FakeFactory {
            reject_native: true,
            ..FakeFactory::default()
        };
        let mut h = Harness::new(provider, factory, 3);
        assert_eq!(h.log.opened(), vec![format, AudioFormat::mono_int16(RATE)]);

        h.play(0, 3);
        let expected: Vec<u8> = [32512i16, -32768, 0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(h.log.submitted_data(), vec![expected]);
    }

    #[test]
    fn test_submit_failure_is_fatal() {
        let factory = FakeFactory {
            fail_submit_after: Some(1),
            ..FakeFactory::default()
        };
        let mut h = Harness::new(ramp(1000), factory, 3);

        assert_eq!(h.play(0, 1000), Flow::Exit);
        assert!(h.status.has_error());
        assert!(!h.status.is_playing());
        let message = h.status.error_message().unwrap();
        assert!(message.contains("failed to submit"));
    }

    #[test]
    fn test_terminate_stops_voice() {
        let mut h = Harness::new(ramp(1000), FakeFactory::default(), 3);
        h.play(0, 1000);
        assert_eq!(h.engine.handle(PlayerCommand::Terminate), Flow::Exit);

        let events = h.log.events();
        assert!(events.ends_with(&[VoiceEvent::Stop, VoiceEvent::Flush]));
        assert!(!h.status.is_playing());
    }
}
