//! Scripted voice backend for driving the playback thread in tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    device::{SubmittedBuffer, Voice, VoiceError, VoiceFactory},
    player::command::BufferReturn,
    provider::AudioFormat,
};

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Opened(AudioFormat),
    Start,
    Stop,
    Flush,
    Submit {
        slot: usize,
        bytes: usize,
        end_of_stream: bool,
    },
    Volume(f32),
}

#[derive(Debug, Default)]
struct LogState {
    events: Vec<VoiceEvent>,
    submitted_data: Vec<Vec<u8>>,
    queued: VecDeque<SubmittedBuffer>,
    completions: Option<BufferReturn>,
}

/// Everything the fake voice saw, shared with the test body.
#[derive(Debug, Clone, Default)]
pub struct VoiceLog {
    state: Arc<Mutex<LogState>>,
}

impl VoiceLog {
    fn push(&self, event: VoiceEvent) {
        self.state.lock().unwrap().events.push(event);
    }

    pub fn events(&self) -> Vec<VoiceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn opened(&self) -> Vec<AudioFormat> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                VoiceEvent::Opened(format) => Some(format),
                _ => None,
            })
            .collect()
    }

    /// `(slot, bytes, end_of_stream)` of every submission, in order.
    pub fn submissions(&self) -> Vec<(usize, usize, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                VoiceEvent::Submit {
                    slot,
                    bytes,
                    end_of_stream,
                } => Some((slot, bytes, end_of_stream)),
                _ => None,
            })
            .collect()
    }

    pub fn submitted_data(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().submitted_data.clone()
    }

    pub fn queued(&self) -> usize {
        self.state.lock().unwrap().queued.len()
    }

    /// Finishes the oldest queued buffer as if it had been played.
    pub fn complete_next(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(buffer) = state.queued.pop_front() else {
            return false;
        };
        if let Some(completions) = &state.completions {
            completions.give_back(buffer.slot, buffer.data);
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct FakeFactory {
    pub log: VoiceLog,
    /// Reject every format except 16-bit mono.
    pub reject_native: bool,
    pub open_error: Option<VoiceError>,
    /// Number of submissions accepted before `submit` starts failing.
    pub fail_submit_after: Option<usize>,
}

impl VoiceFactory for FakeFactory {
    type Voice = FakeVoice;

    fn open(
        &mut self,
        format: &AudioFormat,
        completions: BufferReturn,
    ) -> Result<FakeVoice, VoiceError> {
        self.log.push(VoiceEvent::Opened(*format));
        if let Some(e) = self.open_error.clone() {
            return Err(e);
        }
        if self.reject_native && !format.is_mono_int16() {
            return Err(VoiceError::InvalidParameters("format not supported".into()));
        }

        self.log.state.lock().unwrap().completions = Some(completions);
        Ok(FakeVoice {
            log: self.log.clone(),
            submitted: 0,
            fail_submit_after: self.fail_submit_after,
        })
    }
}

#[derive(Debug)]
pub struct FakeVoice {
    log: VoiceLog,
    submitted: usize,
    fail_submit_after: Option<usize>,
}

impl Voice for FakeVoice {
    fn start(&mut self) -> Result<(), VoiceError> {
        self.log.push(VoiceEvent::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), VoiceError> {
        self.log.push(VoiceEvent::Stop);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), VoiceError> {
        self.log.push(VoiceEvent::Flush);
        while self.log.complete_next() {}
        Ok(())
    }

    fn submit(&mut self, buffer: SubmittedBuffer) -> Result<(), VoiceError> {
        let exhausted = self.fail_submit_after.is_some_and(|n| self.submitted >= n);
        if exhausted {
            return Err(VoiceError::SubmitFailed("device removed".into()));
        }
        self.submitted += 1;

        let mut state = self.log.state.lock().unwrap();
        state.events.push(VoiceEvent::Submit {
            slot: buffer.slot,
            bytes: buffer.data.len(),
            end_of_stream: buffer.end_of_stream,
        });
        state.submitted_data.push(buffer.data.clone());
        state.queued.push_back(buffer);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), VoiceError> {
        self.log.push(VoiceEvent::Volume(volume));
        Ok(())
    }
}
