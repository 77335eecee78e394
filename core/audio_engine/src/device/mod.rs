use thiserror::Error;

use crate::{player::command::BufferReturn, provider::AudioFormat};

pub mod cpal_voice;

#[derive(Clone, Debug, Error)]
pub enum VoiceError {
    /// The backend cannot play this format; the caller may retry with another.
    #[error("invalid voice parameters: {0}")]
    InvalidParameters(String),

    #[error("no audio output device found")]
    DeviceNotFound,

    #[error("failed to build output stream: {0}")]
    StreamBuildFailed(String),

    #[error("failed to start output stream: {0}")]
    StreamStartFailed(String),

    #[error("failed to submit buffer: {0}")]
    SubmitFailed(String),

    #[error("audio device failed: {0}")]
    DeviceLost(String),
}

/// A block of frames handed to a voice.
///
/// The voice owns `data` until playback of it has finished (or it was
/// flushed), then returns it through [`BufferReturn::give_back`] tagged
/// with the same `slot`.
#[derive(Debug)]
pub struct SubmittedBuffer {
    pub slot: usize,
    pub data: Vec<u8>,
    /// Set on the last buffer before the end of the playback range.
    pub end_of_stream: bool,
}

/// A hardware voice playing a queue of buffers in one fixed format.
pub trait Voice {
    fn start(&mut self) -> Result<(), VoiceError>;

    /// Pauses consumption; queued buffers stay queued.
    fn stop(&mut self) -> Result<(), VoiceError>;

    /// Drops every queued buffer, returning each one through the completion channel.
    fn flush(&mut self) -> Result<(), VoiceError>;

    fn submit(&mut self, buffer: SubmittedBuffer) -> Result<(), VoiceError>;

    /// Output gain, 1.0 is unchanged.
    fn set_volume(&mut self, volume: f32) -> Result<(), VoiceError>;
}

/// Opens voices. Moved onto the playback thread, which then owns every voice
/// it opens, so voices themselves do not need to be `Send`.
pub trait VoiceFactory: Send + 'static {
    type Voice: Voice;

    fn open(
        &mut self,
        format: &AudioFormat,
        completions: BufferReturn,
    ) -> Result<Self::Voice, VoiceError>;
}
