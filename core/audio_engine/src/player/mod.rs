//! Threaded playback of an [`AudioProvider`] through a [`Voice`](crate::device::Voice).
//!
//! [`AudioPlayer`] is the control side. It owns a playback thread that keeps
//! a ring of buffers queued on the voice, refilling each one as the voice
//! hands it back. All control calls return promptly except [`AudioPlayer::play`],
//! which waits until the first buffers are queued.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{self, Sender};
use log::{debug, error, warn};
use thiserror::Error;
use transport::clock::PlaybackClock;

use crate::{
    constants::{DEFAULT_BUFFER_COUNT, DEFAULT_LATENCY_MS, MAX_QUEUED_BUFFERS},
    device::VoiceFactory,
    player::{
        command::{BufferReturn, PlayerCommand},
        status::Status,
    },
    provider::AudioProvider,
};

pub mod command;
pub(crate) mod engine;
pub(crate) mod slots;
pub(crate) mod status;
#[cfg(test)]
pub(crate) mod testing;

pub(crate) const LOG_TARGET: &str = "audio/player";

/// Ring sizing for the playback thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Length of one buffer, in milliseconds.
    pub latency_ms: i32,
    pub buffer_count: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_LATENCY_MS,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

impl PlayerConfig {
    /// Replaces non-positive values with the defaults and caps the ring at
    /// what a voice can hold.
    pub fn sanitized(self) -> Self {
        let latency_ms = if self.latency_ms <= 0 {
            DEFAULT_LATENCY_MS
        } else {
            self.latency_ms
        };
        let buffer_count = if self.buffer_count <= 0 {
            DEFAULT_BUFFER_COUNT
        } else {
            self.buffer_count.min(MAX_QUEUED_BUFFERS as i32)
        };

        Self {
            latency_ms,
            buffer_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("failed to open audio player: {0}")]
    OpenFailed(String),
}

#[derive(Debug)]
struct EngineHandle {
    commands: Sender<PlayerCommand>,
    status: Arc<Status>,
    thread: JoinHandle<()>,
}

impl EngineHandle {
    fn is_dead(&self) -> bool {
        self.status.has_error() || !self.status.is_running() || self.thread.is_finished()
    }
}

fn spawn_failed(e: io::Error) -> PlayerError {
    PlayerError::OpenFailed(format!("failed creating playback thread: {e}"))
}

/// Control handle for one playback thread.
///
/// Once the thread dies (voice failure or panic) every query answers
/// `false`/`0` and every control call is ignored; [`last_error`](Self::last_error)
/// keeps the reason.
#[derive(Debug)]
pub struct AudioPlayer {
    engine: Option<EngineHandle>,
    clock: PlaybackClock,
    end_frame: i64,
    last_error: Option<String>,
}

impl AudioPlayer {
    /// Spawns the playback thread and waits until its voice is open.
    pub fn open<F: VoiceFactory>(
        provider: Arc<dyn AudioProvider>,
        factory: F,
        config: PlayerConfig,
    ) -> Result<Self, PlayerError> {
        let config = config.sanitized();
        let sample_rate = provider.format().sample_rate;

        let (commands, receiver) = channel::unbounded();
        let (ready_tx, ready_rx) = channel::bounded(1);
        let status = Arc::new(Status::default());
        let completions = BufferReturn::new(commands.clone());
        let engine_status = Arc::clone(&status);

        let thread = thread::Builder::new()
            .name("audio-player".into())
            .spawn(move || {
                engine::run(
                    provider,
                    factory,
                    config,
                    receiver,
                    completions,
                    engine_status,
                    ready_tx,
                );
            })
            .map_err(spawn_failed)?;

        let failure = match ready_rx.recv() {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("playback thread exited during startup".to_owned()),
        };
        if let Some(reason) = failure {
            let _ = thread.join();
            error!(target: LOG_TARGET, "Failed opening audio player: {reason}");
            return Err(PlayerError::OpenFailed(reason));
        }

        debug!(
            target: LOG_TARGET,
            "Playback thread ready ({} ms x {} buffers)",
            config.latency_ms,
            config.buffer_count
        );
        Ok(Self {
            engine: Some(EngineHandle {
                commands,
                status,
                thread,
            }),
            clock: PlaybackClock::new(sample_rate),
            end_frame: 0,
            last_error: None,
        })
    }

    /// Plays `count` frames from `start`. Returns once playback has begun.
    pub fn play(&mut self, start: i64, count: i64) {
        let end = start.saturating_add(count);
        self.end_frame = end;

        let Some(engine) = self.live_engine() else {
            warn!(target: LOG_TARGET, "Ignoring play request: playback thread is gone");
            return;
        };

        let (ack, acked) = channel::bounded(1);
        let command = PlayerCommand::Play { start, end, ack };
        let started = engine.commands.send(command).is_ok() && acked.recv().is_ok();

        if started {
            self.clock.restart(start);
        } else {
            self.reap();
        }
    }

    pub fn stop(&mut self) {
        self.send(PlayerCommand::Stop);
    }

    pub fn is_playing(&mut self) -> bool {
        self.live_engine()
            .is_some_and(|engine| engine.status.is_playing())
    }

    /// Estimated frame being heard, extrapolated from when playback began.
    pub fn current_position(&mut self) -> i64 {
        if !self.is_playing() {
            return 0;
        }
        self.clock.current_frame()
    }

    pub fn end_position(&mut self) -> i64 {
        if self.live_engine().is_some() {
            self.end_frame
        } else {
            0
        }
    }

    /// Moves the end of the playing range. An end at or before what has
    /// already been queued stops playback.
    pub fn set_end_position(&mut self, end_frame: i64) {
        self.end_frame = end_frame;
        self.send(PlayerCommand::SetEnd(end_frame));
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.send(PlayerCommand::SetVolume(volume as f32));
    }

    pub fn is_thread_alive(&mut self) -> bool {
        self.live_engine().is_some()
    }

    /// Why the playback thread died, if it has.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn send(&mut self, command: PlayerCommand) {
        let Some(engine) = self.live_engine() else {
            return;
        };
        if engine.commands.send(command).is_err() {
            self.reap();
        }
    }

    fn live_engine(&mut self) -> Option<&EngineHandle> {
        if self.engine.as_ref().is_some_and(EngineHandle::is_dead) {
            self.reap();
        }
        self.engine.as_ref()
    }

    fn reap(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };

        let message = engine
            .status
            .error_message()
            .unwrap_or_else(|| "playback thread exited unexpectedly".to_owned());
        error!(target: LOG_TARGET, "Audio player died: {message}");
        let _ = engine.thread.join();

        self.clock.stop();
        self.last_error = Some(message);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        let _ = engine.commands.send(PlayerCommand::Terminate);
        if engine.thread.join().is_err() {
            error!(target: LOG_TARGET, "Playback thread panicked");
        }
    }
}
