use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use cpal::{
    FromSample, OutputCallbackInfo, SampleFormat, SampleRate, SizedSample, SupportedStreamConfig,
    SupportedStreamConfigRange,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{debug, error};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::{
    constants::MAX_QUEUED_BUFFERS,
    convert::SampleKind,
    device::{SubmittedBuffer, Voice, VoiceError, VoiceFactory},
    player::command::BufferReturn,
    provider::AudioFormat,
};

const LOG_TARGET: &str = "audio/player";

/// Room for a full ring of submissions plus control traffic.
const COMMAND_QUEUE_LEN: usize = MAX_QUEUED_BUFFERS * 4;

/// Messages from the playback thread to the audio callback.
#[derive(Debug)]
enum VoiceCommand {
    Submit(SubmittedBuffer),
    Start,
    Stop,
    Flush,
    SetVolume(f32),
}

/// Device sample formats the callback can render into.
const RENDERABLE_FORMATS: [SampleFormat; 6] = [
    SampleFormat::F32,
    SampleFormat::F64,
    SampleFormat::I16,
    SampleFormat::I32,
    SampleFormat::U16,
    SampleFormat::U8,
];

type SharedFailure = Arc<Mutex<Option<String>>>;

fn read_failure(failure: &SharedFailure) -> Option<String> {
    let guard = failure.lock().unwrap_or_else(PoisonError::into_inner);
    guard.clone()
}

/// Opens voices on the default output device of the default host.
///
/// A format is accepted only when the device can run at its sample rate,
/// either with the same channel count or, for mono input, with any channel
/// count (the signal is copied to every channel).
#[derive(Debug, Default)]
pub struct CpalVoiceFactory;

impl CpalVoiceFactory {
    pub fn new() -> Self {
        Self
    }

    fn negotiate(
        device: &cpal::Device,
        format: &AudioFormat,
    ) -> Result<SupportedStreamConfig, VoiceError> {
        let rate = SampleRate(format.sample_rate);
        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| VoiceError::StreamBuildFailed(e.to_string()))?
            .filter(|range| {
                range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
                    && RENDERABLE_FORMATS.contains(&range.sample_format())
            })
            .collect();

        let exact = ranges.iter().find(|r| r.channels() == format.channels);
        let upmixed = || {
            if format.channels == 1 {
                ranges.first()
            } else {
                None
            }
        };

        exact
            .or_else(upmixed)
            .map(|range| range.clone().with_sample_rate(rate))
            .ok_or_else(|| {
                VoiceError::InvalidParameters(format!(
                    "device cannot play {} channels at {} Hz",
                    format.channels, format.sample_rate
                ))
            })
    }

    fn open_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut output: VoiceOutput,
        failure: SharedFailure,
    ) -> Result<cpal::Stream, VoiceError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let error_cb = move |err: cpal::StreamError| {
            error!(target: LOG_TARGET, "Stream error: {err}");
            *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
        };

        let data_cb = move |data: &mut [T], _: &OutputCallbackInfo| {
            output.render(data);
        };

        device
            .build_output_stream(config, data_cb, error_cb, None)
            .map_err(|e| VoiceError::StreamBuildFailed(e.to_string()))
    }
}

impl VoiceFactory for CpalVoiceFactory {
    type Voice = CpalVoice;

    fn open(
        &mut self,
        format: &AudioFormat,
        completions: BufferReturn,
    ) -> Result<CpalVoice, VoiceError> {
        let kind = match SampleKind::from_format(format) {
            Ok(kind) => kind,
            Err(e) => return Err(VoiceError::InvalidParameters(e.to_string())),
        };

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(VoiceError::DeviceNotFound)?;

        let supported = Self::negotiate(&device, format)?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        debug!(
            target: LOG_TARGET,
            "Opening voice: {} Hz, {} -> {} channels, device samples {sample_format}",
            format.sample_rate,
            format.channels,
            config.channels
        );

        let (producer, consumer) = RingBuffer::new(COMMAND_QUEUE_LEN);
        let output = VoiceOutput::new(
            consumer,
            completions,
            kind,
            usize::from(format.channels),
            usize::from(config.channels),
        );
        let failure = SharedFailure::default();
        let shared = Arc::clone(&failure);

        let stream = match sample_format {
            SampleFormat::F32 => Self::open_stream::<f32>(&device, &config, output, shared)?,
            SampleFormat::F64 => Self::open_stream::<f64>(&device, &config, output, shared)?,
            SampleFormat::I16 => Self::open_stream::<i16>(&device, &config, output, shared)?,
            SampleFormat::I32 => Self::open_stream::<i32>(&device, &config, output, shared)?,
            SampleFormat::U16 => Self::open_stream::<u16>(&device, &config, output, shared)?,
            SampleFormat::U8 => Self::open_stream::<u8>(&device, &config, output, shared)?,
            other => {
                return Err(VoiceError::InvalidParameters(format!(
                    "unsupported device sample format '{other}'"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| VoiceError::StreamStartFailed(e.to_string()))?;

        Ok(CpalVoice {
            _stream: stream,
            commands: producer,
            failure,
        })
    }
}

/// A running cpal output stream fed through a lock-free command queue.
///
/// The stream runs for the life of the voice; `start`/`stop` only gate
/// whether the callback consumes queued buffers or renders silence.
pub struct CpalVoice {
    _stream: cpal::Stream,
    commands: Producer<VoiceCommand>,
    failure: SharedFailure,
}

impl fmt::Debug for CpalVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalVoice").finish_non_exhaustive()
    }
}

impl CpalVoice {
    fn send(&mut self, command: VoiceCommand) -> Result<(), VoiceError> {
        if let Some(reason) = read_failure(&self.failure) {
            return Err(VoiceError::DeviceLost(reason));
        }

        self.commands
            .push(command)
            .map_err(|_| VoiceError::SubmitFailed("command queue is full".into()))
    }
}

impl Voice for CpalVoice {
    fn start(&mut self) -> Result<(), VoiceError> {
        self.send(VoiceCommand::Start)
    }

    fn stop(&mut self) -> Result<(), VoiceError> {
        self.send(VoiceCommand::Stop)
    }

    fn flush(&mut self) -> Result<(), VoiceError> {
        self.send(VoiceCommand::Flush)
    }

    fn submit(&mut self, buffer: SubmittedBuffer) -> Result<(), VoiceError> {
        self.send(VoiceCommand::Submit(buffer))
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), VoiceError> {
        self.send(VoiceCommand::SetVolume(volume))
    }
}

/// State owned by the audio callback.
struct VoiceOutput {
    commands: Consumer<VoiceCommand>,
    completions: BufferReturn,
    queue: VecDeque<SubmittedBuffer>,
    /// Byte offset into the front buffer.
    cursor: usize,
    kind: SampleKind,
    source_channels: usize,
    device_channels: usize,
    running: bool,
    gain: f32,
}

impl VoiceOutput {
    fn new(
        commands: Consumer<VoiceCommand>,
        completions: BufferReturn,
        kind: SampleKind,
        source_channels: usize,
        device_channels: usize,
    ) -> Self {
        Self {
            commands,
            completions,
            queue: VecDeque::with_capacity(MAX_QUEUED_BUFFERS),
            cursor: 0,
            kind,
            source_channels: source_channels.max(1),
            device_channels: device_channels.max(1),
            running: false,
            gain: 1.0,
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                VoiceCommand::Submit(buffer) => self.queue.push_back(buffer),
                VoiceCommand::Start => self.running = true,
                VoiceCommand::Stop => self.running = false,
                VoiceCommand::Flush => {
                    for buffer in self.queue.drain(..) {
                        self.completions.give_back(buffer.slot, buffer.data);
                    }
                    self.cursor = 0;
                }
                VoiceCommand::SetVolume(gain) => self.gain = gain,
            }
        }
    }

    fn render<T>(&mut self, data: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        self.drain_commands();

        let width = self.kind.width();
        let frame_bytes = width * self.source_channels;

        for frame in data.chunks_mut(self.device_channels) {
            let finished = match self.queue.front() {
                Some(buffer) if self.running => {
                    let end = self.cursor + frame_bytes;
                    match buffer.data.get(self.cursor..end) {
                        Some(source) => {
                            for (channel, out) in frame.iter_mut().enumerate() {
                                let offset = (channel % self.source_channels) * width;
                                let sample = self.kind.to_f32(&source[offset..offset + width]);
                                *out = T::from_sample(sample * self.gain);
                            }
                            self.cursor = end;
                        }
                        // partial trailing frame
                        None => {
                            frame.fill(T::EQUILIBRIUM);
                            self.cursor = buffer.data.len();
                        }
                    }
                    self.cursor >= buffer.data.len()
                }
                _ => {
                    frame.fill(T::EQUILIBRIUM);
                    false
                }
            };

            if finished {
                if let Some(buffer) = self.queue.pop_front() {
                    self.completions.give_back(buffer.slot, buffer.data);
                }
                self.cursor = 0;
            }
        }
    }
}
