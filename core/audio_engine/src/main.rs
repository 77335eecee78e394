use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::Context;
use audio_engine::{
    device::cpal_voice::CpalVoiceFactory,
    export,
    player::{AudioPlayer, PlayerConfig},
    provider::{AudioProvider, WavProvider},
};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use transport::range::ms_to_sample_ceil;

#[derive(Debug, Parser)]
#[command(version, about = "Play or cut ranges of a WAV file")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a range of a file on the default output device
    Play {
        file: PathBuf,
        #[arg(long, default_value_t = 0)]
        start_ms: i64,
        /// Defaults to the end of the file
        #[arg(long)]
        end_ms: Option<i64>,
        #[arg(long, default_value_t = 1.0)]
        volume: f64,
        /// Length of each queued buffer
        #[arg(long, default_value_t = PlayerConfig::default().latency_ms)]
        latency_ms: i32,
        #[arg(long, default_value_t = PlayerConfig::default().buffer_count)]
        buffers: i32,
    },
    /// Save a range of a file as a new WAV file
    Export {
        file: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 0)]
        start_ms: i64,
        #[arg(long)]
        end_ms: i64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Play {
            file,
            start_ms,
            end_ms,
            volume,
            latency_ms,
            buffers,
        } => {
            let config = PlayerConfig {
                latency_ms,
                buffer_count: buffers,
            };
            play(&file, start_ms, end_ms, volume, config)
        }
        Command::Export {
            file,
            output,
            start_ms,
            end_ms,
        } => {
            let provider = open_wav(&file)?;
            let range = export::save_clip(&provider, &output, start_ms, end_ms)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("Wrote {} frames to {}", range.len(), output.display());
            Ok(())
        }
    }
}

fn open_wav(path: &Path) -> anyhow::Result<WavProvider> {
    WavProvider::open(path).with_context(|| format!("opening {}", path.display()))
}

fn play(
    file: &Path,
    start_ms: i64,
    end_ms: Option<i64>,
    volume: f64,
    config: PlayerConfig,
) -> anyhow::Result<()> {
    let provider = open_wav(file)?;
    let rate = provider.format().sample_rate;
    let total = provider.num_samples() as i64;
    let start = ms_to_sample_ceil(start_ms, rate).clamp(0, total);
    let end = end_ms.map_or(total, |ms| ms_to_sample_ceil(ms, rate).clamp(start, total));

    let name = provider.name();
    info!("Playing {name} ({rate} Hz), frames {start}..{end}");
    let provider: Arc<dyn AudioProvider> = Arc::new(provider);
    let mut player = AudioPlayer::open(provider, CpalVoiceFactory::new(), config)?;
    player.set_volume(volume);
    player.play(start, end - start);

    while player.is_playing() {
        thread::sleep(Duration::from_millis(50));
    }

    if let Some(reason) = player.last_error() {
        anyhow::bail!("playback failed: {reason}");
    }
    info!("Playback finished");
    Ok(())
}
