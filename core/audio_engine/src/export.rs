use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use log::info;
use thiserror::Error;
use transport::range::SampleRange;

use crate::{
    constants::EXPORT_CHUNK_BYTES,
    provider::{AudioFormat, AudioProvider, AudioProviderExt},
};

/// Size of the RIFF/WAVE header written by [`write_header`].
pub const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write audio clip: {0}")]
    Io(#[from] io::Error),

    #[error("audio clip of {0} bytes does not fit in a WAV file")]
    DataTooLarge(u64),

    #[error("WAV header field `{0}` overflows for this format")]
    FieldOverflow(&'static str),
}

/// Writes `[start_ms, end_ms)` of `provider` to `path` as an uncompressed
/// WAV file in the provider's native sample format.
pub fn save_clip<P, Q>(
    provider: &P,
    path: Q,
    start_ms: i64,
    end_ms: i64,
) -> Result<SampleRange, ExportError>
where
    P: AudioProvider + ?Sized,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    let range = write_clip(provider, &mut out, start_ms, end_ms)?;
    out.flush()?;

    info!(
        target: "audio_provider",
        "Saved frames {}..{} to {}",
        range.start,
        range.end,
        path.display()
    );
    Ok(range)
}

/// Streams `[start_ms, end_ms)` of `provider` into `out` as a WAV file.
/// Returns the frame range that was written.
pub fn write_clip<P, W>(
    provider: &P,
    out: &mut W,
    start_ms: i64,
    end_ms: i64,
) -> Result<SampleRange, ExportError>
where
    P: AudioProvider + ?Sized,
    W: Write,
{
    let format = provider.format();
    let range = SampleRange::from_millis(
        start_ms,
        end_ms,
        format.sample_rate,
        provider.num_samples(),
    );
    let frame = format.bytes_per_frame();

    write_header(out, &format, range.len() * frame as u64)?;

    let frames_per_read = (EXPORT_CHUNK_BYTES / frame.max(1)).max(1);
    let mut buf = Vec::with_capacity(frames_per_read * frame);
    for (first, count) in range.chunks(frames_per_read) {
        buf.resize(count * frame, 0);
        provider.get_audio(&mut buf, first as i64);
        out.write_all(&buf)?;
    }

    Ok(range)
}

/// Writes the 44-byte canonical PCM header for `data_len` bytes of samples.
pub fn write_header<W: Write>(
    out: &mut W,
    format: &AudioFormat,
    data_len: u64,
) -> Result<(), ExportError> {
    let data_size = u32::try_from(data_len).map_err(|_| ExportError::DataTooLarge(data_len))?;
    let riff_size = data_size
        .checked_add(36)
        .ok_or(ExportError::DataTooLarge(data_len))?;
    let block_align = format
        .channels
        .checked_mul(format.bytes_per_sample)
        .ok_or(ExportError::FieldOverflow("block align"))?;
    let byte_rate = format
        .sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or(ExportError::FieldOverflow("byte rate"))?;
    let bits_per_sample = format
        .bytes_per_sample
        .checked_mul(8)
        .ok_or(ExportError::FieldOverflow("bits per sample"))?;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&riff_size.to_le_bytes());
    header.extend_from_slice(b"WAVEfmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&format.channels.to_le_bytes());
    header.extend_from_slice(&format.sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    out.write_all(&header)?;
    Ok(())
}
