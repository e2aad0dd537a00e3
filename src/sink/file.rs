//! WAV capture sink implementation.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::CaptureTarget;
use crate::platform::OUTPUT_CHANNELS;
use crate::CaptureError;

// WAV file format constants
// See: http://soundfile.sapp.org/doc/WaveFormat/

/// Byte offset of the file size field in WAV header (RIFF chunk size).
const WAV_FILE_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field in WAV header.
const WAV_DATA_SIZE_OFFSET: u64 = 40;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
const WAV_HEADER_SIZE: u32 = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Bytes per sample (16-bit = 2 bytes).
const BYTES_PER_SAMPLE: u64 = 2;

/// Largest data chunk a RIFF size field can describe.
const MAX_DATA_SIZE: u64 = (u32::MAX - (WAV_HEADER_SIZE - 8)) as u64;

/// Mirrors the delivered stream into a 16-bit stereo WAV file.
///
/// The sink is either closed, or open with a path and a sample rate. The
/// header is written with placeholder sizes on open and patched on
/// [`close()`](CaptureSink::close) (or drop).
///
/// # Example
///
/// ```no_run
/// use audio_delivery::CaptureSink;
///
/// let mut sink = CaptureSink::new();
/// sink.open("session.wav", 48_000)?;
/// sink.write(&[100, -100, 200, -200])?;
/// sink.close()?;
/// # Ok::<(), audio_delivery::CaptureError>(())
/// ```
#[derive(Default)]
pub struct CaptureSink {
    file: Option<OpenCapture>,
}

struct OpenCapture {
    path: PathBuf,
    writer: Box<dyn CaptureTarget>,
    sample_rate: u32,
    samples_written: u64,
    // Reused between writes so each batch is one `write_all`.
    encoded: Vec<u8>,
}

impl CaptureSink {
    /// Creates a closed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or truncates) `path` and writes a stereo WAV header at
    /// `sample_rate`.
    ///
    /// Any capture already open is closed first. On failure the sink stays
    /// closed.
    pub fn open(&mut self, path: impl AsRef<Path>, sample_rate: u32) -> Result<(), CaptureError> {
        let path = path.as_ref();
        self.close_quietly();

        if sample_rate == 0 {
            return Err(CaptureError::InvalidSampleRate {
                path: path.to_path_buf(),
            });
        }

        let file = File::create(path).map_err(|e| CaptureError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.open_target(path, sample_rate, BufWriter::new(file))
    }

    /// Starts a capture into an arbitrary seekable target.
    ///
    /// `path` only labels the capture in errors and in
    /// [`path()`](CaptureSink::path).
    pub fn open_target(
        &mut self,
        path: impl Into<PathBuf>,
        sample_rate: u32,
        target: impl CaptureTarget + 'static,
    ) -> Result<(), CaptureError> {
        let path = path.into();
        self.close_quietly();

        if sample_rate == 0 {
            return Err(CaptureError::InvalidSampleRate { path });
        }

        let mut writer: Box<dyn CaptureTarget> = Box::new(target);
        // Placeholder sizes, patched on close
        if let Err(e) = write_wav_header(&mut *writer, sample_rate, 0) {
            return Err(CaptureError::Open { path, source: e });
        }

        tracing::debug!(path = %path.display(), sample_rate, "capture file opened");
        self.file = Some(OpenCapture {
            path,
            writer,
            sample_rate,
            samples_written: 0,
            encoded: Vec::new(),
        });
        Ok(())
    }

    /// Appends interleaved stereo samples.
    ///
    /// Each call is encoded into one write and flushed before returning.
    /// Does nothing while closed. A failed write closes the sink and clears
    /// its path.
    pub fn write(&mut self, samples: &[i16]) -> Result<(), CaptureError> {
        let Some(capture) = self.file.as_mut() else {
            return Ok(());
        };

        tracing::trace!(
            "CaptureSink {}: writing {} samples",
            capture.path.display(),
            samples.len()
        );

        match capture.write_samples(samples) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Patches the header sizes, flushes and closes the capture.
    ///
    /// Closing a closed sink is a no-op.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut capture) = self.file.take() else {
            return Ok(());
        };

        tracing::debug!(
            path = %capture.path.display(),
            frames = capture.samples_written / u64::from(OUTPUT_CHANNELS),
            "capture file closed"
        );
        capture.finalize().map_err(|e| CaptureError::Finalize {
            path: capture.path,
            source: e,
        })
    }

    /// Path of the open capture, or `None` while closed.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|c| c.path.as_path())
    }

    /// Whether a capture is open.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Sample rate written into the open capture's header.
    pub fn sample_rate(&self) -> Option<u32> {
        self.file.as_ref().map(|c| c.sample_rate)
    }

    /// Stereo frames written to the open capture.
    pub fn frames_written(&self) -> u64 {
        self.file
            .as_ref()
            .map_or(0, |c| c.samples_written / u64::from(OUTPUT_CHANNELS))
    }

    /// Drops the capture after a failed write.
    fn abort(&mut self, source: std::io::Error) -> CaptureError {
        let path = match self.file.take() {
            Some(mut capture) => {
                // The disk is most likely full; try to leave a readable header anyway.
                let _ = capture.finalize();
                capture.path
            }
            None => PathBuf::new(),
        };
        tracing::warn!(path = %path.display(), "capture write failed: {}", source);
        CaptureError::ShortWrite { path, source }
    }

    fn close_quietly(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("{}", e);
        }
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        self.close_quietly();
    }
}

impl OpenCapture {
    fn write_samples(&mut self, samples: &[i16]) -> std::io::Result<()> {
        self.encoded.clear();
        self.encoded
            .extend(samples.iter().flat_map(|sample| sample.to_le_bytes()));
        self.writer.write_all(&self.encoded)?;
        // Surface a full disk on the batch that hit it, not at close.
        self.writer.flush()?;
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> std::io::Result<()> {
        let data_size = (self.samples_written * BYTES_PER_SAMPLE).min(MAX_DATA_SIZE) as u32;
        update_wav_header(&mut *self.writer, data_size)?;
        self.writer.flush()
    }
}

/// Writes a complete WAV header for 16-bit stereo PCM.
///
/// The header includes RIFF, fmt, and data chunk headers (44 bytes total).
fn write_wav_header(
    writer: &mut dyn CaptureTarget,
    sample_rate: u32,
    data_size: u32,
) -> std::io::Result<()> {
    let channels = OUTPUT_CHANNELS;

    // RIFF container header
    writer.write_all(b"RIFF")?;
    let file_size = WAV_HEADER_SIZE - 8 + data_size; // Total size minus RIFF header
    writer.write_all(&file_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt subchunk (format specification)
    writer.write_all(b"fmt ")?;
    writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
    writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;

    let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
    writer.write_all(&byte_rate.to_le_bytes())?;

    let block_align = channels * bytes_per_sample;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

    // data subchunk header
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;

    Ok(())
}

/// Updates the WAV header with the final data size.
///
/// This seeks back to update the file size and data size fields.
fn update_wav_header(writer: &mut dyn CaptureTarget, data_size: u32) -> std::io::Result<()> {
    // Update RIFF chunk size (file size - 8)
    let file_size = WAV_HEADER_SIZE - 8 + data_size;
    writer.seek(SeekFrom::Start(WAV_FILE_SIZE_OFFSET))?;
    writer.write_all(&file_size.to_le_bytes())?;

    // Update data chunk size
    writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
    writer.write_all(&data_size.to_le_bytes())?;

    // Seek to end for any further writes
    writer.seek(SeekFrom::End(0))?;

    Ok(())
}
