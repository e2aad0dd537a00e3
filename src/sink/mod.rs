//! Capture of the delivered stream.
//!
//! [`CaptureSink`] mirrors every ingested frame into a 16-bit stereo WAV
//! container. It runs on the control thread, next to the producer, and is
//! independent of the output device: a sink failure closes the sink and
//! nothing else.
//!
//! The destination is normally a file, but anything implementing
//! [`CaptureTarget`] can stand in for one.

mod file;

pub use file::CaptureSink;

use std::io::{Seek, Write};

/// A seekable byte destination for captured audio.
///
/// Seeking is needed to patch the WAV header sizes when the capture closes.
/// Implemented for every `Write + Seek + Send` type, so a
/// `BufWriter<File>` or an in-memory `Cursor<Vec<u8>>` both qualify.
pub trait CaptureTarget: Write + Seek + Send {}

impl<T: Write + Seek + Send> CaptureTarget for T {}
