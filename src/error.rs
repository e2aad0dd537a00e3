//! Error types for audio-delivery.
//!
//! Errors are split by what they take down:
//! - **Device errors** ([`DeviceError`]): the output device could not be
//!   enumerated, opened or stopped. The engine is left disabled.
//! - **Capture errors** ([`CaptureError`]): the WAV mirror failed. Only the
//!   capture sink is closed; playback is unaffected.
//!
//! Out-of-range configuration values and underruns are not errors. The first
//! are clamped, the second are replaced with silence and counted in
//! [`DeliveryStats`](crate::DeliveryStats).

use std::path::PathBuf;

/// Failures of the output device path.
///
/// Returned synchronously from [`DeliveryEngine::configure()`],
/// [`DeliveryEngine::close()`] and [`DeliveryEngine::enumerate_devices()`].
///
/// [`DeliveryEngine::configure()`]: crate::DeliveryEngine::configure
/// [`DeliveryEngine::close()`]: crate::DeliveryEngine::close
/// [`DeliveryEngine::enumerate_devices()`]: crate::DeliveryEngine::enumerate_devices
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The engine was created without a platform backend.
    #[error("no audio backend available")]
    NoBackend,

    /// The platform reports no output endpoints at all.
    #[error("no audio device is available")]
    NoDevices,

    /// The device index is past the end of the stereo-capable device list.
    #[error("device number {index} is out of range ({available} devices available)")]
    IndexOutOfRange {
        /// The requested position in the filtered device list.
        index: usize,
        /// Number of devices in the filtered list.
        available: usize,
    },

    /// The endpoint disappeared between enumeration and open.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the endpoint that could not be resolved.
        name: String,
    },

    /// The device has no stereo configuration in a sample format we can feed.
    #[error("unsupported output format: {format}")]
    UnsupportedFormat {
        /// Description of what the device offered.
        format: String,
    },

    /// The device cannot run at the configured sample rate.
    #[error("sample rate {requested}Hz not supported by device")]
    UnsupportedSampleRate {
        /// The rate that was asked for.
        requested: u32,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),
}

/// Failures of the WAV capture sink.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The capture file could not be created.
    #[error("error opening output sound file {path}: {source}")]
    Open {
        /// Path of the capture file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing samples failed, usually because the disk is full.
    #[error("error writing sound file {path} (is the disk full?): {source}")]
    ShortWrite {
        /// Path of the capture file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The header could not be finalized when closing the file.
    #[error("error finalizing sound file {path}: {source}")]
    Finalize {
        /// Path of the capture file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sink was asked to open while no sample rate is configured.
    #[error("cannot open sound file {path}: no sample rate configured")]
    InvalidSampleRate {
        /// Path of the capture file.
        path: PathBuf,
    },
}

impl CaptureError {
    /// Path of the capture file this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Open { path, .. }
            | Self::ShortWrite { path, .. }
            | Self::Finalize { path, .. }
            | Self::InvalidSampleRate { path } => path,
        }
    }
}

/// Either kind of failure, returned by [`DeliveryEngine::configure()`].
///
/// [`DeliveryEngine::configure()`]: crate::DeliveryEngine::configure
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The device could not be (re)opened or closed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// The capture file could not be reopened at the new sample rate.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
