//! The delivery engine: configuration, device lifecycle and ingestion.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::Configuration;
use crate::pipeline::RealtimeBackend;
use crate::platform::{stereo_endpoints, AudioHost, CpalHost};
use crate::sink::{CaptureSink, CaptureTarget};
use crate::stats::{DeliveryStats, StatsCounters};
use crate::{CaptureError, DeviceError, EngineError};

/// Delivers a producer's stereo stream to an output device and, optionally,
/// mirrors it into a WAV file.
///
/// All control operations take `&mut self` and run on the producer's thread.
/// The device's real-time callback only ever touches the slot ring, never
/// the engine.
///
/// # Lifecycle
///
/// 1. Created disabled by [`new()`](DeliveryEngine::new),
///    [`cpal()`](DeliveryEngine::cpal) or
///    [`without_backend()`](DeliveryEngine::without_backend)
/// 2. [`configure()`](DeliveryEngine::configure) with a device index opens
///    the device
/// 3. [`ingest()`](DeliveryEngine::ingest) feeds it; the call blocks when the
///    producer runs ahead of the device
/// 4. [`close()`](DeliveryEngine::close), or dropping the engine, stops it
///
/// # Example
///
/// ```no_run
/// use audio_delivery::DeliveryEngine;
///
/// let mut engine = DeliveryEngine::cpal();
/// for name in engine.enumerate_devices()? {
///     println!("{name}");
/// }
///
/// engine.configure(Some(0), 44_100.0, 0.1, 4, 3)?;
/// engine.set_output_file("session.wav")?;
///
/// let frame = [0i16; 2 * 735];
/// engine.ingest(&frame, 735)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DeliveryEngine<H: AudioHost = CpalHost> {
    host: Option<H>,
    config: Configuration,
    sink: CaptureSink,
    // Whether the open capture can be reopened by path on a rate change.
    capture_is_file: bool,
    backend: Option<RealtimeBackend<H::Stream>>,
    stats: Arc<StatsCounters>,
}

impl DeliveryEngine<CpalHost> {
    /// An engine over every output device of every available host API.
    pub fn cpal() -> Self {
        Self::new(CpalHost::new())
    }

    /// An engine with no audio platform.
    ///
    /// Captures still work. Enumeration returns an empty list and opening a
    /// device fails with [`DeviceError::NoBackend`].
    pub fn without_backend() -> Self {
        Self::with_host(None)
    }
}

impl<H: AudioHost> DeliveryEngine<H> {
    /// A disabled engine bound to `host`.
    pub fn new(host: H) -> Self {
        Self::with_host(Some(host))
    }

    fn with_host(host: Option<H>) -> Self {
        Self {
            host,
            config: Configuration::default(),
            sink: CaptureSink::new(),
            capture_is_file: false,
            backend: None,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Applies new output parameters.
    ///
    /// Every value is clamped (see [`Configuration::clamped()`]). When the
    /// clamped parameters equal the current ones nothing happens. Otherwise
    /// the open device, if any, is closed, and reopened when `device_index`
    /// is `Some`.
    ///
    /// A sample rate change also reopens the capture file at the new rate.
    /// Rates are compared rounded to whole Hz, as written in the WAV header,
    /// so a fractional change that rounds to the same rate keeps the capture
    /// going. Failing to reopen clears the capture and is reported as
    /// [`EngineError::Capture`], but only after the device has been reopened.
    /// Any device failure leaves the engine disabled and takes precedence.
    pub fn configure(
        &mut self,
        device_index: Option<usize>,
        sample_rate: f32,
        latency: f32,
        hw_periods: u32,
        sw_periods: u32,
    ) -> Result<(), EngineError> {
        let requested =
            Configuration::clamped(device_index, sample_rate, latency, hw_periods, sw_periods);
        if requested == self.config {
            return Ok(());
        }

        if let Some(backend) = self.backend.take() {
            if let Err(e) = backend.close() {
                self.config = requested.disabled();
                return Err(e.into());
            }
        }
        self.config = requested;

        let captured = self.reopen_capture();

        if requested.device_index.is_some() {
            if let Err(e) = self.open_device() {
                self.config = requested.disabled();
                if let Err(capture) = captured {
                    tracing::warn!("capture reopen also failed: {}", capture);
                }
                return Err(e.into());
            }
        }

        captured.map_err(EngineError::from)
    }

    /// Starts mirroring the stream into a WAV file at `path`.
    ///
    /// Any capture already open is finalized first. An empty path only
    /// closes. The file is written at the configured sample rate.
    pub fn set_output_file(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        let path = path.as_ref();
        let closed = self.close_capture();
        if path.as_os_str().is_empty() {
            return closed;
        }
        if let Err(e) = closed {
            tracing::warn!("previous capture not finalized: {}", e);
        }

        self.sink.open(path, self.config.sample_rate_hz())?;
        self.capture_is_file = true;
        Ok(())
    }

    /// Starts mirroring the stream into `target` instead of a file.
    ///
    /// `label` names the capture in errors and in
    /// [`output_file()`](DeliveryEngine::output_file). A target cannot be
    /// reopened, so a later sample rate change finalizes and drops it.
    pub fn set_output_target(
        &mut self,
        label: impl Into<PathBuf>,
        target: impl CaptureTarget + 'static,
    ) -> Result<(), CaptureError> {
        if let Err(e) = self.close_capture() {
            tracing::warn!("previous capture not finalized: {}", e);
        }
        self.sink
            .open_target(label, self.config.sample_rate_hz(), target)
    }

    /// Delivers `frame_count` interleaved stereo frames from `samples`.
    ///
    /// The frames go to the capture first, then to the device if one is
    /// open. `frame_count` is clamped to the whole frames in `samples`.
    ///
    /// Blocks while the ring is full, up to
    /// [`PRODUCER_TIMEOUT`](crate::PRODUCER_TIMEOUT) per period. A capture
    /// failure closes the capture and is returned after the device has been
    /// fed.
    pub fn ingest(&mut self, samples: &[i16], frame_count: usize) -> Result<(), CaptureError> {
        let frames = frame_count.min(samples.len() / 2);
        let samples = &samples[..frames * 2];

        let captured = self.sink.write(samples);
        if captured.is_err() {
            self.capture_is_file = false;
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.enqueue(samples);
            self.stats
                .frames_ingested
                .fetch_add(frames as u64, Ordering::Relaxed);
        }

        captured
    }

    /// Names of the stereo-capable output devices, as
    /// `"<device name> (<host API name>)"`.
    ///
    /// Positions in this list are the indices
    /// [`configure()`](DeliveryEngine::configure) accepts. Empty without a
    /// backend.
    pub fn enumerate_devices(&self) -> Result<Vec<String>, DeviceError> {
        let Some(host) = self.host.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(stereo_endpoints(host)?
            .iter()
            .map(|endpoint| endpoint.display_name())
            .collect())
    }

    /// Stops the device and disables the engine.
    ///
    /// Safe to call repeatedly. The capture is left open.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        self.config = self.config.disabled();
        match self.backend.take() {
            Some(backend) => backend.close(),
            None => Ok(()),
        }
    }

    /// The current (clamped) parameters.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Whether an output device is open.
    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    /// Path (or label) of the open capture.
    pub fn output_file(&self) -> Option<&Path> {
        self.sink.path()
    }

    /// Frames per device period while a device is open.
    pub fn period_frames(&self) -> Option<usize> {
        self.backend.as_ref().map(RealtimeBackend::period_frames)
    }

    /// Delivery counters accumulated since the engine was created.
    pub fn stats(&self) -> DeliveryStats {
        self.stats.snapshot()
    }

    fn open_device(&mut self) -> Result<(), DeviceError> {
        let host = self.host.as_ref().ok_or(DeviceError::NoBackend)?;
        let backend = RealtimeBackend::open(host, &self.config, Arc::clone(&self.stats))?;
        self.backend = Some(backend);
        Ok(())
    }

    /// Moves an open capture to the configured sample rate.
    fn reopen_capture(&mut self) -> Result<(), CaptureError> {
        let rate = self.config.sample_rate_hz();
        if !self.sink.is_open() || self.sink.sample_rate() == Some(rate) {
            return Ok(());
        }

        let path = self
            .capture_is_file
            .then(|| self.sink.path().map(Path::to_path_buf))
            .flatten();
        if let Err(e) = self.close_capture() {
            tracing::warn!("capture not finalized before reopen: {}", e);
        }

        match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), sample_rate = rate, "reopening capture");
                self.sink.open(&path, rate)?;
                self.capture_is_file = true;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn close_capture(&mut self) -> Result<(), CaptureError> {
        self.capture_is_file = false;
        self.sink.close()
    }
}

impl<H: AudioHost> Drop for DeliveryEngine<H> {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.take() {
            if let Err(e) = backend.close() {
                tracing::warn!("audio output did not stop cleanly: {}", e);
            }
        }
        if let Err(e) = self.sink.close() {
            tracing::warn!("capture not finalized: {}", e);
        }
    }
}
