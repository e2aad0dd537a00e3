//! Audio platform abstraction.
//!
//! The engine needs three things from a platform: the list of output
//! endpoints, a way to open a stereo 16-bit stream on one of them whose
//! real-time callback drives a [`SlotReader`], and a way to stop that stream.
//!
//! - [`CpalHost`]: every output device of every host API CPAL can reach
//! - [`MockHost`]: in-memory endpoints and a manually driven callback for
//!   tests without audio hardware

mod cpal_output;
mod mock;

pub use cpal_output::{CpalHost, CpalStream};
pub use mock::{MockDevice, MockEndpoint, MockHost, MockStream};

use std::time::Duration;

use crate::{DeviceError, SlotReader};

/// Output channels the engine always renders.
pub const OUTPUT_CHANNELS: u16 = 2;

/// One output endpoint as the platform reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Position in the platform's full, unfiltered endpoint list.
    pub raw_index: usize,
    /// Device name.
    pub name: String,
    /// Name of the host API serving the device (ALSA, WASAPI, ...).
    pub host_api: String,
    /// Most output channels any of the device's configurations offers.
    pub max_output_channels: u16,
}

impl Endpoint {
    /// Whether the endpoint can play interleaved stereo.
    pub fn is_stereo_capable(&self) -> bool {
        self.max_output_channels >= OUTPUT_CHANNELS
    }

    /// `"<device name> (<host API name>)"`, as shown in device lists.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.host_api)
    }
}

/// Parameters of the stream the backend asks the platform to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Always [`OUTPUT_CHANNELS`].
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per callback, equal to the slot size.
    pub period_frames: usize,
    /// Number of periods the device should buffer.
    pub hw_periods: u32,
}

impl StreamParams {
    /// Latency the device buffer should add: `period_frames × hw_periods`.
    pub fn suggested_latency(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(
            self.period_frames as f64 * f64::from(self.hw_periods) / f64::from(self.sample_rate),
        )
    }
}

/// A running output stream.
///
/// Dropping the stream releases the device; [`OutputStream::stop()`] does
/// the same but reports a failure to halt the callback.
pub trait OutputStream {
    /// Halts the real-time callback and releases the device.
    ///
    /// The callback is detached even when an error is returned.
    fn stop(self) -> Result<(), DeviceError>;
}

/// A source of output endpoints and streams.
pub trait AudioHost {
    /// Stream type returned by [`AudioHost::open_output()`].
    type Stream: OutputStream;

    /// Lists every output endpoint, including ones with fewer than two
    /// channels. Order and `raw_index` must be stable between calls while
    /// the device set does not change.
    fn output_endpoints(&self) -> Result<Vec<Endpoint>, DeviceError>;

    /// Opens and starts a stream on `endpoint`.
    ///
    /// The stream's real-time callback must call [`SlotReader::render()`]
    /// with a buffer of `frames × 2` samples and nothing else that can block.
    /// A platform that calls back with other sizes has to stage whole slots
    /// and split them across its callbacks.
    fn open_output(
        &self,
        endpoint: &Endpoint,
        params: &StreamParams,
        reader: SlotReader,
    ) -> Result<Self::Stream, DeviceError>;
}

/// Endpoints usable for stereo output, in platform order.
///
/// Positions in this list are the device indices the engine accepts.
pub(crate) fn stereo_endpoints<H: AudioHost>(host: &H) -> Result<Vec<Endpoint>, DeviceError> {
    Ok(host
        .output_endpoints()?
        .into_iter()
        .filter(Endpoint::is_stereo_capable)
        .collect())
}
