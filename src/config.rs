//! Playback parameters and their bounds.

use std::time::Duration;

/// Lowest accepted output sample rate in Hz.
pub const MIN_SAMPLE_RATE: f32 = 11_025.0;
/// Highest accepted output sample rate in Hz.
pub const MAX_SAMPLE_RATE: f32 = 192_000.0;

/// Shortest accepted total latency in seconds.
pub const MIN_LATENCY: f32 = 0.005;
/// Longest accepted total latency in seconds.
pub const MAX_LATENCY: f32 = 0.5;

/// Fewest hardware or software periods.
pub const MIN_PERIODS: u32 = 2;
/// Most hardware or software periods.
pub const MAX_PERIODS: u32 = 16;

/// Smallest period (slot) size in frames.
pub const MIN_PERIOD_FRAMES: usize = 16;
/// Largest period (slot) size in frames.
pub const MAX_PERIOD_FRAMES: usize = 16_384;

/// How long the producer waits for the device to release a filled slot
/// before dropping it.
///
/// This is the only wait on the producer side, and it does not scale with
/// the configured latency.
pub const PRODUCER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Output device and buffering parameters.
///
/// Values are always stored clamped; build one with
/// [`Configuration::clamped()`] or take the [`Default`].
///
/// # Example
///
/// ```
/// use audio_delivery::Configuration;
///
/// let config = Configuration::clamped(Some(0), 5.0, 2.0, 1, 100);
/// assert_eq!(config.sample_rate, 11_025.0);
/// assert_eq!(config.latency, 0.5);
/// assert_eq!((config.hw_periods, config.sw_periods), (2, 16));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    /// Position in [`DeliveryEngine::enumerate_devices()`], or `None` for no
    /// output device.
    ///
    /// [`DeliveryEngine::enumerate_devices()`]: crate::DeliveryEngine::enumerate_devices
    pub device_index: Option<usize>,

    /// Output sample rate in Hz. Zero while the device path is disabled.
    pub sample_rate: f32,

    /// Requested total latency in seconds.
    pub latency: f32,

    /// Number of periods the device buffers.
    pub hw_periods: u32,

    /// Number of slots in the software ring.
    pub sw_periods: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            device_index: None,
            sample_rate: 48_000.0,
            latency: 0.1,
            hw_periods: 4,
            sw_periods: 3,
        }
    }
}

impl Configuration {
    /// Builds a configuration with every field clamped to its bounds.
    ///
    /// A NaN rate becomes [`MIN_SAMPLE_RATE`] and a NaN latency becomes
    /// [`MAX_LATENCY`].
    #[must_use]
    pub fn clamped(
        device_index: Option<usize>,
        sample_rate: f32,
        latency: f32,
        hw_periods: u32,
        sw_periods: u32,
    ) -> Self {
        let sample_rate = if sample_rate.is_nan() {
            MIN_SAMPLE_RATE
        } else {
            sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE)
        };
        let latency = if latency.is_nan() {
            MAX_LATENCY
        } else {
            latency.clamp(MIN_LATENCY, MAX_LATENCY)
        };

        Self {
            device_index,
            sample_rate,
            latency,
            hw_periods: hw_periods.clamp(MIN_PERIODS, MAX_PERIODS),
            sw_periods: sw_periods.clamp(MIN_PERIODS, MAX_PERIODS),
        }
    }

    /// Returns `true` when these parameters describe an open device.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.device_index.is_some() && self.sample_rate > 0.0
    }

    /// The sample rate rounded to whole Hz, as devices and WAV headers need it.
    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        (self.sample_rate + 0.5) as u32
    }

    /// Frames per slot for these parameters.
    ///
    /// The latency budget is spread over `hw_periods + sw_periods - 2`
    /// periods, rounded up to a power of two and kept within
    /// [`MIN_PERIOD_FRAMES`]..=[`MAX_PERIOD_FRAMES`].
    #[must_use]
    pub fn period_frames(&self) -> usize {
        let total_frames = (self.latency * self.sample_rate + 0.5) as usize;
        let periods = (self.hw_periods + self.sw_periods).saturating_sub(2).max(1) as usize;
        (total_frames / periods)
            .next_power_of_two()
            .clamp(MIN_PERIOD_FRAMES, MAX_PERIOD_FRAMES)
    }

    /// Same parameters with the device path switched off.
    pub(crate) fn disabled(self) -> Self {
        Self {
            device_index: None,
            sample_rate: 0.0,
            ..self
        }
    }
}
