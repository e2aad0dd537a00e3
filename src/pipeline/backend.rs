//! Open output device plus the producer half of its slot ring.

use std::sync::Arc;

use super::{slot_ring, SlotWriter};
use crate::config::{Configuration, PRODUCER_TIMEOUT};
use crate::platform::{AudioHost, Endpoint, OutputStream, StreamParams, OUTPUT_CHANNELS};
use crate::stats::StatsCounters;
use crate::DeviceError;

/// A running output stream fed from a slot ring.
///
/// The stream owns the [`SlotReader`](crate::SlotReader); this side keeps the
/// [`SlotWriter`]. Closing stops the stream before the writer goes away, so
/// the callback never observes a half-released ring.
pub(crate) struct RealtimeBackend<S: OutputStream> {
    // Must stay ahead of `writer`: fields drop in declaration order.
    stream: Option<S>,
    writer: SlotWriter,
    params: StreamParams,
}

impl<S: OutputStream> RealtimeBackend<S> {
    /// Resolves `config.device_index` against the stereo-capable endpoints
    /// and starts a stream on it.
    pub fn open<H>(host: &H, config: &Configuration, stats: Arc<StatsCounters>) -> Result<Self, DeviceError>
    where
        H: AudioHost<Stream = S>,
    {
        let all = host.output_endpoints()?;
        if all.is_empty() {
            return Err(DeviceError::NoDevices);
        }

        let index = config.device_index.unwrap_or(0);
        let mut endpoints: Vec<_> = all.into_iter().filter(Endpoint::is_stereo_capable).collect();
        if index >= endpoints.len() {
            return Err(DeviceError::IndexOutOfRange {
                index,
                available: endpoints.len(),
            });
        }
        let endpoint = endpoints.swap_remove(index);

        let params = StreamParams {
            channels: OUTPUT_CHANNELS,
            sample_rate: config.sample_rate_hz(),
            period_frames: config.period_frames(),
            hw_periods: config.hw_periods,
        };
        let slot_count = config.sw_periods as usize;
        let (writer, reader) = slot_ring(slot_count, params.period_frames, PRODUCER_TIMEOUT, stats);

        let stream = host.open_output(&endpoint, &params, reader)?;

        tracing::info!(
            device = %endpoint.display_name(),
            sample_rate = params.sample_rate,
            period_frames = params.period_frames,
            slots = slot_count,
            hw_periods = params.hw_periods,
            "audio output opened"
        );

        Ok(Self {
            stream: Some(stream),
            writer,
            params,
        })
    }

    /// Hands interleaved stereo samples to the ring, blocking on a full slot.
    pub fn enqueue(&mut self, samples: &[i16]) {
        self.writer.enqueue(samples);
    }

    /// Frames per slot and per device callback.
    pub fn period_frames(&self) -> usize {
        self.params.period_frames
    }

    /// Stops the stream, then releases the ring.
    pub fn close(mut self) -> Result<(), DeviceError> {
        let result = match self.stream.take() {
            Some(stream) => stream.stop(),
            None => Ok(()),
        };
        tracing::debug!(ok = result.is_ok(), "audio output closed");
        result
    }
}
