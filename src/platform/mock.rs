//! Mock audio platform for testing without hardware.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{AudioHost, Endpoint, OutputStream, StreamParams};
use crate::{DeviceError, SlotReader};

/// Description of a fake output endpoint.
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    name: String,
    host_api: String,
    channels: u16,
}

impl MockEndpoint {
    /// An endpoint with the given name and channel count on the "Mock" API.
    pub fn new(name: impl Into<String>, channels: u16) -> Self {
        Self {
            name: name.into(),
            host_api: "Mock".to_string(),
            channels,
        }
    }

    /// Places the endpoint on a different host API.
    #[must_use]
    pub fn host_api(mut self, host_api: impl Into<String>) -> Self {
        self.host_api = host_api.into();
        self
    }
}

#[derive(Default)]
struct MockState {
    endpoints: Vec<Endpoint>,
    reader: Option<SlotReader>,
    opened: Option<(Endpoint, StreamParams)>,
    generation: u64,
    list_count: usize,
    open_count: usize,
    stop_count: usize,
    fail_next_open: bool,
    fail_next_stop: bool,
    fail_enumeration: bool,
}

/// An in-memory audio platform.
///
/// Streams opened on a `MockHost` do not run on their own: the test drives
/// the real-time callback through a [`MockDevice`], one period at a time,
/// from whatever thread plays the part of the audio subsystem.
///
/// # Example
///
/// ```
/// use audio_delivery::{DeliveryEngine, MockEndpoint, MockHost};
///
/// let host = MockHost::with_endpoints([
///     MockEndpoint::new("Speakers", 2),
///     MockEndpoint::new("Headset Mic", 1),
/// ]);
/// let device = host.device();
///
/// let mut engine = DeliveryEngine::new(host);
/// engine.configure(Some(0), 48_000.0, 0.05, 2, 2).unwrap();
///
/// // Nothing ingested yet: the callback plays silence.
/// let out = device.pull(256).unwrap();
/// assert!(out.iter().all(|&s| s == 0));
/// ```
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

impl MockHost {
    /// A host with a single stereo endpoint.
    pub fn new() -> Self {
        Self::with_endpoints([MockEndpoint::new("Mock Speakers", 2)])
    }

    /// A host with the given endpoints, in platform order.
    pub fn with_endpoints(endpoints: impl IntoIterator<Item = MockEndpoint>) -> Self {
        let host = Self::default();
        host.set_endpoints(endpoints);
        host
    }

    /// Replaces the endpoint list, as a hot-plug event would.
    pub fn set_endpoints(&self, endpoints: impl IntoIterator<Item = MockEndpoint>) {
        self.lock().endpoints = endpoints
            .into_iter()
            .enumerate()
            .map(|(raw_index, e)| Endpoint {
                raw_index,
                name: e.name,
                host_api: e.host_api,
                max_output_channels: e.channels,
            })
            .collect();
    }

    /// Handle for driving the callback of whatever stream is open.
    pub fn device(&self) -> MockDevice {
        MockDevice {
            state: Arc::clone(&self.state),
        }
    }

    /// Makes the next [`AudioHost::open_output()`] fail.
    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    /// Makes the next [`OutputStream::stop()`] fail.
    pub fn fail_next_stop(&self) {
        self.lock().fail_next_stop = true;
    }

    /// Makes endpoint listing fail until cleared.
    pub fn set_enumeration_failure(&self, fail: bool) {
        self.lock().fail_enumeration = fail;
    }

    /// Endpoint listings served so far, failed ones included.
    pub fn list_count(&self) -> usize {
        self.lock().list_count
    }

    /// Streams opened so far.
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Streams stopped so far (dropped streams are not counted).
    pub fn stop_count(&self) -> usize {
        self.lock().stop_count
    }

    /// Endpoint and parameters of the currently open stream.
    pub fn open_stream(&self) -> Option<(Endpoint, StreamParams)> {
        self.lock().opened.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }
}

impl AudioHost for MockHost {
    type Stream = MockStream;

    fn output_endpoints(&self) -> Result<Vec<Endpoint>, DeviceError> {
        let mut state = self.lock();
        state.list_count += 1;
        if state.fail_enumeration {
            return Err(DeviceError::BackendError("mock enumeration failure".to_string()));
        }
        Ok(state.endpoints.clone())
    }

    fn open_output(
        &self,
        endpoint: &Endpoint,
        params: &StreamParams,
        reader: SlotReader,
    ) -> Result<MockStream, DeviceError> {
        let mut state = self.lock();

        if std::mem::take(&mut state.fail_next_open) {
            return Err(DeviceError::BackendError("mock open failure".to_string()));
        }
        if state.endpoints.get(endpoint.raw_index) != Some(endpoint) {
            return Err(DeviceError::DeviceNotFound {
                name: endpoint.display_name(),
            });
        }

        state.generation += 1;
        state.open_count += 1;
        state.reader = Some(reader);
        state.opened = Some((endpoint.clone(), *params));

        Ok(MockStream {
            state: Arc::clone(&self.state),
            generation: state.generation,
        })
    }
}

/// A stream opened on a [`MockHost`].
pub struct MockStream {
    state: Arc<Mutex<MockState>>,
    generation: u64,
}

impl MockStream {
    /// Detaches the callback if this stream still owns it.
    fn detach(&self, state: &mut MockState) {
        if state.generation == self.generation {
            state.reader = None;
            state.opened = None;
        }
    }
}

impl OutputStream for MockStream {
    fn stop(self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        self.detach(&mut state);
        state.stop_count += 1;

        if std::mem::take(&mut state.fail_next_stop) {
            return Err(DeviceError::BackendError("mock stop failure".to_string()));
        }
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        self.detach(&mut state);
    }
}

/// Plays the part of the audio subsystem for a [`MockHost`].
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    /// Whether a stream is currently open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).reader.is_some()
    }

    /// Invokes the callback for `frames` frames and returns what it wrote.
    ///
    /// Returns `None` when no stream is open.
    pub fn pull(&self, frames: usize) -> Option<Vec<i16>> {
        let mut out = vec![0i16; frames * 2];
        self.pull_into(&mut out).then_some(out)
    }

    /// Invokes the callback on `out`. Returns `false` when no stream is open.
    pub fn pull_into(&self, out: &mut [i16]) -> bool {
        match lock(&self.state).reader.as_mut() {
            Some(reader) => {
                reader.render(out);
                true
            }
            None => false,
        }
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::slot_ring;
    use crate::stats::StatsCounters;
    use std::time::Duration;

    fn params() -> StreamParams {
        StreamParams {
            channels: 2,
            sample_rate: 48_000,
            period_frames: 64,
            hw_periods: 2,
        }
    }

    fn reader() -> SlotReader {
        let (_writer, reader) =
            slot_ring(2, 64, Duration::from_millis(10), Arc::new(StatsCounters::default()));
        reader
    }

    #[test]
    fn test_mock_host_default_endpoint() {
        let endpoints = MockHost::new().output_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].display_name(), "Mock Speakers (Mock)");
    }

    #[test]
    fn test_open_and_stop() {
        let host = MockHost::new();
        let device = host.device();
        let endpoint = host.output_endpoints().unwrap().remove(0);

        let stream = host.open_output(&endpoint, &params(), reader()).unwrap();
        assert!(device.is_open());
        assert_eq!(host.open_stream().unwrap().1, params());
        assert_eq!(device.pull(64).unwrap().len(), 128);

        stream.stop().unwrap();
        assert!(!device.is_open());
        assert!(device.pull(64).is_none());
        assert_eq!((host.open_count(), host.stop_count()), (1, 1));
    }

    #[test]
    fn test_drop_detaches_callback() {
        let host = MockHost::new();
        let device = host.device();
        let endpoint = host.output_endpoints().unwrap().remove(0);

        let stream = host.open_output(&endpoint, &params(), reader()).unwrap();
        drop(stream);
        assert!(!device.is_open());
        assert_eq!(host.stop_count(), 0);
    }

    #[test]
    fn test_stale_endpoint_rejected() {
        let host = MockHost::new();
        let endpoint = host.output_endpoints().unwrap().remove(0);
        host.set_endpoints([MockEndpoint::new("USB DAC", 2)]);

        let result = host.open_output(&endpoint, &params(), reader());
        assert!(matches!(result, Err(DeviceError::DeviceNotFound { .. })));
    }

    #[test]
    fn test_injected_failures() {
        let host = MockHost::new();
        let endpoint = host.output_endpoints().unwrap().remove(0);

        host.fail_next_open();
        assert!(host.open_output(&endpoint, &params(), reader()).is_err());

        let stream = host.open_output(&endpoint, &params(), reader()).unwrap();
        host.fail_next_stop();
        assert!(stream.stop().is_err());
        assert!(!host.device().is_open());

        host.set_enumeration_failure(true);
        assert!(host.output_endpoints().is_err());
    }
}
