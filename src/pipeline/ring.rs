//! Slot ring shared between the producer and the real-time callback.
//!
//! The ring is a fixed set of equally sized stereo slots. Each slot carries
//! two capacity-one signals:
//!
//! - `ready`: raised by the producer when the slot is full, polled by the
//!   callback without waiting.
//! - `done`: raised by the callback every time it passes the slot (played or
//!   not), awaited by the producer with a timeout.
//!
//! A capacity-one `sync_channel` behaves as a binary semaphore: `try_send`
//! sets it (a second set is a no-op), `try_recv`/`recv_timeout` clear it.
//! The channel also orders the sample stores before the callback's loads, so
//! the samples themselves are relaxed atomics and neither side ever locks.

use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use crate::stats::StatsCounters;

/// One period of interleaved stereo audio.
struct Slot {
    samples: Box<[AtomicI16]>,
}

impl Slot {
    fn new(len: usize) -> Self {
        Self {
            samples: (0..len).map(|_| AtomicI16::new(0)).collect(),
        }
    }
}

/// Creates a ring of `slot_count` slots of `period_frames` stereo frames.
///
/// Returns the producer half and the callback half. The producer waits at
/// most `timeout` for the callback to release a slot it just filled.
pub(crate) fn slot_ring(
    slot_count: usize,
    period_frames: usize,
    timeout: Duration,
    stats: Arc<StatsCounters>,
) -> (SlotWriter, SlotReader) {
    let slot_count = slot_count.max(1);
    let slots: Arc<[Slot]> = (0..slot_count).map(|_| Slot::new(period_frames * 2)).collect();

    let (ready_tx, ready_rx): (Vec<_>, Vec<_>) =
        (0..slot_count).map(|_| mpsc::sync_channel::<()>(1)).unzip();
    let (done_tx, done_rx): (Vec<_>, Vec<_>) =
        (0..slot_count).map(|_| mpsc::sync_channel::<()>(1)).unzip();

    let writer = SlotWriter {
        slots: Arc::clone(&slots),
        ready_tx,
        done_rx,
        write_index: 0,
        cursor: 0,
        timeout,
        stats: Arc::clone(&stats),
    };
    let reader = SlotReader {
        slots,
        ready_rx,
        done_tx,
        read_index: 0,
        stats,
    };

    (writer, reader)
}

/// Producer half of the ring. Lives on the control/emulation thread.
pub(crate) struct SlotWriter {
    slots: Arc<[Slot]>,
    ready_tx: Vec<SyncSender<()>>,
    done_rx: Vec<Receiver<()>>,
    write_index: usize,
    cursor: usize,
    timeout: Duration,
    stats: Arc<StatsCounters>,
}

impl SlotWriter {
    /// Copies interleaved stereo frames into the ring.
    ///
    /// Frames do not need to line up with slot boundaries. Each time a slot
    /// fills, the callback is signalled and this call blocks for up to the
    /// ring timeout until the callback has passed that slot. On timeout the
    /// slot's contents are dropped and the same slot is refilled.
    pub fn enqueue(&mut self, samples: &[i16]) {
        // Whole frames only.
        let mut pending = &samples[..samples.len() & !1];

        while !pending.is_empty() {
            let slot = &self.slots[self.write_index];
            let room = slot.samples.len() - self.cursor;
            let n = room.min(pending.len());

            for (dst, &src) in slot.samples[self.cursor..self.cursor + n]
                .iter()
                .zip(&pending[..n])
            {
                dst.store(src, Ordering::Relaxed);
            }
            self.cursor += n;
            pending = &pending[n..];

            if self.cursor >= slot.samples.len() {
                self.cursor = 0;
                self.hand_off();
            }
        }
    }

    /// Publishes the slot at the write index and waits for the callback.
    fn hand_off(&mut self) {
        let index = self.write_index;
        // Full means the callback has not consumed the previous signal yet.
        let _ = self.ready_tx[index].try_send(());

        match self.done_rx[index].recv_timeout(self.timeout) {
            Ok(()) => {
                self.write_index = (index + 1) % self.slots.len();
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                self.stats.dropped_periods.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    slot = index,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "audio device did not release slot in time, dropping period"
                );
            }
        }
    }

    /// Index of the slot currently being filled.
    #[cfg(test)]
    pub fn write_index(&self) -> usize {
        self.write_index
    }
}

/// Callback half of the ring. Moved into the platform's real-time callback.
///
/// [`SlotReader::render()`] never blocks, allocates, or takes a lock shared
/// with the control thread.
pub struct SlotReader {
    slots: Arc<[Slot]>,
    ready_rx: Vec<Receiver<()>>,
    done_tx: Vec<SyncSender<()>>,
    read_index: usize,
    stats: Arc<StatsCounters>,
}

impl SlotReader {
    /// Samples per slot (frames × 2).
    pub fn capacity(&self) -> usize {
        self.slots.first().map_or(0, |slot| slot.samples.len())
    }

    /// Fills `out` with the next period of interleaved stereo samples.
    ///
    /// At most one slot is consumed per call. If the slot at the read index
    /// is not ready, silence is written instead. Any part of `out` beyond one
    /// slot is zero-filled.
    pub fn render(&mut self, out: &mut [i16]) {
        let index = self.read_index;
        let slot = &self.slots[index];
        let n = out.len().min(slot.samples.len());

        if self.ready_rx[index].try_recv().is_ok() {
            for (dst, src) in out[..n].iter_mut().zip(slot.samples.iter()) {
                *dst = src.load(Ordering::Relaxed);
            }
            self.stats.periods_played.fetch_add(1, Ordering::Relaxed);
        } else {
            out[..n].fill(0);
            self.stats.underruns.fetch_add(1, Ordering::Relaxed);
        }

        let _ = self.done_tx[index].try_send(());
        self.read_index = (index + 1) % self.slots.len();

        out[n..].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

    fn ring(slots: usize, frames: usize) -> (SlotWriter, SlotReader, Arc<StatsCounters>) {
        let stats = Arc::new(StatsCounters::default());
        let (writer, reader) = slot_ring(slots, frames, SHORT_TIMEOUT, Arc::clone(&stats));
        (writer, reader, stats)
    }

    /// Runs the callback once over every slot, as a device does before the
    /// producer's first period is ready.
    fn prime(reader: &mut SlotReader, slots: usize) {
        let mut out = vec![0i16; reader.capacity()];
        for _ in 0..slots {
            reader.render(&mut out);
        }
    }

    fn ramp(frames: usize, start: i16) -> Vec<i16> {
        (0..frames)
            .flat_map(|i| {
                let v = start.wrapping_add(i as i16);
                [v, v.wrapping_neg()]
            })
            .collect()
    }

    #[test]
    fn test_render_without_producer_is_silence() {
        let (_writer, mut reader, stats) = ring(3, 16);

        for requested in [1usize, 8, 16, 40] {
            let mut out = vec![7i16; requested * 2];
            let started = Instant::now();
            reader.render(&mut out);
            assert!(started.elapsed() < Duration::from_millis(10));
            assert_eq!(out.len(), requested * 2);
            assert!(out.iter().all(|&s| s == 0));
        }

        assert_eq!(stats.underruns.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_partial_slot_is_not_published() {
        let (mut writer, mut reader, _) = ring(2, 16);
        writer.enqueue(&ramp(15, 1));

        let mut out = vec![0i16; 32];
        reader.render(&mut out);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(writer.write_index(), 0);
    }

    #[test]
    fn test_slots_delivered_in_order() {
        let (mut writer, mut reader, stats) = ring(3, 16);

        // One pass of the callback over every slot leaves each `done` raised,
        // so the producer can fill the whole ring without waiting.
        prime(&mut reader, 3);
        let mut out = vec![0i16; 32];

        let input = ramp(48, 1);
        writer.enqueue(&input[..10]);
        writer.enqueue(&input[10..]);
        assert_eq!(writer.write_index(), 0);

        let mut delivered = Vec::new();
        for _ in 0..3 {
            reader.render(&mut out);
            delivered.extend_from_slice(&out);
        }
        assert_eq!(delivered, input);
        assert_eq!(stats.periods_played.load(Ordering::Relaxed), 3);
        assert_eq!(stats.dropped_periods.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_render_clamps_to_slot_capacity() {
        let (mut writer, mut reader, _) = ring(2, 16);
        prime(&mut reader, 2);

        let input = ramp(16, 100);
        writer.enqueue(&input);

        // Ask for 24 frames from a 16-frame slot.
        let mut out = vec![9i16; 48];
        reader.render(&mut out);
        assert_eq!(&out[..32], &input[..]);
        assert!(out[32..].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_short_request_takes_slot_prefix() {
        let (mut writer, mut reader, _) = ring(2, 16);
        prime(&mut reader, 2);

        let input = ramp(16, 1);
        writer.enqueue(&input);

        let mut out = vec![0i16; 8];
        reader.render(&mut out);
        assert_eq!(&out[..], &input[..8]);
    }

    #[test]
    fn test_odd_trailing_sample_ignored() {
        let (mut writer, mut reader, _) = ring(2, 16);
        prime(&mut reader, 2);

        let mut input = ramp(16, 1);
        input.push(999);
        writer.enqueue(&input);
        assert_eq!(writer.write_index(), 1);

        let mut out = vec![0i16; 32];
        reader.render(&mut out);
        assert_eq!(&out[..], &input[..32]);
    }

    #[test]
    fn test_backpressure_times_out_and_drops() {
        let (mut writer, _reader, stats) = ring(3, 16);

        let started = Instant::now();
        writer.enqueue(&ramp(16 * 3, 1));
        let elapsed = started.elapsed();

        // Every fill waited the full timeout and was dropped in place.
        assert!(elapsed >= SHORT_TIMEOUT * 3);
        assert!(elapsed < Duration::from_secs(5));
        assert_eq!(writer.write_index(), 0);
        assert_eq!(stats.dropped_periods.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_buffered_audio_bounded_by_ring() {
        let (mut writer, mut reader, stats) = ring(4, 16);
        prime(&mut reader, 4);

        // A full ring's worth goes through without waiting...
        let started = Instant::now();
        writer.enqueue(&ramp(16 * 4, 1));
        assert!(started.elapsed() < SHORT_TIMEOUT);
        assert_eq!(stats.dropped_periods.load(Ordering::Relaxed), 0);

        // ...but one slot more has to wait for the device and is dropped.
        let started = Instant::now();
        writer.enqueue(&ramp(16, 500));
        assert!(started.elapsed() >= SHORT_TIMEOUT);
        assert_eq!(stats.dropped_periods.load(Ordering::Relaxed), 1);
        assert_eq!(writer.write_index(), 0);
    }

    #[test]
    fn test_producer_paced_by_consumer() {
        let stats = Arc::new(StatsCounters::default());
        let (mut writer, mut reader) =
            slot_ring(3, 16, Duration::from_secs(1), Arc::clone(&stats));
        let total_frames = 16 * 20;
        let input = ramp(total_frames, 1);

        let producer = thread::spawn(move || {
            for chunk in input.chunks(6) {
                writer.enqueue(chunk);
            }
        });

        let mut played = Vec::new();
        let mut out = vec![0i16; 32];
        let deadline = Instant::now() + Duration::from_secs(10);
        while !producer.is_finished() && Instant::now() < deadline {
            reader.render(&mut out);
            played.extend(out.chunks_exact(2).map(|frame| frame[0]).filter(|&v| v != 0));
            thread::sleep(Duration::from_millis(1));
        }
        producer.join().unwrap();

        assert!(!played.is_empty());
        assert!(played.iter().all(|&v| v >= 1 && v as usize <= total_frames));
        assert_eq!(stats.dropped_periods.load(Ordering::Relaxed), 0);
    }
}
