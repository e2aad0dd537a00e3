//! Adapts slot-sized periods to device callbacks of any size.

use super::SlotReader;
use crate::format::{i16_to_f32, i16_to_u16};

/// A [`SlotReader`] plus one slot of staged samples.
///
/// Platforms that pick their own callback size (cpal may ignore the
/// requested buffer size) are fed from the staging buffer, and a slot is only
/// taken from the ring once everything staged has been played. The buffer is
/// allocated here, before the stream starts.
pub(crate) struct StagedReader {
    reader: SlotReader,
    staged: Box<[i16]>,
    cursor: usize,
}

impl StagedReader {
    pub fn new(reader: SlotReader) -> Self {
        let staged = vec![0i16; reader.capacity()].into_boxed_slice();
        let cursor = staged.len();
        Self {
            reader,
            staged,
            cursor,
        }
    }

    pub fn fill_i16(&mut self, out: &mut [i16]) {
        self.fill_with(out, |s| s);
    }

    pub fn fill_f32(&mut self, out: &mut [f32]) {
        self.fill_with(out, i16_to_f32);
    }

    pub fn fill_u16(&mut self, out: &mut [u16]) {
        self.fill_with(out, i16_to_u16);
    }

    fn fill_with<T>(&mut self, out: &mut [T], convert: impl Fn(i16) -> T) {
        if self.staged.is_empty() {
            out.iter_mut().for_each(|dst| *dst = convert(0));
            return;
        }

        let mut written = 0;
        while written < out.len() {
            if self.cursor == self.staged.len() {
                self.reader.render(&mut self.staged);
                self.cursor = 0;
            }

            let n = (self.staged.len() - self.cursor).min(out.len() - written);
            let src = &self.staged[self.cursor..self.cursor + n];
            for (dst, &sample) in out[written..written + n].iter_mut().zip(src) {
                *dst = convert(sample);
            }
            self.cursor += n;
            written += n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::U16_SILENCE;
    use crate::pipeline::{slot_ring, SlotWriter};
    use crate::stats::StatsCounters;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    const FRAMES: usize = 4;
    const SLOT: usize = FRAMES * 2;

    /// Two slots of four frames, both already passed once by the callback
    /// so the producer can fill them without waiting.
    fn staged() -> (SlotWriter, StagedReader, Arc<StatsCounters>) {
        let stats = Arc::new(StatsCounters::default());
        let (writer, reader) = slot_ring(2, FRAMES, Duration::from_millis(50), Arc::clone(&stats));
        let mut staged = StagedReader::new(reader);
        staged.fill_i16(&mut [0; SLOT * 2]);
        (writer, staged, stats)
    }

    fn ramp() -> Vec<i16> {
        (1..=(SLOT * 2) as i16).collect()
    }

    #[test]
    fn test_callback_smaller_than_slot_plays_whole_slot() {
        let (mut writer, mut staged, stats) = staged();
        writer.enqueue(&ramp());

        let mut played = Vec::new();
        for len in [6, 6, 4] {
            let mut out = vec![0i16; len];
            staged.fill_i16(&mut out);
            played.extend(out);
        }

        assert_eq!(played, ramp());
        assert_eq!(stats.periods_played.load(Ordering::Relaxed), 2);
        assert_eq!(stats.underruns.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_callback_equal_to_slot() {
        let (mut writer, mut staged, _stats) = staged();
        writer.enqueue(&ramp());

        let mut first = [0i16; SLOT];
        let mut second = [0i16; SLOT];
        staged.fill_i16(&mut first);
        staged.fill_i16(&mut second);

        assert_eq!([first, second].concat(), ramp());
    }

    #[test]
    fn test_callback_larger_than_slot_spans_slots() {
        let (mut writer, mut staged, stats) = staged();
        writer.enqueue(&ramp());

        let mut out = [-1i16; SLOT * 2 + 4];
        staged.fill_i16(&mut out);

        assert_eq!(&out[..SLOT * 2], ramp().as_slice());
        // The ring ran dry: the rest is silence from the next slot.
        assert!(out[SLOT * 2..].iter().all(|&s| s == 0));
        assert_eq!(stats.underruns.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_f32_callback_across_slots() {
        let (mut writer, mut staged, _stats) = staged();
        writer.enqueue(&ramp());

        let mut played = Vec::new();
        for len in [6, 12, 6] {
            let mut out = vec![1.0f32; len];
            staged.fill_f32(&mut out);
            played.extend(out);
        }

        let expected: Vec<f32> = ramp().into_iter().map(i16_to_f32).collect();
        assert_eq!(&played[..SLOT * 2], expected.as_slice());
        assert!(played[SLOT * 2..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_u16_callback_across_slots() {
        let (mut writer, mut staged, _stats) = staged();
        writer.enqueue(&ramp());

        let mut small = [0u16; 2];
        staged.fill_u16(&mut small);
        let mut large = [0u16; SLOT * 3];
        staged.fill_u16(&mut large);

        let played = [small.as_slice(), large.as_slice()].concat();
        let expected: Vec<u16> = ramp().into_iter().map(i16_to_u16).collect();
        assert_eq!(&played[..SLOT * 2], expected.as_slice());
        assert!(played[SLOT * 2..].iter().all(|&s| s == U16_SILENCE));
    }
}
