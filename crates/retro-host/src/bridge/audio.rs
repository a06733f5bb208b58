//! Sample accumulator between the core's audio callbacks and `Audio::mix`.
//!
//! Cores emit audio in small packets; resampling each one separately is
//! costly and rounds badly at packet boundaries, so packets are gathered
//! into one buffer and mixed together, normally once per frame.

use crate::components::Audio;

/// Slots in the buffer; two per stereo frame.
pub const SAMPLE_COUNT: usize = 1024;

const FRAMES: usize = SAMPLE_COUNT / 2;

pub struct SampleBuffer {
    samples: Box<[i16; SAMPLE_COUNT]>,
    count: usize,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self { samples: Box::new([0; SAMPLE_COUNT]), count: 0 }
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer").field("count", &self.count).finish()
    }
}

impl SampleBuffer {
    /// Buffered samples, not frames.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Appends one stereo frame, mixing the full buffer first when needed.
    pub fn push(&mut self, left: i16, right: i16, audio: &mut dyn Audio) {
        if self.count < SAMPLE_COUNT - 1 {
            self.samples[self.count] = left;
            self.samples[self.count + 1] = right;
            self.count += 2;
        } else {
            audio.mix(&self.samples[..]);
            self.samples[0] = left;
            self.samples[1] = right;
            self.count = 2;
        }
    }

    /// Takes an interleaved batch. With audio disabled the buffer is emptied
    /// and the batch discarded. Returns the frames consumed, always all of them.
    pub fn push_batch(&mut self, data: &[i16], enabled: bool, audio: &mut dyn Audio) -> usize {
        let frames = data.len() / 2;
        if !enabled {
            self.count = 0;
            return frames;
        }
        let data = &data[..frames * 2];

        // a large batch arriving on an empty buffer goes straight to the mixer
        if self.count == 0 && frames >= FRAMES {
            audio.mix(data);
            return frames;
        }

        let available = (SAMPLE_COUNT - self.count) / 2;
        if available > frames {
            self.samples[self.count..self.count + data.len()].copy_from_slice(data);
            self.count += data.len();
            return frames;
        }

        let (head, rest) = data.split_at(available * 2);
        self.samples[self.count..].copy_from_slice(head);
        audio.mix(&self.samples[..]);
        self.count = 0;

        if rest.len() / 2 > FRAMES {
            audio.mix(rest);
        } else if !rest.is_empty() {
            self.samples[..rest.len()].copy_from_slice(rest);
            self.count = rest.len();
        }
        frames
    }

    /// Mixes whatever is buffered as one batch.
    pub fn flush(&mut self, audio: &mut dyn Audio) {
        if self.count > 0 {
            audio.mix(&self.samples[..self.count]);
            self.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        batches: Vec<Vec<i16>>,
    }

    impl Audio for Recorder {
        fn set_rate(&mut self, _rate: f64) -> bool {
            true
        }

        fn mix(&mut self, samples: &[i16]) {
            self.batches.push(samples.to_vec());
        }
    }

    fn frames(n: usize, first: i16) -> Vec<i16> {
        (0..n * 2).map(|i| first.wrapping_add(i as i16)).collect()
    }

    #[test]
    fn small_batches_accumulate_until_flush() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        assert_eq!(buf.push_batch(&frames(100, 0), true, &mut out), 100);
        buf.push_batch(&frames(100, 200), true, &mut out);
        assert!(out.batches.is_empty());
        assert_eq!(buf.len(), 400);
        buf.flush(&mut out);
        assert_eq!(out.batches.len(), 1);
        assert_eq!(out.batches[0].len(), 400);
        assert_eq!(out.batches[0][200], 200);
        assert!(buf.is_empty());
    }

    #[test]
    fn large_batch_on_empty_buffer_bypasses_it() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        buf.push_batch(&frames(800, 0), true, &mut out);
        assert_eq!(out.batches.len(), 1);
        assert_eq!(out.batches[0].len(), 1600);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflowing_batch_fills_flushes_and_keeps_the_remainder() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        buf.push_batch(&frames(400, 0), true, &mut out);
        buf.push_batch(&frames(300, 1000), true, &mut out);
        // 112 frames completed the buffer, 188 wait for the next flush
        assert_eq!(out.batches.len(), 1);
        assert_eq!(out.batches[0].len(), SAMPLE_COUNT);
        assert_eq!(buf.len(), 188 * 2);
        assert_eq!(out.batches[0][800], 1000);
    }

    #[test]
    fn overflow_with_large_remainder_mixes_it_directly() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        buf.push_batch(&frames(10, 0), true, &mut out);
        buf.push_batch(&frames(1100, 0), true, &mut out);
        assert_eq!(out.batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![SAMPLE_COUNT, (1100 - 502) * 2]);
        assert!(buf.is_empty());
    }

    #[test]
    fn disabled_audio_discards_batches() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        buf.push_batch(&frames(10, 0), true, &mut out);
        assert_eq!(buf.push_batch(&frames(10, 0), false, &mut out), 10);
        assert!(buf.is_empty());
        assert!(out.batches.is_empty());
    }

    #[test]
    fn single_samples_flush_when_full() {
        let (mut buf, mut out) = (SampleBuffer::default(), Recorder::default());
        for i in 0..FRAMES as i16 {
            buf.push(i, -i, &mut out);
        }
        assert!(out.batches.is_empty());
        assert_eq!(buf.len(), SAMPLE_COUNT);
        buf.push(9, 9, &mut out);
        assert_eq!(out.batches.len(), 1);
        assert_eq!(buf.len(), 2);
    }
}
