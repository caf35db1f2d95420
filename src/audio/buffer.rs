//! Most-recent-window circular capture buffer
//!
//! Single producer (the realtime capture callback) and single consumer (the
//! drain thread) share one mutex. Critical sections are memcpy-class and
//! proportional to the request; the producer path never allocates because
//! the backing storage is sized once at construction.

use std::sync::Mutex;

use crate::error::AudioError;

struct RingState {
    data: Vec<f32>,
    /// Next write index
    pos: usize,
    /// Filled length, saturates at capacity
    len: usize,
}

/// Fixed-capacity ring holding the most recent `window_ms` of mono PCM.
pub struct CircularAudioBuffer {
    sample_rate: u32,
    window_ms: u32,
    inner: Mutex<RingState>,
}

impl CircularAudioBuffer {
    /// Create a ring sized to `sample_rate * window_ms / 1000` samples.
    pub fn new(sample_rate: u32, window_ms: u32) -> Self {
        let capacity = (sample_rate as usize * window_ms as usize) / 1000;
        Self {
            sample_rate,
            window_ms,
            inner: Mutex::new(RingState {
                data: vec![0.0; capacity],
                pos: 0,
                len: 0,
            }),
        }
    }

    /// Append samples at the write cursor, overwriting the oldest on wrap.
    ///
    /// After the call the ring holds the most recent `min(len + k, N)`
    /// samples. Called from the realtime capture thread; does not allocate.
    pub fn push(&self, samples: &[f32]) -> Result<(), AudioError> {
        let mut ring = self.inner.lock().unwrap();
        let capacity = ring.data.len();
        if capacity == 0 {
            return Err(AudioError::NotInitialized);
        }
        if samples.is_empty() {
            return Ok(());
        }

        if samples.len() >= capacity {
            // Only the final window survives
            let tail = &samples[samples.len() - capacity..];
            ring.data.copy_from_slice(tail);
            ring.pos = 0;
            ring.len = capacity;
            return Ok(());
        }

        let k = samples.len();
        let pos = ring.pos;
        if pos + k <= capacity {
            ring.data[pos..pos + k].copy_from_slice(samples);
        } else {
            let first = capacity - pos;
            ring.data[pos..].copy_from_slice(&samples[..first]);
            ring.data[..k - first].copy_from_slice(&samples[first..]);
        }
        ring.pos = (pos + k) % capacity;
        ring.len = (ring.len + k).min(capacity);
        Ok(())
    }

    /// Copy the most recent `ms` of audio into `out`, oldest first.
    ///
    /// `ms == 0` reads the whole window. The request silently clips to the
    /// filled length; reading an empty ring yields an empty `out`.
    pub fn get(&self, ms: u32, out: &mut Vec<f32>) -> Result<(), AudioError> {
        let ring = self.inner.lock().unwrap();
        let capacity = ring.data.len();
        if capacity == 0 {
            return Err(AudioError::NotInitialized);
        }

        let ms = if ms == 0 { self.window_ms } else { ms };
        let wanted = (self.sample_rate as usize * ms as usize) / 1000;
        let n = wanted.min(ring.len);

        out.clear();
        if n == 0 {
            return Ok(());
        }

        let start = (ring.pos + capacity - n) % capacity;
        if start + n <= capacity {
            out.extend_from_slice(&ring.data[start..start + n]);
        } else {
            out.extend_from_slice(&ring.data[start..]);
            out.extend_from_slice(&ring.data[..n - (capacity - start)]);
        }
        Ok(())
    }

    /// Empty the ring; atomic with respect to concurrent producers.
    pub fn clear(&self) -> Result<(), AudioError> {
        let mut ring = self.inner.lock().unwrap();
        if ring.data.is_empty() {
            return Err(AudioError::NotInitialized);
        }
        ring.pos = 0;
        ring.len = 0;
        Ok(())
    }

    /// Current filled length in samples.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing capacity in samples.
    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().data.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 kHz rate, 1000 ms window: capacity of exactly 1000 samples and a
    // 1-sample-per-ms conversion keep the arithmetic readable.
    fn ring_1k() -> CircularAudioBuffer {
        CircularAudioBuffer::new(1000, 1000)
    }

    fn ramp(n: usize, base: f32) -> Vec<f32> {
        (0..n).map(|i| base + i as f32).collect()
    }

    #[test]
    fn test_push_then_get_roundtrip() {
        let ring = ring_1k();
        let samples = ramp(100, 0.0);
        ring.push(&samples).unwrap();

        let mut out = Vec::new();
        ring.get(100, &mut out).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_get_clips_to_filled_length() {
        let ring = ring_1k();
        ring.push(&ramp(50, 0.0)).unwrap();

        let mut out = Vec::new();
        ring.get(500, &mut out).unwrap();
        assert_eq!(out.len(), 50);
        assert_eq!(out, ramp(50, 0.0));
    }

    #[test]
    fn test_get_before_any_push_is_empty() {
        let ring = ring_1k();
        let mut out = vec![1.0; 4];
        ring.get(10, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_wraparound_keeps_newest() {
        let ring = ring_1k();
        // 600 + 600 samples into a 1000-sample ring: the first 200 fall out
        ring.push(&ramp(600, 0.0)).unwrap();
        ring.push(&ramp(600, 1000.0)).unwrap();
        assert_eq!(ring.len(), 1000);

        let mut out = Vec::new();
        ring.get(1000, &mut out).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out[0], 200.0);
        assert_eq!(out[399], 599.0);
        assert_eq!(out[400], 1000.0);
        assert_eq!(out[999], 1599.0);
    }

    #[test]
    fn test_oversized_push_keeps_final_window() {
        let ring = ring_1k();
        // A contiguous 2N-sample stream leaves exactly the last N in order
        let samples = ramp(2000, 0.0);
        ring.push(&samples).unwrap();
        assert_eq!(ring.len(), 1000);

        let mut out = Vec::new();
        ring.get(0, &mut out).unwrap();
        assert_eq!(out, &samples[1000..]);
    }

    #[test]
    fn test_newest_tail_matches_last_push() {
        let ring = ring_1k();
        ring.push(&ramp(700, 0.0)).unwrap();
        let newest = ramp(80, 5000.0);
        ring.push(&newest).unwrap();

        let mut out = Vec::new();
        ring.get(80, &mut out).unwrap();
        assert_eq!(out, newest);
    }

    #[test]
    fn test_clear_empties_until_next_push() {
        let ring = ring_1k();
        ring.push(&ramp(300, 0.0)).unwrap();
        ring.clear().unwrap();
        assert_eq!(ring.len(), 0);

        let mut out = Vec::new();
        ring.get(0, &mut out).unwrap();
        assert!(out.is_empty());

        ring.push(&ramp(10, 7.0)).unwrap();
        ring.get(0, &mut out).unwrap();
        assert_eq!(out, ramp(10, 7.0));
    }

    #[test]
    fn test_zero_capacity_signals_not_initialized() {
        let ring = CircularAudioBuffer::new(0, 30);
        let mut out = Vec::new();
        assert!(matches!(
            ring.push(&[0.0]),
            Err(AudioError::NotInitialized)
        ));
        assert!(matches!(
            ring.get(10, &mut out),
            Err(AudioError::NotInitialized)
        ));
        assert!(matches!(ring.clear(), Err(AudioError::NotInitialized)));
    }

    #[test]
    fn test_window_sizing() {
        let ring = CircularAudioBuffer::new(48_000, 30);
        assert_eq!(ring.capacity(), 1440);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;
        use std::thread;

        // 8 kHz over 125 ms: a 1000-sample window
        let ring = Arc::new(CircularAudioBuffer::new(8_000, 125));

        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                // Blocks of a constant, strictly increasing value
                for block in 0..400u32 {
                    ring.push(&[block as f32; 64]).unwrap();
                }
            })
        };

        // Every consistent snapshot is chronological, so the values the
        // consumer sees must be non-decreasing within one read
        let mut out = Vec::new();
        for _ in 0..200 {
            ring.get(0, &mut out).unwrap();
            for pair in out.windows(2) {
                assert!(pair[0] <= pair[1], "snapshot out of order: {pair:?}");
            }
        }

        producer.join().unwrap();
        ring.get(0, &mut out).unwrap();
        assert_eq!(out.len(), 1000);
        assert_eq!(out.last().copied(), Some(399.0));
    }
}
