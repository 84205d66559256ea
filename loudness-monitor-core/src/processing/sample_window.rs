/// Circular window holding the most recent samples from a capture callback.
///
/// Behaves like an analyser node's time-domain buffer: writers push whatever
/// the device delivers, the sampler copies out the latest `capacity` samples
/// without consuming them. Wrap in `Arc<parking_lot::Mutex<SampleWindow>>`
/// for cross-thread access.
#[derive(Debug)]
pub struct SampleWindow {
    buffer: Vec<f32>,
    write_index: usize,
    filled: usize,
    capacity: usize,
    total_written: u64,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            write_index: 0,
            filled: 0,
            capacity,
            total_written: 0,
        }
    }

    /// Append samples, overwriting the oldest once full.
    ///
    /// If `samples` is larger than capacity, only the last `capacity` samples are kept.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        self.total_written += samples.len() as u64;

        let samples = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        for &sample in samples {
            self.buffer[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
        self.filled = (self.filled + samples.len()).min(self.capacity);
    }

    /// The latest window in chronological order, always `capacity` long.
    ///
    /// Before the window fills, the missing head reads as silence.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.capacity);
        result.resize(self.capacity - self.filled, 0.0);
        let start = (self.write_index + self.capacity - self.filled) % self.capacity;
        for i in 0..self.filled {
            result.push(self.buffer[(start + i) % self.capacity]);
        }
        result
    }

    /// Total samples ever written, for stall detection.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Reset the window to silence.
    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write_index = 0;
        self.filled = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
