//! Decimating History Ring
//!
//! Fixed-capacity circular buffer of `f32` samples holding the recent
//! history of one chain channel. Writes overwrite the oldest sample once
//! full; reads produce a decimated chronological view sized for a display
//! snapshot.
//!
//! The decimation stride is computed from the buffer *capacity*, not from
//! how many samples it currently holds, so the display geometry stays
//! stable while the buffer warms up. History is stored as `f32`; the
//! `f64 → f32` rounding happens here, at push time.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::ring_buffer::SampleRing;
//!
//! let mut ring = SampleRing::new(8);
//! for v in 0..4 {
//!     ring.push(v as f64);
//! }
//!
//! let mut view = [0.0f32; 4];
//! let written = ring.snapshot_into(&mut view, 4);
//! assert_eq!(written, 2); // stride = ceil(8 / 4) = 2
//! assert_eq!(&view[..written], &[0.0, 2.0]);
//! ```

/// Fixed-capacity circular buffer with capacity-based decimation.
#[derive(Debug, Clone)]
pub struct SampleRing {
    data: Vec<f32>,
    write: usize,
    len: usize,
}

impl SampleRing {
    /// Create a ring holding up to `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            data: vec![0.0; capacity],
            write: 0,
            len: 0,
        }
    }

    /// Append a sample, overwriting the oldest when full. The value is
    /// rounded to `f32` here.
    pub fn push(&mut self, value: f64) {
        self.data[self.write] = value as f32;
        self.write = (self.write + 1) % self.data.len();
        if self.len < self.data.len() {
            self.len += 1;
        }
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing has been pushed since creation or `clear`.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Decimation stride for a snapshot of at most `max_points` samples:
    /// `ceil(capacity / max_points)`, independent of the current fill.
    pub fn stride(&self, max_points: usize) -> usize {
        (self.data.len() + max_points - 1) / max_points
    }

    /// Copy a decimated chronological view into `target`.
    ///
    /// Samples are taken oldest-first every `stride(max_points)` positions;
    /// returns the number written, which is `ceil(len / stride)` and never
    /// exceeds `max_points`.
    pub fn snapshot_into(&self, target: &mut [f32], max_points: usize) -> usize {
        let stride = self.stride(max_points);
        let capacity = self.data.len();
        let start = (self.write + capacity - self.len) % capacity;

        let mut written = 0;
        let mut k = 0;
        while k < self.len && written < target.len() {
            target[written] = self.data[(start + k) % capacity];
            written += 1;
            k += stride;
        }
        written
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.write = 0;
        self.len = 0;
    }
}
