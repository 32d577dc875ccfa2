//! Oscilloscope Trigger Search
//!
//! Rising-edge trigger detection over a snapshot of one display channel,
//! with holdoff so the displayed waveform does not re-anchor on every
//! frame. The caller passes the decimated channel and time views from the
//! latest snapshot; the detector keeps only the time of the last accepted
//! trigger between calls.
//!
//! A trigger at `t*` stays valid while the buffer still contains it and a
//! full display window (five divisions of the time scale) fits after it.
//! New searches are suppressed until that window has streamed past. When
//! the buffer holds less than one display window in total, the search
//! collapses to the first 10% of the buffer so very slow sweeps still
//! anchor somewhere stable.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::trigger::TriggerDetector;
//!
//! let channel: Vec<f32> = (0..100).map(|i| (i as f32 / 10.0).sin()).collect();
//! let time: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
//!
//! let mut detector = TriggerDetector::new();
//! let hit = detector.search(&channel, &time, 0.5, 10.0);
//! assert!(hit.is_some());
//! ```

/// A located trigger: index into the snapshot and its timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPoint {
    /// Index of the first sample at or above the level.
    pub index: usize,
    /// Time of that sample, in seconds.
    pub time: f64,
}

/// Rising-edge detector with holdoff.
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    /// Time of the last accepted trigger.
    last_trigger: Option<f64>,
    /// Latest buffer timestamp seen, for timeline-reset detection.
    latest_seen: Option<f64>,
}

impl TriggerDetector {
    /// Create a detector with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current trigger and holdoff state.
    pub fn reset(&mut self) {
        self.last_trigger = None;
        self.latest_seen = None;
    }

    /// Search `channel` for a rising crossing of `level`.
    ///
    /// `time` holds the per-sample timestamps (seconds, ascending) of the
    /// same snapshot; `time_scale_ms_per_div` is the display time scale,
    /// clamped to [1, 200] ms per division.
    pub fn search(
        &mut self,
        channel: &[f32],
        time: &[f32],
        level: f32,
        time_scale_ms_per_div: f64,
    ) -> Option<TriggerPoint> {
        let len = channel.len().min(time.len());
        if len < 2 {
            return None;
        }

        let t_earliest = time[0] as f64;
        let t_latest = time[len - 1] as f64;

        // Buffer timeline went backward: the engine was restarted or the
        // rings were cleared. Drop the stale trigger.
        if let Some(seen) = self.latest_seen {
            if t_latest < seen {
                self.last_trigger = None;
            }
        }
        self.latest_seen = Some(t_latest);

        let scale = time_scale_ms_per_div.clamp(1.0, 200.0);
        let display_window = scale * 5.0 / 1000.0;
        let duration = t_latest - t_earliest;

        if let Some(t) = self.last_trigger {
            if t >= t_earliest && t + display_window <= t_latest {
                // Still displayable; keep anchoring on it.
                let index = time[..len].partition_point(|&x| (x as f64) < t);
                return Some(TriggerPoint {
                    index: index.min(len - 1),
                    time: t,
                });
            }
            if t_latest < t + display_window {
                // Holdoff: the display window after the trigger has not
                // fully streamed in yet.
                return None;
            }
        }

        let t_end = if duration < display_window {
            t_earliest + duration * 0.1
        } else {
            t_latest - display_window
        };

        for i in 1..len {
            let ti = time[i] as f64;
            if ti > t_end {
                break;
            }
            if channel[i - 1] < level && level <= channel[i] {
                self.last_trigger = Some(ti);
                return Some(TriggerPoint { index: i, time: ti });
            }
        }

        self.last_trigger = None;
        None
    }
}
