//! Engine Configuration Model
//!
//! Immutable parameter snapshots handed to the engine at start, plus the
//! field-wise update diff the controller sends while it runs. Out-of-range
//! values are clamped rather than rejected, matching an interactive
//! control surface where sliders can momentarily overshoot.
//!
//! Applying a diff reports whether the chain *response* changed — the
//! cases where the runner must clear its filter state, accumulator and
//! history rings so pre-change samples never mix with post-change ones.
//! An interferer update that only touches amplitudes is recognized and
//! excluded from that reset, preserving interferer phases.

use lockin_dsp::mixer::MixerMode;
use serde::{Deserialize, Serialize};

/// One interference tone. Ids are stable handles for the control surface;
/// the DSP only cares about frequency and amplitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interferer {
    pub id: u32,
    /// Frequency in Hz, clamped to >= 1.
    pub frequency: f64,
    /// Amplitude in volts, clamped to >= 0.
    pub amplitude: f64,
}

/// Signal source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSourceParams {
    /// Reference frequency in Hz, clamped to [1, 1000].
    pub reference_frequency: f64,
    /// Reference amplitude in volts, clamped to >= 0.
    pub reference_amplitude: f64,
    /// Modulating frequency in Hz, clamped to >= 0.1.
    pub modulating_frequency: f64,
    /// Modulation index, clamped to [0, 1].
    pub modulation_index: f64,
    /// Sensor phase shift in degrees, normalized to [0, 360).
    pub phase_shift_deg: f64,
    /// Sensor output amplitude in volts, clamped to >= 0.
    pub sensor_amplitude: f64,
    /// White noise standard deviation in volts, clamped to >= 0.
    pub white_noise_sigma: f64,
    /// Interference tones, ordered; ids must be unique.
    pub interferers: Vec<Interferer>,
}

impl Default for SignalSourceParams {
    fn default() -> Self {
        Self {
            reference_frequency: 100.0,
            reference_amplitude: 1.0,
            modulating_frequency: 10.0,
            modulation_index: 0.5,
            phase_shift_deg: 0.0,
            sensor_amplitude: 1.0,
            white_noise_sigma: 0.1,
            interferers: Vec::new(),
        }
    }
}

impl SignalSourceParams {
    /// Phase shift in radians.
    pub fn phase_shift_rad(&self) -> f64 {
        self.phase_shift_deg.to_radians()
    }
}

/// Band-pass pre-filter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandPassParams {
    pub enabled: bool,
    /// Center frequency in Hz, clamped to >= 1.
    pub center_frequency: f64,
    /// Bandwidth in Hz, clamped to >= 1.
    pub bandwidth: f64,
    /// Filter order; one of 1, 2, 4.
    pub order: usize,
}

impl Default for BandPassParams {
    fn default() -> Self {
        Self {
            enabled: true,
            center_frequency: 100.0,
            bandwidth: 50.0,
            order: 2,
        }
    }
}

/// Output low-pass filter settings (applied to both I and Q).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowPassParams {
    /// Cutoff frequency in Hz, clamped to >= 0.1.
    pub cutoff_frequency: f64,
    /// Filter order; one of 1, 2, 4.
    pub order: usize,
}

impl Default for LowPassParams {
    fn default() -> Self {
        Self {
            cutoff_frequency: 10.0,
            order: 2,
        }
    }
}

/// Mixer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerParams {
    pub mode: MixerMode,
}

impl Default for MixerParams {
    fn default() -> Self {
        Self {
            mode: MixerMode::Analog,
        }
    }
}

/// Engine geometry and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// History ring capacity in samples.
    pub ring_capacity: usize,
    /// Snapshot length per channel; never exceeds `ring_capacity`.
    pub snapshot_points: usize,
    /// Snapshot publish rate in Hz.
    pub snapshot_rate: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            sample_rate: 50_000.0,
            ring_capacity: 100_000,
            snapshot_points: 10_000,
            snapshot_rate: 30.0,
        }
    }
}

impl EngineParams {
    /// Decimation stride shared by all rings:
    /// `ceil(ring_capacity / snapshot_points)`.
    pub fn decimation_stride(&self) -> usize {
        (self.ring_capacity + self.snapshot_points - 1) / self.snapshot_points
    }

    /// Sample rate the decimated snapshot represents.
    pub fn effective_sample_rate(&self) -> f64 {
        self.sample_rate / self.decimation_stride() as f64
    }
}

/// Full parameter snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub source: SignalSourceParams,
    pub bandpass: BandPassParams,
    pub lowpass: LowPassParams,
    pub mixer: MixerParams,
    pub engine: EngineParams,
}

impl Params {
    /// Clamp every field into its documented range and restore the
    /// structural invariants (snapshot fits the ring, unique interferer
    /// ids keeping first occurrence).
    pub fn clamped(mut self) -> Self {
        self.clamp_in_place();
        self
    }

    /// Whether moving from `self` to `next` alters the chain response:
    /// filters, mixer mode, reference or modulating frequency, or the
    /// interferer *structure* (count or frequencies; amplitude-only
    /// interferer changes are not a response change).
    pub fn response_differs(&self, next: &Params) -> bool {
        self.source.reference_frequency != next.source.reference_frequency
            || self.source.modulating_frequency != next.source.modulating_frequency
            || self.bandpass != next.bandpass
            || self.lowpass != next.lowpass
            || self.mixer != next.mixer
            || self.source.interferers.len() != next.source.interferers.len()
            || self
                .source
                .interferers
                .iter()
                .zip(next.source.interferers.iter())
                .any(|(a, b)| a.frequency != b.frequency)
    }

    fn clamp_in_place(&mut self) {
        let s = &mut self.source;
        s.reference_frequency = s.reference_frequency.clamp(1.0, 1000.0);
        s.reference_amplitude = s.reference_amplitude.max(0.0);
        s.modulating_frequency = s.modulating_frequency.max(0.1);
        s.modulation_index = s.modulation_index.clamp(0.0, 1.0);
        s.phase_shift_deg = s.phase_shift_deg.rem_euclid(360.0);
        s.sensor_amplitude = s.sensor_amplitude.max(0.0);
        s.white_noise_sigma = s.white_noise_sigma.max(0.0);
        for tone in &mut s.interferers {
            tone.frequency = tone.frequency.max(1.0);
            tone.amplitude = tone.amplitude.max(0.0);
        }
        let mut seen = Vec::with_capacity(s.interferers.len());
        s.interferers.retain(|tone| {
            if seen.contains(&tone.id) {
                false
            } else {
                seen.push(tone.id);
                true
            }
        });

        self.bandpass.center_frequency = self.bandpass.center_frequency.max(1.0);
        self.bandpass.bandwidth = self.bandpass.bandwidth.max(1.0);
        self.lowpass.cutoff_frequency = self.lowpass.cutoff_frequency.max(0.1);

        let e = &mut self.engine;
        e.sample_rate = e.sample_rate.max(1.0);
        e.ring_capacity = e.ring_capacity.max(1);
        e.snapshot_points = e.snapshot_points.clamp(1, e.ring_capacity);
        e.snapshot_rate = e.snapshot_rate.max(1.0);
    }
}

/// What a parameter diff did to the running chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateEffect {
    /// The chain response changed: filters, mixer mode, reference or
    /// modulating frequency, or interferer structure. The runner must
    /// reset filter state, the accumulator and all history rings.
    pub response_changed: bool,
    /// The interferer diff only touched amplitudes of the existing tones.
    pub interferers_amplitude_only: bool,
}

/// Field-wise update diff: every field optional, `interferers` replaced
/// wholesale when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsUpdate {
    pub reference_frequency: Option<f64>,
    pub reference_amplitude: Option<f64>,
    pub modulating_frequency: Option<f64>,
    pub modulation_index: Option<f64>,
    pub phase_shift_deg: Option<f64>,
    pub sensor_amplitude: Option<f64>,
    pub white_noise_sigma: Option<f64>,
    pub interferers: Option<Vec<Interferer>>,
    pub bandpass_enabled: Option<bool>,
    pub bandpass_center: Option<f64>,
    pub bandpass_bandwidth: Option<f64>,
    pub bandpass_order: Option<usize>,
    pub lowpass_cutoff: Option<f64>,
    pub lowpass_order: Option<usize>,
    pub mixer_mode: Option<MixerMode>,
}

impl ParamsUpdate {
    /// Merge the supplied fields into `params`, clamping as for a fresh
    /// snapshot, and classify the change.
    pub fn apply(&self, params: &mut Params) -> UpdateEffect {
        let before = params.clone();

        let s = &mut params.source;
        if let Some(v) = self.reference_frequency {
            s.reference_frequency = v;
        }
        if let Some(v) = self.reference_amplitude {
            s.reference_amplitude = v;
        }
        if let Some(v) = self.modulating_frequency {
            s.modulating_frequency = v;
        }
        if let Some(v) = self.modulation_index {
            s.modulation_index = v;
        }
        if let Some(v) = self.phase_shift_deg {
            s.phase_shift_deg = v;
        }
        if let Some(v) = self.sensor_amplitude {
            s.sensor_amplitude = v;
        }
        if let Some(v) = self.white_noise_sigma {
            s.white_noise_sigma = v;
        }
        if let Some(list) = &self.interferers {
            s.interferers = list.clone();
        }
        if let Some(v) = self.bandpass_enabled {
            params.bandpass.enabled = v;
        }
        if let Some(v) = self.bandpass_center {
            params.bandpass.center_frequency = v;
        }
        if let Some(v) = self.bandpass_bandwidth {
            params.bandpass.bandwidth = v;
        }
        if let Some(v) = self.bandpass_order {
            params.bandpass.order = v;
        }
        if let Some(v) = self.lowpass_cutoff {
            params.lowpass.cutoff_frequency = v;
        }
        if let Some(v) = self.lowpass_order {
            params.lowpass.order = v;
        }
        if let Some(v) = self.mixer_mode {
            params.mixer.mode = v;
        }
        params.clamp_in_place();

        let interferers_amplitude_only = self.interferers.is_some()
            && params.source.interferers.len() == before.source.interferers.len()
            && params
                .source
                .interferers
                .iter()
                .zip(before.source.interferers.iter())
                .all(|(new, old)| new.frequency == old.frequency);

        UpdateEffect {
            response_changed: before.response_differs(params),
            interferers_amplitude_only,
        }
    }
}
