//! Per-Sample Chain Runner
//!
//! Owns every DSP block of the signal chain plus the thirteen history
//! rings and the output accumulator, and advances them one sample at a
//! time:
//!
//! ```text
//! reference/modulating → DSB-SC sensor → + noise → BPF → I/Q mixer → LPFs
//!        │                    │             │        │       │         │
//!        └────────────────────┴──── 13 channel rings ┴───────┴─────────┘
//! ```
//!
//! Parameter updates follow the diff classification from
//! [`crate::params`]: a change that alters the chain response swaps filter
//! coefficients, clears all filter state, discards the accumulator and
//! empties every ring, so no stale pre-change sample ever shows up next to
//! post-change ones. Amplitude-only interferer changes keep everything.
//!
//! Snapshot assembly decimates all rings into the inactive double-buffer
//! block, derives the averaged scalar outputs and publishes with one flag
//! flip.

use lockin_dsp::biquad::BiquadChain;
use lockin_dsp::dut::{DutConfig, DutGenerator};
use lockin_dsp::filter_design::{self, DesignError};
use lockin_dsp::interferer::InterfererBank;
use lockin_dsp::mixer::Mixer;
use lockin_dsp::noise::GaussianNoise;
use lockin_dsp::ring_buffer::SampleRing;

use crate::double_buffer::{Channel, DoubleBuffer, CHANNEL_COUNT};
use crate::params::{Params, ParamsUpdate, UpdateEffect};

/// Averaged scalar outputs of one published frame.
///
/// `phase_deg` is `atan2(q, i)` in degrees, corrected by the band-pass
/// phase at the reference frequency and wrapped to (−180, 180]. With an
/// all-zero accumulator `atan2(0, 0)` is 0, so a dead chain reports 0°.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalarOutputs {
    /// Time-averaged in-phase output (V).
    pub i: f64,
    /// Time-averaged quadrature output (V).
    pub q: f64,
    /// `i·cos(φ) + q·sin(φ)` for the configured phase shift φ.
    pub signed_output: f64,
    /// Reported phase in degrees, in (−180, 180].
    pub phase_deg: f64,
}

/// Everything a `FrameReady` event carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub outputs: ScalarOutputs,
    /// Sample rate the decimated snapshot represents.
    pub effective_sample_rate: f64,
    /// Meaningful samples per channel in the published block.
    pub data_length: usize,
}

/// Running I/Q sums between snapshots.
#[derive(Debug, Clone, Copy, Default)]
struct OutputAccumulator {
    i_sum: f64,
    q_sum: f64,
    count: u64,
}

impl OutputAccumulator {
    fn add(&mut self, i: f64, q: f64) {
        self.i_sum += i;
        self.q_sum += q;
        self.count += 1;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Averages so far; zeros when nothing accumulated.
    fn average(&self) -> (f64, f64) {
        if self.count == 0 {
            (0.0, 0.0)
        } else {
            let n = self.count as f64;
            (self.i_sum / n, self.q_sum / n)
        }
    }
}

/// Wrap a phase in degrees into (−180, 180].
fn wrap_phase_deg(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// The sample-accurate signal chain with its history and accumulator.
#[derive(Debug)]
pub struct ChainRunner {
    params: Params,
    dut: DutGenerator,
    noise: GaussianNoise,
    interferers: InterfererBank,
    bpf: BiquadChain,
    lpf_i: BiquadChain,
    lpf_q: BiquadChain,
    mixer: Mixer,
    rings: [SampleRing; CHANNEL_COUNT],
    acc: OutputAccumulator,
    /// BPF phase at the reference frequency, subtracted from the reported
    /// phase so a centered BPF contributes zero.
    bpf_phase_offset_rad: f64,
    sample_count: u64,
}

impl ChainRunner {
    /// Build the chain for a parameter snapshot, noise seeded from
    /// entropy.
    pub fn new(params: Params) -> Result<Self, DesignError> {
        let params = params.clamped();
        let fs = params.engine.sample_rate;
        Self::build(
            params,
            GaussianNoise::from_entropy(),
            InterfererBank::new(fs),
        )
    }

    /// Build with deterministic noise and interferer phases, for tests
    /// and reproducible demos.
    pub fn seeded(params: Params, seed: u64) -> Result<Self, DesignError> {
        let params = params.clamped();
        let fs = params.engine.sample_rate;
        Self::build(
            params,
            GaussianNoise::seeded(seed),
            InterfererBank::seeded(fs, seed.wrapping_add(1)),
        )
    }

    fn build(
        params: Params,
        noise: GaussianNoise,
        mut interferers: InterfererBank,
    ) -> Result<Self, DesignError> {
        let fs = params.engine.sample_rate;

        let (bpf, bpf_phase_offset_rad) = Self::design_bandpass(&params)?;
        let lpf = filter_design::lowpass(params.lowpass.order, params.lowpass.cutoff_frequency, fs)?;

        let tones: Vec<(f64, f64)> = params
            .source
            .interferers
            .iter()
            .map(|t| (t.frequency, t.amplitude))
            .collect();
        interferers.install(&tones);

        let capacity = params.engine.ring_capacity;
        Ok(Self {
            dut: DutGenerator::new(Self::dut_config(&params), fs),
            noise,
            interferers,
            bpf,
            lpf_i: BiquadChain::new(lpf.clone()),
            lpf_q: BiquadChain::new(lpf),
            mixer: Mixer::new(params.mixer.mode),
            rings: std::array::from_fn(|_| SampleRing::new(capacity)),
            acc: OutputAccumulator::default(),
            bpf_phase_offset_rad,
            sample_count: 0,
            params,
        })
    }

    fn dut_config(params: &Params) -> DutConfig {
        let s = &params.source;
        DutConfig {
            reference_frequency: s.reference_frequency,
            reference_amplitude: s.reference_amplitude,
            modulating_frequency: s.modulating_frequency,
            modulation_index: s.modulation_index,
            phase_shift_rad: s.phase_shift_rad(),
            sensor_amplitude: s.sensor_amplitude,
        }
    }

    /// Design the band-pass cascade and its phase offset at the reference
    /// frequency; a disabled filter is an empty chain with zero offset.
    fn design_bandpass(params: &Params) -> Result<(BiquadChain, f64), DesignError> {
        if !params.bandpass.enabled {
            return Ok((BiquadChain::default(), 0.0));
        }
        let fs = params.engine.sample_rate;
        let sections = filter_design::bandpass(
            params.bandpass.order,
            params.bandpass.center_frequency,
            params.bandpass.bandwidth,
            fs,
        )?;
        let offset =
            filter_design::cascaded_phase(&sections, params.source.reference_frequency, fs);
        Ok((BiquadChain::new(sections), offset))
    }

    /// Current (clamped) parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Samples produced since the chain was built.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// BPF phase correction currently applied to the reported phase, in
    /// radians.
    pub fn bpf_phase_offset_rad(&self) -> f64 {
        self.bpf_phase_offset_rad
    }

    /// Run one sample through the whole chain and record every tap.
    pub fn process_sample(&mut self) {
        let p = &self.params;
        let sigma = p.source.white_noise_sigma;
        let ref_amplitude = p.source.reference_amplitude;
        let phi = p.source.phase_shift_rad();
        let fs = p.engine.sample_rate;
        let bpf_enabled = p.bandpass.enabled;

        let dut = self.dut.next_sample();
        let noise = self.noise.sample(sigma) + self.interferers.generate();
        let sensor = dut.sensor_clean + noise;
        let after_bpf = if bpf_enabled {
            self.bpf.process(sensor)
        } else {
            sensor
        };
        let (mix_i, mix_q) = self.mixer.mix(after_bpf, dut.theta_ref, ref_amplitude);
        let i_out = self.lpf_i.process(mix_i);
        let q_out = self.lpf_q.process(mix_q);
        let signed = i_out * phi.cos() + q_out * phi.sin();
        let time = self.sample_count as f64 / fs;

        let values = [
            dut.reference,
            dut.modulating,
            dut.modulating + noise,
            dut.sensor_clean,
            noise,
            sensor,
            after_bpf,
            mix_i,
            mix_q,
            i_out,
            q_out,
            signed,
            time,
        ];
        for (ring, value) in self.rings.iter_mut().zip(values) {
            ring.push(value);
        }

        self.acc.add(i_out, q_out);
        self.sample_count += 1;
    }

    /// Run `count` samples back to back.
    pub fn produce(&mut self, count: usize) {
        for _ in 0..count {
            self.process_sample();
        }
    }

    /// Apply a parameter diff.
    ///
    /// Each filter is designed against the merged parameters on its own:
    /// a filter whose design fails is withheld from the diff — it keeps
    /// its previous settings and coefficients, and the error is returned
    /// — while every other supplied field still lands. A diff left with
    /// no surviving response change keeps the history and accumulator.
    pub fn apply_update(&mut self, update: &ParamsUpdate) -> Result<UpdateEffect, DesignError> {
        let mut next = self.params.clone();
        let mut effect = update.apply(&mut next);

        let mut failure = None;
        if effect.response_changed {
            if let Err(error) = Self::design_bandpass(&next) {
                next.bandpass = self.params.bandpass;
                failure = Some(error);
            }
            if let Err(error) = filter_design::lowpass(
                next.lowpass.order,
                next.lowpass.cutoff_frequency,
                next.engine.sample_rate,
            ) {
                next.lowpass = self.params.lowpass;
                failure = Some(error);
            }
            // Withholding a failed filter may leave nothing response-
            // altering in the diff; re-classify before touching history.
            effect.response_changed = self.params.response_differs(&next);
        }

        if effect.response_changed {
            // Designs against the surviving parameters cannot fail: the
            // withheld fields are the ones the chain already runs on.
            let (bpf, offset) = Self::design_bandpass(&next)?;
            let lpf = filter_design::lowpass(
                next.lowpass.order,
                next.lowpass.cutoff_frequency,
                next.engine.sample_rate,
            )?;

            self.bpf = bpf;
            self.bpf_phase_offset_rad = offset;
            self.lpf_i.replace_coefficients(&lpf);
            self.lpf_q.replace_coefficients(&lpf);
            self.lpf_i.reset();
            self.lpf_q.reset();
            self.acc.reset();
            for ring in &mut self.rings {
                ring.clear();
            }
        }

        if update.interferers.is_some() {
            let tones: Vec<(f64, f64)> = next
                .source
                .interferers
                .iter()
                .map(|t| (t.frequency, t.amplitude))
                .collect();
            self.interferers.install(&tones);
        }

        self.mixer.set_mode(next.mixer.mode);
        self.dut.set_config(Self::dut_config(&next));
        self.params = next;

        match failure {
            Some(error) => Err(error),
            None => Ok(effect),
        }
    }

    /// Write a decimated snapshot of all channels into the inactive block,
    /// derive the averaged outputs, reset the accumulator and publish.
    pub fn write_snapshot(&mut self, buffer: &DoubleBuffer) -> FrameInfo {
        let points = buffer.snapshot_points();
        let mut writer = buffer.begin_write();

        let mut data_length = 0;
        for channel in Channel::ALL {
            data_length = self.rings[channel.index()]
                .snapshot_into(writer.channel_mut(channel), points);
        }

        let (i, q) = self.acc.average();
        self.acc.reset();

        let phi = self.params.source.phase_shift_rad();
        let signed_output = i * phi.cos() + q * phi.sin();
        let phase_deg =
            wrap_phase_deg(q.atan2(i).to_degrees() - self.bpf_phase_offset_rad.to_degrees());

        writer.publish();

        let stride = self.rings[0].stride(points);
        FrameInfo {
            outputs: ScalarOutputs {
                i,
                q,
                signed_output,
                phase_deg,
            },
            effective_sample_rate: self.params.engine.sample_rate / stride as f64,
            data_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Interferer, ParamsUpdate};
    use lockin_dsp::mixer::MixerMode;

    fn quiet_params() -> Params {
        let mut p = Params::default();
        p.source.white_noise_sigma = 0.0;
        p.engine.ring_capacity = 10_000;
        p.engine.snapshot_points = 1000;
        p
    }

    #[test]
    fn test_wrap_phase_deg() {
        assert_eq!(wrap_phase_deg(0.0), 0.0);
        assert_eq!(wrap_phase_deg(180.0), 180.0);
        assert!((wrap_phase_deg(181.0) - (-179.0)).abs() < 1e-9);
        assert!((wrap_phase_deg(-180.0) - 180.0).abs() < 1e-9);
        assert!((wrap_phase_deg(359.0) - (-1.0)).abs() < 1e-9);
        assert!((wrap_phase_deg(720.0 + 30.0) - 30.0).abs() < 1e-9);
        for p in [-1000.0, -123.0, 0.1, 500.0, 7777.0] {
            let w = wrap_phase_deg(p);
            assert!(w > -180.0 && w <= 180.0, "{p} wrapped to {w}");
        }
    }

    #[test]
    fn test_rings_fill_in_lockstep() {
        let mut runner = ChainRunner::seeded(quiet_params(), 1).unwrap();
        runner.produce(500);
        for ring in &runner.rings {
            assert_eq!(ring.len(), 500);
        }
        assert_eq!(runner.sample_count(), 500);
    }

    #[test]
    fn test_time_channel_counts_seconds() {
        let mut runner = ChainRunner::seeded(quiet_params(), 1).unwrap();
        runner.produce(2000);
        let buffer = DoubleBuffer::new(1000);
        let frame = runner.write_snapshot(&buffer);

        let reader = buffer.begin_read();
        let time = reader.channel(Channel::Time);
        let stride = 10; // ring 10k, snapshot 1k
        assert_eq!(frame.data_length, 200);
        for (j, &t) in time[..frame.data_length].iter().enumerate() {
            let expected = (j * stride) as f32 / 50_000.0;
            assert!((t - expected).abs() < 1e-6, "t[{j}] = {t}, expected {expected}");
        }
    }

    #[test]
    fn test_signed_output_equals_i_at_zero_shift() {
        let mut runner = ChainRunner::seeded(quiet_params(), 2).unwrap();
        runner.produce(5000);
        let buffer = DoubleBuffer::new(1000);
        let frame = runner.write_snapshot(&buffer);
        assert!((frame.outputs.signed_output - frame.outputs.i).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_resets_accumulator() {
        let mut runner = ChainRunner::seeded(quiet_params(), 3).unwrap();
        runner.produce(1000);
        let buffer = DoubleBuffer::new(1000);
        let _ = runner.write_snapshot(&buffer);
        assert_eq!(runner.acc.count, 0);

        // With no new samples the next frame reports zeros; atan2(0, 0)
        // pins the phase to the BPF correction alone, which is ~0 for a
        // filter centered on the reference.
        let frame = runner.write_snapshot(&buffer);
        assert_eq!(frame.outputs.i, 0.0);
        assert_eq!(frame.outputs.q, 0.0);
        assert!(frame.outputs.phase_deg.abs() < 1e-9);
    }

    #[test]
    fn test_response_update_clears_rings_and_filters() {
        let mut runner = ChainRunner::seeded(quiet_params(), 4).unwrap();
        runner.produce(3000);
        assert!(runner.acc.count > 0);

        let effect = runner
            .apply_update(&ParamsUpdate {
                lowpass_cutoff: Some(5.0),
                ..Default::default()
            })
            .unwrap();
        assert!(effect.response_changed);
        assert_eq!(runner.acc.count, 0);
        for ring in &runner.rings {
            assert!(ring.is_empty(), "rings must be cleared");
        }

        // History restarts after the change: the snapshot only contains
        // post-change samples, and the time channel picks up where the
        // sample counter is.
        runner.produce(100);
        let buffer = DoubleBuffer::new(1000);
        let frame = runner.write_snapshot(&buffer);
        assert_eq!(frame.data_length, 10); // 100 samples / stride 10

        let reader = buffer.begin_read();
        let time = reader.channel(Channel::Time);
        let t0 = 3000.0 / 50_000.0;
        assert!(
            (time[0] as f64 - t0).abs() < 1e-6,
            "first post-change sample should sit at t = {t0}, got {}",
            time[0]
        );
    }

    #[test]
    fn test_light_update_keeps_history() {
        let mut runner = ChainRunner::seeded(quiet_params(), 5).unwrap();
        runner.produce(3000);

        let effect = runner
            .apply_update(&ParamsUpdate {
                reference_amplitude: Some(2.0),
                white_noise_sigma: Some(0.05),
                ..Default::default()
            })
            .unwrap();
        assert!(!effect.response_changed);
        assert_eq!(runner.rings[0].len(), 3000, "history must survive");
        assert!(runner.acc.count > 0, "accumulator must survive");
    }

    #[test]
    fn test_amplitude_only_interferer_update_keeps_history() {
        let mut params = quiet_params();
        params.source.interferers = vec![Interferer {
            id: 1,
            frequency: 50.0,
            amplitude: 0.1,
        }];
        let mut runner = ChainRunner::seeded(params, 6).unwrap();
        runner.produce(2000);

        let effect = runner
            .apply_update(&ParamsUpdate {
                interferers: Some(vec![Interferer {
                    id: 1,
                    frequency: 50.0,
                    amplitude: 0.3,
                }]),
                ..Default::default()
            })
            .unwrap();
        assert!(effect.interferers_amplitude_only);
        assert!(!effect.response_changed);
        assert_eq!(runner.rings[0].len(), 2000);
    }

    #[test]
    fn test_invalid_corner_refuses_update() {
        let mut runner = ChainRunner::seeded(quiet_params(), 7).unwrap();
        runner.produce(1000);
        let before = runner.params().clone();
        let lpf_before = runner.lpf_i.coefficients();

        // The only supplied field fails design: nothing survives of the
        // diff, so no reset happens either.
        let result = runner.apply_update(&ParamsUpdate {
            bandpass_center: Some(40_000.0), // beyond Nyquist at 50 kHz
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(runner.params(), &before, "params must be untouched");
        assert_eq!(runner.lpf_i.coefficients(), lpf_before);
        assert_eq!(runner.rings[0].len(), 1000, "history must survive");
    }

    #[test]
    fn test_mixed_update_keeps_valid_fields_on_design_failure() {
        let mut runner = ChainRunner::seeded(quiet_params(), 12).unwrap();
        runner.produce(1000);
        let bpf_before = runner.bpf.coefficients();

        let result = runner.apply_update(&ParamsUpdate {
            bandpass_center: Some(40_000.0), // rejected: beyond Nyquist
            mixer_mode: Some(MixerMode::Digital),
            lowpass_cutoff: Some(5.0),
            ..Default::default()
        });
        assert!(result.is_err(), "the failed filter must be reported");

        // The valid parts of the diff landed...
        assert_eq!(runner.params().mixer.mode, MixerMode::Digital);
        assert_eq!(runner.mixer.mode(), MixerMode::Digital);
        assert_eq!(runner.params().lowpass.cutoff_frequency, 5.0);
        // ...the failed band-pass kept its settings and coefficients...
        assert_eq!(runner.params().bandpass.center_frequency, 100.0);
        assert_eq!(runner.bpf.coefficients(), bpf_before);
        // ...and the surviving response change still reset the history.
        assert!(runner.rings[0].is_empty());
        assert_eq!(runner.acc.count, 0);
    }

    #[test]
    fn test_reference_retune_survives_bandpass_failure() {
        // A valid reference retune next to a rejected band-pass change:
        // the retune lands and the phase offset tracks the new reference
        // through the kept band-pass.
        let mut runner = ChainRunner::seeded(quiet_params(), 13).unwrap();
        let result = runner.apply_update(&ParamsUpdate {
            reference_frequency: Some(120.0),
            bandpass_center: Some(30_000.0), // rejected: beyond Nyquist
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(runner.params().source.reference_frequency, 120.0);
        assert_eq!(runner.params().bandpass.center_frequency, 100.0);

        let sections = filter_design::bandpass(2, 100.0, 50.0, 50_000.0).unwrap();
        let expected = filter_design::cascaded_phase(&sections, 120.0, 50_000.0);
        assert!((runner.bpf_phase_offset_rad() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bpf_phase_offset_tracks_reference() {
        let mut params = quiet_params();
        params.bandpass.enabled = true;
        params.bandpass.center_frequency = 100.0;
        params.source.reference_frequency = 100.0;
        let runner = ChainRunner::seeded(params.clone(), 8).unwrap();
        // Centered BPF: zero phase at the reference.
        assert!(runner.bpf_phase_offset_rad().abs() < 1e-9);

        // Off-center: the offset becomes the cascade phase at f_ref.
        let mut runner = ChainRunner::seeded(params, 9).unwrap();
        runner
            .apply_update(&ParamsUpdate {
                bandpass_center: Some(120.0),
                ..Default::default()
            })
            .unwrap();
        let sections =
            filter_design::bandpass(2, 120.0, 50.0, 50_000.0).unwrap();
        let expected = filter_design::cascaded_phase(&sections, 100.0, 50_000.0);
        assert!((runner.bpf_phase_offset_rad() - expected).abs() < 1e-12);
        assert!(expected.abs() > 1e-3);
    }

    #[test]
    fn test_disabled_bpf_is_transparent() {
        let mut params = quiet_params();
        params.bandpass.enabled = false;
        let mut runner = ChainRunner::seeded(params, 10).unwrap();
        assert_eq!(runner.bpf_phase_offset_rad(), 0.0);
        runner.produce(100);

        let buffer = DoubleBuffer::new(1000);
        let _ = runner.write_snapshot(&buffer);
        let reader = buffer.begin_read();
        let sensor = reader.channel(Channel::Sensor);
        let after = reader.channel(Channel::AfterBpf);
        assert_eq!(&sensor[..10], &after[..10]);
    }

    #[test]
    fn test_mixer_mode_switch_resets_chain() {
        let mut runner = ChainRunner::seeded(quiet_params(), 11).unwrap();
        runner.produce(1000);
        let effect = runner
            .apply_update(&ParamsUpdate {
                mixer_mode: Some(MixerMode::Digital),
                ..Default::default()
            })
            .unwrap();
        assert!(effect.response_changed);
        assert!(runner.rings[0].is_empty());
        assert_eq!(runner.mixer.mode(), MixerMode::Digital);
    }
}
