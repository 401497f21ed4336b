// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Segment-table builder.
//!
//! Turns an ordered run of sun pulses into a contiguous table of
//! [`SpinmodelSegment`]s.
//!
//! # Algorithm
//!
//! Segments are grown greedily from an anchor pulse. Within a segment the
//! phase of pulse `k` is `φ_k = 360·(count_k − count_anchor)` and the phase
//! law `φ(Δt) = b·Δt + c·Δt²` is fitted by least squares, constrained to pass
//! exactly through the anchor and the current end pulse. The running sums
//! (`ΣΔt²`, `ΣΔt³`, `ΣΔt⁴`, `ΣΔt·φ`, `ΣΔt²·φ`) make each refit O(1).
//!
//! A candidate pulse joins the segment when
//!
//! 1. its phase, predicted by the current fit, is within
//!    [`BuilderConfig::max_phase_error`] seconds of the observed pulse,
//! 2. the gap to it does not exceed [`BuilderConfig::max_gap`], and
//! 3. the span to it does not touch an eclipse.
//!
//! Otherwise the segment closes at its last pulse, which anchors the next
//! segment, so `t2`/`c2` of one segment are exactly `t1`/`c1` of the next.
//!
//! Pulse pairs failing (2) or (3) are joined by a two-pulse *bridge* that is
//! rate-continuous with the preceding segment. Bridges over an eclipse carry
//! [`SegmentFlags::ECLIPSE`], plus [`SegmentFlags::WAVEFORM_CORRECTION`] and an
//! `initial_delta_phi` when the onboard spin period is known. The offset is
//! chosen so that the correction is zero at eclipse entry; at eclipse exit it
//! equals the slip between the free-running onboard model and the resumed
//! sun pulses.

use crate::error::{Result, SpinModelError};
use crate::flags::SegmentFlags;
use crate::interval::Interval;
use crate::model::SpinModel;
use crate::segment::{SpinmodelSegment, DEGREES_PER_SPIN, IDPU_SPINPER_SENTINEL};
use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One observed sun pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SunPulse {
    /// Pulse time (Unix seconds).
    pub time: f64,
    /// Cumulative spin count carried by the pulse.
    pub count: i64,
}

impl SunPulse {
    pub const fn new(time: f64, count: i64) -> Self {
        Self { time, count }
    }
}

/// Onboard (IDPU) spin period telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdpuSpinSample {
    pub time: f64,
    /// Spin period used onboard (s); `<= 1.0` means "not in eclipse mode".
    pub idpu_spinper: f64,
}

/// A time range during which the spacecraft is in shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EclipseInterval {
    pub interval: Interval,
    /// Onboard spin period during the eclipse; `<= 1.0` when unknown.
    pub idpu_spinper: f64,
}

/// Fit configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct BuilderConfig {
    /// Largest accepted residual between a pulse and the fitted phase law (s).
    pub max_phase_error: f64,
    /// Largest pulse-to-pulse gap a fitted segment may span (s).
    pub max_gap: f64,
    /// Spin period assumed for a segment built from a single pulse (s).
    pub nominal_spin_period: f64,
    /// `phaserr` recorded on degraded segments (s).
    pub degraded_phase_error: f64,
    /// Emit degraded segments instead of failing with
    /// [`SpinModelError::FitTolerance`].
    pub allow_degraded: bool,
    /// Largest spacing between IDPU telemetry samples belonging to the same
    /// eclipse (s).
    pub max_telemetry_gap: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_phase_error: 1.0e-3,
            max_gap: 10.0,
            nominal_spin_period: 3.0,
            degraded_phase_error: 1.0,
            allow_degraded: true,
            max_telemetry_gap: 60.0,
        }
    }
}

impl BuilderConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_phase_error", self.max_phase_error),
            ("max_gap", self.max_gap),
            ("nominal_spin_period", self.nominal_spin_period),
            ("degraded_phase_error", self.degraded_phase_error),
            ("max_telemetry_gap", self.max_telemetry_gap),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpinModelError::InvalidInput(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.degraded_phase_error < self.max_phase_error {
            return Err(SpinModelError::InvalidInput(
                "degraded_phase_error must be >= max_phase_error".into(),
            ));
        }
        Ok(())
    }
}

/// Group IDPU telemetry into eclipse intervals.
///
/// Consecutive samples reporting a usable spin period (`> 1.0` s) and spaced
/// no more than `max_sample_gap` apart form one interval spanning the first to
/// the last sample; its period is the mean over the group. Isolated single
/// samples carry no extent and are dropped.
pub fn eclipse_intervals_from_telemetry(
    samples: &[IdpuSpinSample],
    max_sample_gap: f64,
) -> Vec<EclipseInterval> {
    let mut out = Vec::new();
    let mut group: Option<TelemetryGroup> = None;

    for s in samples {
        let usable = s.time.is_finite() && s.idpu_spinper > IDPU_SPINPER_SENTINEL;
        group = match (group, usable) {
            (Some(g), true) if s.time - g.last <= max_sample_gap => Some(TelemetryGroup {
                last: s.time,
                sum: g.sum + s.idpu_spinper,
                n: g.n + 1,
                ..g
            }),
            (g, true) => {
                close_group(g, &mut out);
                Some(TelemetryGroup {
                    start: s.time,
                    last: s.time,
                    sum: s.idpu_spinper,
                    n: 1,
                })
            }
            (g, false) => {
                close_group(g, &mut out);
                None
            }
        };
    }
    close_group(group, &mut out);
    out
}

#[derive(Debug, Clone, Copy)]
struct TelemetryGroup {
    start: f64,
    last: f64,
    sum: f64,
    n: usize,
}

fn close_group(group: Option<TelemetryGroup>, out: &mut Vec<EclipseInterval>) {
    let Some(g) = group else {
        return;
    };
    if g.n >= 2 && g.last > g.start {
        out.push(EclipseInterval {
            interval: Interval::new(g.start, g.last),
            idpu_spinper: g.sum / g.n as f64,
        });
    } else {
        warn!("dropping isolated IDPU spin period sample at {}", g.start);
    }
}

/// Builds [`SpinModel`] tables from sun pulses.
#[derive(Debug, Clone, Default)]
pub struct SegmentTableBuilder {
    config: BuilderConfig,
    eclipses: Vec<EclipseInterval>,
}

impl SegmentTableBuilder {
    pub fn new(config: BuilderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            eclipses: Vec::new(),
        })
    }

    /// Attach the eclipse intervals covering the pulses to be fitted.
    pub fn with_eclipses(mut self, mut eclipses: Vec<EclipseInterval>) -> Self {
        eclipses.retain(|e| !e.interval.is_empty());
        eclipses.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));
        self.eclipses = eclipses;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Fit `pulses` (strictly increasing in time and count) into a table.
    ///
    /// An empty slice yields an empty table; every query against it reports
    /// [`SpinModelError::NoData`].
    pub fn build(&self, pulses: &[SunPulse]) -> Result<SpinModel> {
        validate_pulses(pulses)?;

        let segments = match pulses {
            [] => {
                info!("no sun pulses; spin model table is empty");
                Vec::new()
            }
            [single] => vec![self.degraded_segment(single)?],
            _ => self.fit_segments(pulses)?,
        };

        let model = SpinModel::from_segments(segments)?;
        if let Some(coverage) = model.coverage() {
            info!(
                "built spin model: {} segments from {} pulses covering {}",
                model.len(),
                pulses.len(),
                coverage
            );
        }
        Ok(model)
    }

    fn fit_segments(&self, pulses: &[SunPulse]) -> Result<Vec<SpinmodelSegment>> {
        let mut segments: Vec<SpinmodelSegment> = Vec::new();
        let mut anchor = 0;

        while anchor + 1 < pulses.len() {
            if let Some(eclipse) = self.pair_break(pulses, anchor) {
                let prev_rate = segments
                    .last()
                    .filter(|s| s.t2() == pulses[anchor].time)
                    .map(SpinmodelSegment::end_rate);
                let seg = self.bridge(pulses[anchor], pulses[anchor + 1], prev_rate, eclipse)?;
                debug!("bridge segment {seg}");
                segments.push(seg);
                anchor += 1;
                continue;
            }

            let mut fit = PhaseFit::new(pulses[anchor]);
            fit.push(pulses[anchor + 1]);
            let mut end = anchor + 1;
            while end + 1 < pulses.len() && self.pair_break(pulses, end).is_none() {
                let candidate = pulses[end + 1];
                if fit.residual(candidate) > self.config.max_phase_error {
                    break;
                }
                fit.push(candidate);
                end += 1;
            }

            let seg = fit.finish(&pulses[anchor..=end])?;
            if seg.phaserr() > self.config.max_phase_error {
                warn!(
                    "segment starting at {} exceeds phase tolerance after refit: {:.3e} s",
                    seg.t1(),
                    seg.phaserr()
                );
            }
            debug!("fitted segment {seg}");
            segments.push(seg);
            anchor = end;
        }
        Ok(segments)
    }

    /// `Some(_)` when the pair `(k, k+1)` must be bridged instead of fitted;
    /// the inner option is the eclipse touching the pair, if any.
    fn pair_break(&self, pulses: &[SunPulse], k: usize) -> Option<Option<EclipseInterval>> {
        let span = Interval::new(pulses[k].time, pulses[k + 1].time);
        let eclipse = self.eclipse_overlapping(span);
        if eclipse.is_some() || span.duration().value() > self.config.max_gap {
            Some(eclipse)
        } else {
            None
        }
    }

    fn eclipse_overlapping(&self, span: Interval) -> Option<EclipseInterval> {
        let first = self
            .eclipses
            .partition_point(|e| e.interval.end <= span.start);
        self.eclipses
            .get(first)
            .filter(|e| e.interval.intersection(&span).is_some())
            .copied()
    }

    fn bridge(
        &self,
        from: SunPulse,
        to: SunPulse,
        prev_rate: Option<f64>,
        eclipse: Option<EclipseInterval>,
    ) -> Result<SpinmodelSegment> {
        let span = to.time - from.time;
        let phi = (to.count - from.count) as f64 * DEGREES_PER_SPIN;

        // Keep the rate continuous when the implied end rate stays positive.
        let (b, c) = match prev_rate {
            Some(rate) if rate > 0.0 && 2.0 * phi / span - rate > 0.0 => {
                (rate, (phi - rate * span) / (span * span))
            }
            _ => (phi / span, 0.0),
        };

        let seg = SpinmodelSegment::new(from.time, to.time, from.count, to.count, b, c)?
            .with_fit_stats(2, span, 0.0);

        let Some(eclipse) = eclipse else {
            return Ok(seg);
        };

        if eclipse.idpu_spinper > IDPU_SPINPER_SENTINEL {
            let entry = eclipse.interval.start.max(from.time) - from.time;
            let model_phi = b * entry + c * entry * entry;
            let idpu_phi = entry * DEGREES_PER_SPIN / eclipse.idpu_spinper;
            Ok(seg
                .with_eclipse(idpu_phi - model_phi, eclipse.idpu_spinper)
                .with_flags(SegmentFlags::ECLIPSE_CORRECTED))
        } else {
            warn!(
                "eclipse {} has no onboard spin period; phase correction unavailable",
                eclipse.interval
            );
            Ok(seg.with_flags(SegmentFlags::ECLIPSE))
        }
    }

    fn degraded_segment(&self, pulse: &SunPulse) -> Result<SpinmodelSegment> {
        if !self.config.allow_degraded {
            return Err(SpinModelError::FitTolerance {
                time: pulse.time,
                phase_error: self.config.degraded_phase_error,
                tolerance: self.config.max_phase_error,
            });
        }
        warn!(
            "single sun pulse at {}; emitting coasting segment at nominal period {} s",
            pulse.time, self.config.nominal_spin_period
        );
        let period = self.config.nominal_spin_period;
        Ok(SpinmodelSegment::new(
            pulse.time,
            pulse.time + period,
            pulse.count,
            pulse.count + 1,
            DEGREES_PER_SPIN / period,
            0.0,
        )?
        .with_fit_stats(1, 0.0, self.config.degraded_phase_error)
        .with_flags(SegmentFlags::DEGRADED))
    }
}

fn validate_pulses(pulses: &[SunPulse]) -> Result<()> {
    if let Some(bad) = pulses.iter().find(|p| !p.time.is_finite()) {
        return Err(SpinModelError::InvalidInput(format!(
            "sun pulse time is not finite: {}",
            bad.time
        )));
    }
    for (i, w) in pulses.windows(2).enumerate() {
        if w[1].time <= w[0].time {
            return Err(SpinModelError::InvalidInput(format!(
                "sun pulse times must increase (index {}: {} -> {})",
                i + 1,
                w[0].time,
                w[1].time
            )));
        }
        if w[1].count <= w[0].count {
            return Err(SpinModelError::InvalidInput(format!(
                "sun pulse counts must increase (index {}: {} -> {})",
                i + 1,
                w[0].count,
                w[1].count
            )));
        }
    }
    Ok(())
}

/// Running least-squares fit of `φ = b·d + c·d²` through the anchor and the
/// current end pulse.
#[derive(Debug, Clone)]
struct PhaseFit {
    anchor: SunPulse,
    end_dt: f64,
    end_phi: f64,
    npts: u32,
    s2: f64,
    s3: f64,
    s4: f64,
    r1: f64,
    r2: f64,
    b: f64,
    c: f64,
}

impl PhaseFit {
    fn new(anchor: SunPulse) -> Self {
        Self {
            anchor,
            end_dt: 0.0,
            end_phi: 0.0,
            npts: 1,
            s2: 0.0,
            s3: 0.0,
            s4: 0.0,
            r1: 0.0,
            r2: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }

    fn offsets(&self, p: SunPulse) -> (f64, f64) {
        (
            p.time - self.anchor.time,
            (p.count - self.anchor.count) as f64 * DEGREES_PER_SPIN,
        )
    }

    fn push(&mut self, p: SunPulse) {
        let (d, phi) = self.offsets(p);
        let d2 = d * d;
        self.s2 += d2;
        self.s3 += d2 * d;
        self.s4 += d2 * d2;
        self.r1 += d * phi;
        self.r2 += d2 * phi;
        self.npts += 1;
        self.end_dt = d;
        self.end_phi = phi;
        self.refit();
    }

    /// With `u = d² − D·d` (zero at both ends) the constrained model is
    /// `φ = Φ·d/D + c·u`, so `c = Σu·y / Σu²` with `y = φ − Φ·d/D`.
    fn refit(&mut self) {
        let big_d = self.end_dt;
        let slope = self.end_phi / big_d;
        let suu = self.s4 - 2.0 * big_d * self.s3 + big_d * big_d * self.s2;
        let suy = self.r2 - slope * self.s3 - big_d * self.r1 + big_d * slope * self.s2;

        let c = if self.npts > 2 && suu > f64::EPSILON * self.s4 {
            suy / suu
        } else {
            0.0
        };
        let b = slope - c * big_d;

        // A fit that stops spinning forward anywhere in the span is not usable.
        if b > 0.0 && b + 2.0 * c * big_d > 0.0 {
            self.b = b;
            self.c = c;
        } else {
            self.b = slope;
            self.c = 0.0;
        }
    }

    fn residual(&self, p: SunPulse) -> f64 {
        let (d, phi) = self.offsets(p);
        let rate = self.b + 2.0 * self.c * d;
        if rate <= 0.0 {
            return f64::INFINITY;
        }
        (self.b * d + self.c * d * d - phi).abs() / rate
    }

    fn finish(&self, pulses: &[SunPulse]) -> Result<SpinmodelSegment> {
        let last = pulses[pulses.len() - 1];
        let maxgap = pulses
            .windows(2)
            .map(|w| w[1].time - w[0].time)
            .fold(0.0, f64::max);
        let phaserr = pulses
            .iter()
            .map(|p| self.residual(*p))
            .fold(0.0, f64::max);
        Ok(SpinmodelSegment::new(
            self.anchor.time,
            last.time,
            self.anchor.count,
            last.count,
            self.b,
            self.c,
        )?
        .with_fit_stats(self.npts, maxgap, phaserr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pulses of a segment with phase law `b·Δt + c·Δt²` starting at `t0`.
    fn synth_pulses(t0: f64, count0: i64, b: f64, c: f64, spins: i64) -> Vec<SunPulse> {
        (0..=spins)
            .map(|k| {
                let phi = k as f64 * 360.0;
                let dt = if c == 0.0 {
                    phi / b
                } else {
                    2.0 * phi / (b + (b * b + 4.0 * c * phi).sqrt())
                };
                SunPulse::new(t0 + dt, count0 + k)
            })
            .collect()
    }

    fn builder() -> SegmentTableBuilder {
        SegmentTableBuilder::new(BuilderConfig::default()).unwrap()
    }

    fn assert_contiguous(model: &SpinModel) {
        for w in model.segments().windows(2) {
            assert_eq!(w[0].t2(), w[1].t1());
            assert_eq!(w[0].c2(), w[1].c1());
        }
    }

    #[test]
    fn test_constant_rate_fits_one_segment() {
        let pulses = synth_pulses(1_000.0, 0, 120.0, 0.0, 99);
        let model = builder().build(&pulses).unwrap();
        assert_eq!(model.len(), 1);
        let seg = &model.segments()[0];
        assert_eq!(seg.npts(), 100);
        assert_eq!((seg.c1(), seg.c2()), (0, 99));
        assert!((seg.b() - 120.0).abs() < 1e-9);
        assert!(seg.c().abs() < 1e-9);
        assert!(seg.phaserr() < 1e-9);
        assert!((seg.maxgap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_acceleration_fits_one_segment() {
        let pulses = synth_pulses(0.0, 10, 120.0, 1e-4, 200);
        let model = builder().build(&pulses).unwrap();
        assert_eq!(model.len(), 1);
        let seg = &model.segments()[0];
        assert!((seg.b() - 120.0).abs() < 1e-6, "b = {}", seg.b());
        assert!((seg.c() - 1e-4).abs() < 1e-8, "c = {}", seg.c());
        assert!(seg.phaserr() < 1e-6);
    }

    #[test]
    fn test_rate_change_splits_segments() {
        let mut pulses: Vec<SunPulse> = (0..=50).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
        pulses.extend((1..=50).map(|m| SunPulse::new(150.0 + m as f64 * 2.9, 50 + m)));

        let model = builder().build(&pulses).unwrap();
        assert_eq!(model.len(), 2);
        assert_contiguous(&model);
        let (a, b) = (&model.segments()[0], &model.segments()[1]);
        assert_eq!((a.t1(), a.t2(), a.c1(), a.c2()), (0.0, 150.0, 0, 50));
        assert_eq!((b.c1(), b.c2()), (50, 100));
        assert!((a.b() - 120.0).abs() < 1e-9);
        assert!((b.b() - 360.0 / 2.9).abs() < 1e-9);
    }

    #[test]
    fn test_every_pulse_is_reproduced() {
        let mut pulses = synth_pulses(0.0, 0, 120.0, 2e-4, 60);
        let t = pulses.last().unwrap().time;
        pulses.extend(synth_pulses(t, 60, 121.0, -3e-4, 60).into_iter().skip(1));

        let model = builder().build(&pulses).unwrap();
        assert_contiguous(&model);
        for p in &pulses {
            let s = model.query_time(p.time).unwrap();
            let reached = s.spin_count as f64 + s.spin_phase.value() / 360.0;
            assert!(
                (reached - p.count as f64).abs() < 1e-3,
                "pulse {} at {} modeled as {}",
                p.count,
                p.time,
                reached
            );
        }
    }

    #[test]
    fn test_data_gap_is_bridged() {
        let mut pulses: Vec<SunPulse> = (0..=20).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
        pulses.extend((0..=20).map(|m| SunPulse::new(90.0 + m as f64 * 3.0, 30 + m)));

        let model = builder().build(&pulses).unwrap();
        assert_eq!(model.len(), 3);
        assert_contiguous(&model);
        let bridge = &model.segments()[1];
        assert_eq!((bridge.t1(), bridge.t2()), (60.0, 90.0));
        assert_eq!((bridge.c1(), bridge.c2()), (20, 30));
        assert_eq!(bridge.npts(), 2);
        assert_eq!(bridge.maxgap(), 30.0);
        assert!((bridge.b() - 120.0).abs() < 1e-9);
        assert!(bridge.c().abs() < 1e-12);
        assert!(!bridge.segflags().is_eclipse());
    }

    #[test]
    fn test_bridge_keeps_rate_continuous() {
        let mut pulses: Vec<SunPulse> = (0..=20).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
        // 11 spins over 30 s across the gap: the bridge has to spin up.
        pulses.extend((0..=5).map(|m| SunPulse::new(90.0 + m as f64 * 2.5, 31 + m)));

        let model = builder().build(&pulses).unwrap();
        let bridge = &model.segments()[1];
        assert!((bridge.b() - 120.0).abs() < 1e-9);
        assert!((bridge.total_phase() - 11.0 * 360.0).abs() < 1e-9);
        assert!(bridge.c() > 0.0);
    }

    #[test]
    fn test_eclipse_bridge_carries_correction() {
        let mut pulses: Vec<SunPulse> = (0..=100).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
        pulses.extend((0..=50).map(|m| SunPulse::new(2_100.0 + m as f64 * 3.0, 700 + m)));
        let eclipse = EclipseInterval {
            interval: Interval::new(310.0, 2_000.0),
            idpu_spinper: 3.001,
        };

        let model = builder()
            .with_eclipses(vec![eclipse])
            .build(&pulses)
            .unwrap();
        assert_eq!(model.len(), 3);
        let bridge = &model.segments()[1];
        assert_eq!(bridge.segflags(), SegmentFlags::ECLIPSE_CORRECTED);
        assert_eq!(bridge.idpu_spinper(), 3.001);

        let at_entry = model.query_time(310.0).unwrap();
        assert!(at_entry.eclipse_delta_phi.value().abs() < 1e-9);

        let at_exit = bridge.interp_t(2_100.0).unwrap();
        let expected = 1_790.0 * 360.0 / 3.0 - 1_790.0 * 360.0 / 3.001;
        assert!((at_exit.eclipse_delta_phi.value() - expected).abs() < 1e-6);

        assert_eq!(model.eclipse_segments().count(), 1);
        assert_eq!(model.query_time(100.0).unwrap().eclipse_delta_phi.value(), 0.0);
    }

    #[test]
    fn test_eclipse_without_onboard_period() {
        let mut pulses: Vec<SunPulse> = (0..=10).map(|k| SunPulse::new(k as f64 * 3.0, k)).collect();
        pulses.extend((0..=10).map(|m| SunPulse::new(33.0 + m as f64 * 3.0, 11 + m)));
        let eclipse = EclipseInterval {
            interval: Interval::new(31.0, 32.0),
            idpu_spinper: 0.0,
        };
        let model = builder()
            .with_eclipses(vec![eclipse])
            .build(&pulses)
            .unwrap();
        let flagged: Vec<_> = model.eclipse_segments().collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].segflags(), SegmentFlags::ECLIPSE);
        assert_eq!(flagged[0].t1(), 30.0);
        assert_eq!(
            model.query_time(31.5).unwrap().eclipse_delta_phi.value(),
            0.0
        );
    }

    #[test]
    fn test_single_pulse_is_degraded() {
        let model = builder().build(&[SunPulse::new(500.0, 7)]).unwrap();
        assert_eq!(model.len(), 1);
        let seg = &model.segments()[0];
        assert!(seg.segflags().is_degraded());
        assert_eq!(seg.phaserr(), 1.0);
        assert_eq!(seg.c(), 0.0);
        assert_eq!((seg.c1(), seg.c2()), (7, 8));
        assert_eq!(seg.t2(), 503.0);
    }

    #[test]
    fn test_single_pulse_strict_fails() {
        let config = BuilderConfig {
            allow_degraded: false,
            ..BuilderConfig::default()
        };
        let err = SegmentTableBuilder::new(config)
            .unwrap()
            .build(&[SunPulse::new(500.0, 7)])
            .unwrap_err();
        assert!(matches!(err, SpinModelError::FitTolerance { time, .. } if time == 500.0));
    }

    #[test]
    fn test_empty_input_gives_empty_table() {
        let model = builder().build(&[]).unwrap();
        assert!(model.is_empty());
        assert!(matches!(
            model.query_time(0.0),
            Err(SpinModelError::NoData(_))
        ));
    }

    #[test]
    fn test_invalid_pulses_rejected() {
        let backwards = [SunPulse::new(10.0, 1), SunPulse::new(9.0, 2)];
        assert!(matches!(
            builder().build(&backwards),
            Err(SpinModelError::InvalidInput(_))
        ));
        let repeated_count = [SunPulse::new(10.0, 1), SunPulse::new(13.0, 1)];
        assert!(builder().build(&repeated_count).is_err());
        let nan = [SunPulse::new(f64::NAN, 1)];
        assert!(builder().build(&nan).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(BuilderConfig::default().validate().is_ok());
        let bad = BuilderConfig {
            max_gap: 0.0,
            ..BuilderConfig::default()
        };
        assert!(SegmentTableBuilder::new(bad).is_err());
        let inverted = BuilderConfig {
            degraded_phase_error: 1e-6,
            ..BuilderConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_eclipse_intervals_from_telemetry() {
        let samples = [
            IdpuSpinSample { time: 0.0, idpu_spinper: 0.0 },
            IdpuSpinSample { time: 10.0, idpu_spinper: 3.0 },
            IdpuSpinSample { time: 20.0, idpu_spinper: 3.002 },
            IdpuSpinSample { time: 30.0, idpu_spinper: 3.004 },
            IdpuSpinSample { time: 40.0, idpu_spinper: 0.0 },
            IdpuSpinSample { time: 500.0, idpu_spinper: 2.9 },
            IdpuSpinSample { time: 900.0, idpu_spinper: 2.9 },
            IdpuSpinSample { time: 910.0, idpu_spinper: 2.9 },
        ];
        let eclipses = eclipse_intervals_from_telemetry(&samples, 60.0);
        assert_eq!(eclipses.len(), 2);
        assert_eq!(eclipses[0].interval, Interval::new(10.0, 30.0));
        assert!((eclipses[0].idpu_spinper - 3.002).abs() < 1e-12);
        assert_eq!(eclipses[1].interval, Interval::new(900.0, 910.0));
    }
}
