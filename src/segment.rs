// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! One fitted interval of constant angular acceleration.
//!
//! Inside `[t1, t2]` the accumulated spin phase follows
//!
//! ```text
//! φ(t) = b·Δt + c·Δt²        Δt = t − t1
//! ω(t) = b + 2c·Δt           (deg/s)
//! ```
//!
//! so `b` is the rate at `t1` and `2c` the angular acceleration. Outside the
//! interval the segment extrapolates at a constant rate: `b` before `t1`, the
//! end rate `ω(t2)` after `t2`. Acceleration is never extrapolated.
//!
//! Queries come in two flavours: by time (`*_t`, returning [`SpinState`]) and
//! by spin count (`*_n`, returning [`CountState`]). Both are pure functions of
//! the immutable segment.

use crate::error::{Result, SpinModelError};
use crate::flags::SegmentFlags;
use crate::interval::Interval;
use qtty::{Degrees, Seconds};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

/// Below this `|c|` (deg/s²) the phase law is treated as linear when solving
/// for elapsed time; the quadratic root is used above it.
pub const ACCEL_EPSILON: f64 = 1.0e-12;

/// Phase accumulated by one full rotation.
pub const DEGREES_PER_SPIN: f64 = 360.0;

/// IDPU spin periods at or below this value mean "no onboard period".
pub const IDPU_SPINPER_SENTINEL: f64 = 1.0;

/// Modeled kinematic state at a query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinState {
    /// Instantaneous spin period.
    pub spin_period: Seconds,
    /// Phase since the most recent sun pulse, in `[0, 360)`.
    pub spin_phase: Degrees,
    /// Cumulative count of the most recent sun pulse.
    pub spin_count: i64,
    /// Phase offset between the corrected model and the onboard IDPU model;
    /// exactly zero outside corrected eclipse segments.
    pub eclipse_delta_phi: Degrees,
    /// Time of the most recent sun pulse (Unix seconds).
    pub t_last: f64,
}

impl fmt::Display for SpinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spin {} phase {} period {} (last pulse {:.6}, eclipse Δφ {})",
            self.spin_count, self.spin_phase, self.spin_period, self.t_last, self.eclipse_delta_phi
        )
    }
}

/// Modeled state at a given spin count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountState {
    /// Spin period at the pulse.
    pub spin_period: Seconds,
    /// The queried spin count.
    pub spin_count: i64,
    /// Offset of the queried count from the segment boundary it was solved
    /// against: `n − c1` inside and before the segment, `n − c2` after it.
    pub spins_from_segment: i64,
    /// Time of the sun pulse carrying this count (Unix seconds).
    pub t_last: f64,
}

/// An immutable spin-model segment.
///
/// Construct with [`SpinmodelSegment::new`] and the consuming `with_*`
/// methods; once published in a [`crate::SpinModel`] it is never modified.
///
/// # Examples
///
/// ```
/// use spinmodel::SpinmodelSegment;
///
/// let seg = SpinmodelSegment::new(0.0, 100.0, 0, 500, 18.0, -0.0009).unwrap();
/// let state = seg.interp_t(50.0).unwrap();
/// assert_eq!(state.spin_count, 2);
/// assert!((state.spin_phase.value() - 177.75).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SpinmodelSegment {
    t1: f64,
    t2: f64,
    c1: i64,
    c2: i64,
    b: f64,
    c: f64,
    npts: u32,
    maxgap: f64,
    phaserr: f64,
    initial_delta_phi: f64,
    idpu_spinper: f64,
    segflags: SegmentFlags,
}

impl SpinmodelSegment {
    // ── constructors ──────────────────────────────────────────────────

    /// Create a segment covering `[t1, t2]` and spin counts `c1..=c2`.
    ///
    /// Fit diagnostics default to zero, eclipse fields to "not applicable"
    /// and flags to empty.
    ///
    /// A zero rate is accepted here; it surfaces as a
    /// [`SpinModelError::Domain`] error from the queries that divide by it.
    pub fn new(t1: f64, t2: f64, c1: i64, c2: i64, b: f64, c: f64) -> Result<Self> {
        if !(t1.is_finite() && t2.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(SpinModelError::InvalidInput(format!(
                "segment parameters must be finite (t1={t1}, t2={t2}, b={b}, c={c})"
            )));
        }
        if t1 >= t2 {
            return Err(SpinModelError::InvalidInput(format!(
                "segment start {t1} must precede end {t2}"
            )));
        }
        if c2 < c1 {
            return Err(SpinModelError::InvalidInput(format!(
                "segment spin counts decrease ({c1} -> {c2})"
            )));
        }
        Ok(Self {
            t1,
            t2,
            c1,
            c2,
            b,
            c,
            npts: 0,
            maxgap: 0.0,
            phaserr: 0.0,
            initial_delta_phi: 0.0,
            idpu_spinper: 0.0,
            segflags: SegmentFlags::empty(),
        })
    }

    /// Attach fit diagnostics.
    pub fn with_fit_stats(mut self, npts: u32, maxgap: f64, phaserr: f64) -> Self {
        self.npts = npts;
        self.maxgap = maxgap;
        self.phaserr = phaserr;
        self
    }

    /// Attach the eclipse phase offset at `t1` and the onboard spin period.
    pub fn with_eclipse(mut self, initial_delta_phi: f64, idpu_spinper: f64) -> Self {
        self.initial_delta_phi = initial_delta_phi;
        self.idpu_spinper = idpu_spinper;
        self
    }

    /// Replace the segment's quality and correction flags.
    pub fn with_flags(mut self, segflags: SegmentFlags) -> Self {
        self.segflags = segflags;
        self
    }

    // ── accessors ─────────────────────────────────────────────────────

    #[inline]
    pub fn t1(&self) -> f64 {
        self.t1
    }

    #[inline]
    pub fn t2(&self) -> f64 {
        self.t2
    }

    #[inline]
    pub fn c1(&self) -> i64 {
        self.c1
    }

    #[inline]
    pub fn c2(&self) -> i64 {
        self.c2
    }

    /// Spin rate at `t1` (deg/s).
    #[inline]
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Half the angular acceleration (deg/s²).
    #[inline]
    pub fn c(&self) -> f64 {
        self.c
    }

    #[inline]
    pub fn npts(&self) -> u32 {
        self.npts
    }

    #[inline]
    pub fn maxgap(&self) -> f64 {
        self.maxgap
    }

    #[inline]
    pub fn phaserr(&self) -> f64 {
        self.phaserr
    }

    #[inline]
    pub fn initial_delta_phi(&self) -> f64 {
        self.initial_delta_phi
    }

    #[inline]
    pub fn idpu_spinper(&self) -> f64 {
        self.idpu_spinper
    }

    #[inline]
    pub fn segflags(&self) -> SegmentFlags {
        self.segflags
    }

    /// `[t1, t2)` as an [`Interval`].
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.t1, self.t2)
    }

    /// Spin rate at `t2`, held constant when extrapolating forward.
    #[inline]
    pub fn end_rate(&self) -> f64 {
        self.b + 2.0 * self.c * (self.t2 - self.t1)
    }

    /// Phase accumulated between `t1` and `t2`.
    #[inline]
    pub fn total_phase(&self) -> f64 {
        self.phase_at(self.t2 - self.t1)
    }

    /// `true` when both the eclipse and waveform bits are set and an onboard
    /// spin period is available.
    #[inline]
    pub fn eclipse_correction_active(&self) -> bool {
        self.segflags.contains(SegmentFlags::ECLIPSE_CORRECTED)
            && self.idpu_spinper > IDPU_SPINPER_SENTINEL
    }

    // ── time queries ──────────────────────────────────────────────────

    /// State at a time inside the segment (`t1 <= t <= t2`).
    ///
    /// Choosing the covering segment is the caller's job; times outside the
    /// interval are evaluated on the quadratic regardless.
    pub fn interp_t(&self, t: f64) -> Result<SpinState> {
        check_finite(t, "query time")?;
        let dt = t - self.t1;
        let phi = self.phase_at(dt);
        let spin_period = period_from_rate(self.b + 2.0 * self.c * dt)?;
        let (whole, spin_phase) = split_spins(phi);
        let t_last = self.t1 + self.elapsed_for_phase(whole * DEGREES_PER_SPIN)?;

        Ok(SpinState {
            spin_period: Seconds::new(spin_period),
            spin_phase: Degrees::new(spin_phase),
            spin_count: offset_count(self.c1, whole)?,
            eclipse_delta_phi: Degrees::new(self.eclipse_delta(dt, phi)),
            t_last,
        })
    }

    /// State before the segment (`t < t1`), at the constant rate `b`.
    pub fn extrap_before_t(&self, t: f64) -> Result<SpinState> {
        check_finite(t, "query time")?;
        let spin_period = period_from_rate(self.b)?;
        let fracspins = (self.t1 - t) / spin_period;
        let intspins = fracspins.ceil();

        Ok(SpinState {
            spin_period: Seconds::new(spin_period),
            spin_phase: Degrees::new((intspins - fracspins) * DEGREES_PER_SPIN),
            spin_count: offset_count(self.c1, -intspins)?,
            eclipse_delta_phi: Degrees::new(0.0),
            t_last: self.t1 - intspins * spin_period,
        })
    }

    /// State after the segment (`t > t2`), at the constant end rate.
    pub fn extrap_after_t(&self, t: f64) -> Result<SpinState> {
        check_finite(t, "query time")?;
        let spin_period = period_from_rate(self.end_rate())?;
        let dt = t - self.t2;
        let fracspins = dt / spin_period;
        let intspins = fracspins.floor();

        // Same form as inside the segment, with phase counted from t2.
        let eclipse_delta_phi = if self.eclipse_correction_active() {
            self.initial_delta_phi + fracspins * DEGREES_PER_SPIN
                - dt * DEGREES_PER_SPIN / self.idpu_spinper
        } else {
            0.0
        };

        Ok(SpinState {
            spin_period: Seconds::new(spin_period),
            spin_phase: Degrees::new((fracspins - intspins) * DEGREES_PER_SPIN),
            spin_count: offset_count(self.c2, intspins)?,
            eclipse_delta_phi: Degrees::new(eclipse_delta_phi),
            t_last: self.t2 + intspins * spin_period,
        })
    }

    // ── spin-count queries ────────────────────────────────────────────

    /// Pulse time for a count inside the segment (`c1 <= n <= c2`).
    pub fn interp_n(&self, n: i64) -> Result<CountState> {
        let spins = spins_between(n, self.c1)?;
        let phi = spins as f64 * DEGREES_PER_SPIN;
        let dt = self.elapsed_for_phase(phi)?;
        let spin_period = period_from_rate(self.b + 2.0 * self.c * dt)?;
        Ok(CountState {
            spin_period: Seconds::new(spin_period),
            spin_count: n,
            spins_from_segment: spins,
            t_last: self.t1 + dt,
        })
    }

    /// Pulse time for a count before the segment (`n < c1`), at rate `b`.
    pub fn interp_before_n(&self, n: i64) -> Result<CountState> {
        let spins = spins_between(n, self.c1)?;
        let spin_period = period_from_rate(self.b)?;
        Ok(CountState {
            spin_period: Seconds::new(spin_period),
            spin_count: n,
            spins_from_segment: spins,
            t_last: self.t1 + spins as f64 * spin_period,
        })
    }

    /// Pulse time for a count after the segment (`n > c2`), at the end rate.
    pub fn interp_after_n(&self, n: i64) -> Result<CountState> {
        let spins = spins_between(n, self.c2)?;
        let spin_period = period_from_rate(self.end_rate())?;
        Ok(CountState {
            spin_period: Seconds::new(spin_period),
            spin_count: n,
            spins_from_segment: spins,
            t_last: self.t2 + spins as f64 * spin_period,
        })
    }

    // ── internals ─────────────────────────────────────────────────────

    #[inline]
    fn phase_at(&self, dt: f64) -> f64 {
        self.b * dt + self.c * dt * dt
    }

    fn eclipse_delta(&self, dt: f64, phi: f64) -> f64 {
        if self.eclipse_correction_active() {
            let idpu_phi = dt * DEGREES_PER_SPIN / self.idpu_spinper;
            self.initial_delta_phi + (phi - idpu_phi)
        } else {
            0.0
        }
    }

    /// Solve `b·dt + c·dt² = phi` for the root nearest `t1` on the forward branch.
    ///
    /// The quadratic root `(−b + √(b² + 4c·φ)) / (2c)` is evaluated in its
    /// rationalised form `2φ / (b + √(b² + 4c·φ))`, which is the same root
    /// without cancellation when `c` is small.
    pub(crate) fn elapsed_for_phase(&self, phi: f64) -> Result<f64> {
        if self.c.abs() < ACCEL_EPSILON {
            if self.b <= 0.0 {
                return Err(SpinModelError::domain(format!(
                    "non-positive spin rate b = {} in segment starting at {}",
                    self.b, self.t1
                )));
            }
            return Ok(phi / self.b);
        }
        let disc = self.b * self.b + 4.0 * self.c * phi;
        if !(disc >= 0.0) {
            return Err(SpinModelError::domain(format!(
                "phase {phi} deg is never reached by segment starting at {} (discriminant {disc})",
                self.t1
            )));
        }
        let denom = self.b + disc.sqrt();
        if denom <= 0.0 {
            return Err(SpinModelError::domain(format!(
                "no forward solution for phase {phi} deg in segment starting at {}",
                self.t1
            )));
        }
        Ok(2.0 * phi / denom)
    }
}

impl fmt::Display for SpinmodelSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}] spins {}..{} b={:.9} c={:.3e} npts={} maxgap={:.3} phaserr={:.3e} flags={}",
            self.t1,
            self.t2,
            self.c1,
            self.c2,
            self.b,
            self.c,
            self.npts,
            self.maxgap,
            self.phaserr,
            self.segflags
        )
    }
}

// Deserialization re-runs the constructor checks.
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SpinmodelSegment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        struct Raw {
            t1: f64,
            t2: f64,
            c1: i64,
            c2: i64,
            b: f64,
            c: f64,
            #[serde(default)]
            npts: u32,
            #[serde(default)]
            maxgap: f64,
            #[serde(default)]
            phaserr: f64,
            #[serde(default)]
            initial_delta_phi: f64,
            #[serde(default)]
            idpu_spinper: f64,
            #[serde(default)]
            segflags: SegmentFlags,
        }

        let raw = Raw::deserialize(deserializer)?;
        let seg = SpinmodelSegment::new(raw.t1, raw.t2, raw.c1, raw.c2, raw.b, raw.c)
            .map_err(D::Error::custom)?;
        Ok(seg
            .with_fit_stats(raw.npts, raw.maxgap, raw.phaserr)
            .with_eclipse(raw.initial_delta_phi, raw.idpu_spinper)
            .with_flags(raw.segflags))
    }
}

#[inline]
fn check_finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SpinModelError::domain(format!("{what} is not finite: {value}")))
    }
}

#[inline]
fn period_from_rate(rate: f64) -> Result<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(DEGREES_PER_SPIN / rate)
    } else {
        Err(SpinModelError::domain(format!(
            "spin rate must be positive, got {rate} deg/s"
        )))
    }
}

/// `base + spins`, where `spins` is a whole number of rotations.
fn offset_count(base: i64, spins: f64) -> Result<i64> {
    // -2^63 and 2^63 are exact as f64.
    if spins >= i64::MIN as f64 && spins < i64::MAX as f64 {
        if let Some(count) = base.checked_add(spins as i64) {
            return Ok(count);
        }
    }
    Err(SpinModelError::domain(format!(
        "spin count {base} + {spins} is not representable"
    )))
}

/// `n - base` without overflow.
#[inline]
fn spins_between(n: i64, base: i64) -> Result<i64> {
    n.checked_sub(base).ok_or_else(|| {
        SpinModelError::domain(format!(
            "spin count {n} is too far from segment boundary {base}"
        ))
    })
}

/// `divmod(phi, 360)` with the remainder kept in `[0, 360)`.
#[inline]
fn split_spins(phi: f64) -> (f64, f64) {
    let mut whole = (phi / DEGREES_PER_SPIN).floor();
    let mut phase = phi - whole * DEGREES_PER_SPIN;
    if phase < 0.0 {
        whole -= 1.0;
        phase += DEGREES_PER_SPIN;
    } else if phase >= DEGREES_PER_SPIN {
        whole += 1.0;
        phase -= DEGREES_PER_SPIN;
    }
    (whole, phase)
}
