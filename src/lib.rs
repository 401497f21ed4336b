// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Spin Model
//!
//! Piecewise-quadratic spin-phase models for spinning spacecraft, fitted to
//! sun-sensor pulses and queried by time or by spin count.
//!
//! # Core types
//!
//! - [`SpinmodelSegment`] — one interval of constant angular acceleration,
//!   with interpolation inside and constant-rate extrapolation outside.
//! - [`SpinModel`] — an ordered, validated table of segments and the query
//!   engine over it.
//! - [`SegmentTableBuilder`] — fits sun pulses into a [`SpinModel`].
//! - [`SpinState`] / [`CountState`] — results of time and spin-count queries.
//! - [`SegmentFlags`] — eclipse and correction bits carried by a segment.
//! - [`Interval<T>`] — half-open time range, Unix seconds by default.
//!
//! # Queries
//!
//! | Query position | Answered by |
//! |----------------|-------------|
//! | before the table | backward extrapolation at the first segment's start rate |
//! | inside a segment | the segment's quadratic phase law |
//! | in a gap | forward extrapolation of the preceding segment |
//! | after the table | forward extrapolation at the last segment's end rate |
//!
//! # Eclipses
//!
//! While the spacecraft is in shadow no sun pulses are produced and the
//! onboard processor free-runs at a fixed spin period. Segments spanning an
//! eclipse carry [`SegmentFlags::ECLIPSE`]; when the onboard period is known
//! they also carry [`SegmentFlags::WAVEFORM_CORRECTION`] and report the phase
//! offset between the model and the onboard clock as
//! [`SpinState::eclipse_delta_phi`].
//!
//! # Example
//!
//! ```
//! use spinmodel::{BuilderConfig, SegmentTableBuilder, SunPulse};
//!
//! let pulses: Vec<SunPulse> = (0..100).map(|k| SunPulse::new(3.0 * k as f64, k)).collect();
//! let model = SegmentTableBuilder::new(BuilderConfig::default())
//!     .unwrap()
//!     .build(&pulses)
//!     .unwrap();
//!
//! let state = model.query_time(151.5).unwrap();
//! assert_eq!(state.spin_count, 50);
//! assert!((state.spin_phase.value() - 180.0).abs() < 1e-6);
//! ```

mod builder;
pub mod epoch;
mod error;
mod flags;
mod interval;
mod model;
mod pipeline;
mod segment;

// ── Re-exports ────────────────────────────────────────────────────────────

pub use builder::{
    eclipse_intervals_from_telemetry, BuilderConfig, EclipseInterval, IdpuSpinSample,
    SegmentTableBuilder, SunPulse,
};
pub use error::{Result, SpinModelError};
pub use flags::SegmentFlags;
pub use interval::{complement_within, Interval, UtcInterval};
pub use model::{SegmentCursor, SegmentLocation, SpinModel, SpinModelHandle};
pub use pipeline::{
    build_from_source, spin_phase_series, write_spin_phase, FillPolicy, InMemoryPulses,
    InMemoryStore, PulseSource, SpinPhaseSeries, VariableSink,
};
pub use segment::{
    CountState, SpinState, SpinmodelSegment, ACCEL_EPSILON, DEGREES_PER_SPIN,
    IDPU_SPINPER_SENTINEL,
};
