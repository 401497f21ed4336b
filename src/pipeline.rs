// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Telemetry in, time series out.
//!
//! The engine itself never touches a mission archive. Sun pulses and onboard
//! spin periods arrive through a [`PulseSource`]; modeled spin phase leaves
//! through a [`VariableSink`] as a [`SpinPhaseSeries`]. The two in-memory
//! implementations here back the tests and small tools.

use crate::builder::{
    eclipse_intervals_from_telemetry, BuilderConfig, IdpuSpinSample, SegmentTableBuilder,
    SunPulse,
};
use crate::error::{Result, SpinModelError};
use crate::interval::Interval;
use crate::model::SpinModel;
use crate::segment::SpinState;
use log::{debug, info, warn};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Supplier of spin telemetry for a time range.
pub trait PulseSource {
    /// Sun pulses with cumulative counts whose time lies in `range`, ordered
    /// by time.
    fn sun_pulses(&self, range: Interval) -> Result<Vec<SunPulse>>;

    /// Onboard (IDPU) spin-period samples in `range`. Sources without eclipse
    /// telemetry keep the default.
    fn idpu_spin_periods(&self, _range: Interval) -> Result<Vec<IdpuSpinSample>> {
        Ok(Vec::new())
    }
}

/// Destination for modeled spin-phase series.
pub trait VariableSink {
    /// Store `series` under `name`, replacing any previous variable of that name.
    fn store(&mut self, name: &str, series: SpinPhaseSeries) -> Result<()>;
}

/// Column-oriented spin state sampled at a list of times.
///
/// All columns have the same length. Spin counts are stored as `f64` so that
/// fill samples can carry NaN like every other column.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpinPhaseSeries {
    pub times: Vec<f64>,
    pub spin_period: Vec<f64>,
    pub spin_phase: Vec<f64>,
    pub spin_count: Vec<f64>,
    pub eclipse_delta_phi: Vec<f64>,
    pub t_last: Vec<f64>,
}

impl SpinPhaseSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            spin_period: Vec::with_capacity(capacity),
            spin_phase: Vec::with_capacity(capacity),
            spin_count: Vec::with_capacity(capacity),
            eclipse_delta_phi: Vec::with_capacity(capacity),
            t_last: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, t: f64, state: &SpinState) {
        self.times.push(t);
        self.spin_period.push(state.spin_period.value());
        self.spin_phase.push(state.spin_phase.value());
        self.spin_count.push(state.spin_count as f64);
        self.eclipse_delta_phi.push(state.eclipse_delta_phi.value());
        self.t_last.push(state.t_last);
    }

    /// Append a sample whose state columns are all NaN.
    pub fn push_fill(&mut self, t: f64) {
        self.times.push(t);
        self.spin_period.push(f64::NAN);
        self.spin_phase.push(f64::NAN);
        self.spin_count.push(f64::NAN);
        self.eclipse_delta_phi.push(f64::NAN);
        self.t_last.push(f64::NAN);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// What to do with a sample time the model cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FillPolicy {
    /// Leave the sample out of the series.
    Skip,
    /// Keep the time and fill every state column with NaN.
    #[default]
    Nan,
    /// Fail the whole request with the first error.
    Abort,
}

/// Fetch telemetry for `range` and build a table from it.
///
/// Eclipse intervals are derived from the onboard spin-period samples using
/// `config.max_telemetry_gap`.
pub fn build_from_source<S: PulseSource + ?Sized>(
    source: &S,
    range: Interval,
    config: BuilderConfig,
) -> Result<SpinModel> {
    if range.is_empty() || !(range.start.is_finite() && range.end.is_finite()) {
        return Err(SpinModelError::InvalidInput(format!(
            "build range {range} is empty or not finite"
        )));
    }
    let pulses = source.sun_pulses(range)?;
    let samples = source.idpu_spin_periods(range)?;
    let eclipses = eclipse_intervals_from_telemetry(&samples, config.max_telemetry_gap);
    debug!(
        "fetched {} sun pulses and {} IDPU samples ({} eclipse intervals) for {range}",
        pulses.len(),
        samples.len(),
        eclipses.len()
    );
    SegmentTableBuilder::new(config)?
        .with_eclipses(eclipses)
        .build(&pulses)
}

/// Evaluate `model` at every time in `times`, applying `policy` to samples
/// that fail.
///
/// An empty model is reported as [`SpinModelError::NoData`] whatever the
/// policy.
pub fn spin_phase_series(
    model: &SpinModel,
    times: &[f64],
    policy: FillPolicy,
) -> Result<SpinPhaseSeries> {
    if model.is_empty() {
        return Err(SpinModelError::NoData(
            "cannot sample spin phase from an empty table".into(),
        ));
    }
    let mut series = SpinPhaseSeries::with_capacity(times.len());
    let mut failed = 0usize;
    let mut cursor = model.cursor();
    for &t in times {
        match cursor.query_time(t) {
            Ok(state) => series.push(t, &state),
            Err(e) => match policy {
                FillPolicy::Abort => return Err(e),
                FillPolicy::Skip => failed += 1,
                FillPolicy::Nan => {
                    failed += 1;
                    series.push_fill(t);
                }
            },
        }
    }
    if failed > 0 {
        warn!(
            "{failed} of {} spin phase samples could not be modeled ({policy:?})",
            times.len()
        );
    }
    Ok(series)
}

/// Sample `model` at `times` and store the result in `sink` under `name`.
///
/// Returns the number of samples stored, fill samples included.
pub fn write_spin_phase<K: VariableSink + ?Sized>(
    model: &SpinModel,
    name: &str,
    times: &[f64],
    policy: FillPolicy,
    sink: &mut K,
) -> Result<usize> {
    if name.trim().is_empty() {
        return Err(SpinModelError::InvalidInput(
            "variable name must not be empty".into(),
        ));
    }
    let series = spin_phase_series(model, times, policy)?;
    let stored = series.len();
    sink.store(name, series)?;
    info!("stored {stored} spin phase samples as '{name}'");
    Ok(stored)
}

/// A [`PulseSource`] over telemetry already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPulses {
    pulses: Vec<SunPulse>,
    idpu_samples: Vec<IdpuSpinSample>,
}

impl InMemoryPulses {
    /// Pulses are sorted by time on construction.
    pub fn new(mut pulses: Vec<SunPulse>) -> Self {
        pulses.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            pulses,
            idpu_samples: Vec::new(),
        }
    }

    pub fn with_idpu_samples(mut self, mut samples: Vec<IdpuSpinSample>) -> Self {
        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.idpu_samples = samples;
        self
    }
}

impl PulseSource for InMemoryPulses {
    fn sun_pulses(&self, range: Interval) -> Result<Vec<SunPulse>> {
        Ok(self
            .pulses
            .iter()
            .filter(|p| range.contains(p.time))
            .copied()
            .collect())
    }

    fn idpu_spin_periods(&self, range: Interval) -> Result<Vec<IdpuSpinSample>> {
        Ok(self
            .idpu_samples
            .iter()
            .filter(|s| range.contains(s.time))
            .copied()
            .collect())
    }
}

/// A [`VariableSink`] that keeps variables in a name-ordered map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    variables: BTreeMap<String, SpinPhaseSeries>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SpinPhaseSeries> {
        self.variables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl VariableSink for InMemoryStore {
    fn store(&mut self, name: &str, series: SpinPhaseSeries) -> Result<()> {
        if series.spin_phase.len() != series.times.len() {
            return Err(SpinModelError::Store(format!(
                "series '{name}' has mismatched column lengths"
            )));
        }
        self.variables.insert(name.to_owned(), series);
        Ok(())
    }
}
