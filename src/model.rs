// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Segment table and query engine.
//!
//! [`SpinModel`] owns an ordered, validated, immutable list of
//! [`SpinmodelSegment`]s and dispatches point queries to the right segment
//! primitive:
//!
//! | Query position | Primitive |
//! |----------------|-----------|
//! | before the first `t1` | [`SpinmodelSegment::extrap_before_t`] on the first segment |
//! | inside `[t1, t2]` | [`SpinmodelSegment::interp_t`] |
//! | in a gap between two segments | [`SpinmodelSegment::extrap_after_t`] on the preceding one |
//! | after the last `t2` | [`SpinmodelSegment::extrap_after_t`] on the last segment |
//!
//! Segment lookup is a binary search over `t1`. Batch queries go through a
//! [`SegmentCursor`], which remembers the last segment used so that sorted
//! input walks the table forward instead of searching it per sample.
//!
//! Tables are shared read-only: wrap a model in an `Arc`, or in a
//! [`SpinModelHandle`] when it may be rebuilt while readers hold snapshots.

use crate::epoch;
use crate::error::{Result, SpinModelError};
use crate::interval::{complement_within, Interval};
use crate::segment::{CountState, SpinState, SpinmodelSegment, DEGREES_PER_SPIN};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Forward steps a cursor takes before falling back to binary search.
const CURSOR_LINEAR_STEPS: usize = 8;

/// Where a query time falls relative to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentLocation {
    /// Before the first segment's `t1`.
    Before,
    /// Inside segment `i` (`t1 <= t <= t2`).
    Inside(usize),
    /// Between segment `i`'s `t2` and segment `i + 1`'s `t1`.
    Gap(usize),
    /// After the last segment's `t2`.
    After,
}

/// An immutable spin-model table.
///
/// # Examples
///
/// ```
/// use spinmodel::{SpinModel, SpinmodelSegment};
///
/// let model = SpinModel::from_segments(vec![
///     SpinmodelSegment::new(0.0, 100.0, 0, 5, 18.0, 0.0).unwrap(),
/// ])
/// .unwrap();
/// let state = model.query_time(30.0).unwrap();
/// assert_eq!(state.spin_count, 1);
/// assert!((state.spin_phase.value() - 180.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpinModel {
    segments: Vec<SpinmodelSegment>,
}

impl SpinModel {
    /// A table without segments; every query reports [`SpinModelError::NoData`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate and publish a table.
    ///
    /// Segments must be ordered by `t1`, must not overlap in time and must
    /// have non-decreasing spin counts. The phase law of each segment may not
    /// carry it past the next segment's `c1` by its own `t2`, and across a
    /// time gap the spin count extrapolated from the earlier segment may not
    /// overtake that `c1` either, so counts stay monotonic everywhere.
    pub fn from_segments(segments: Vec<SpinmodelSegment>) -> Result<Self> {
        for (i, w) in segments.windows(2).enumerate() {
            let (prev, next) = (&w[0], &w[1]);
            if next.t1() < prev.t2() {
                return Err(SpinModelError::InvalidTable(format!(
                    "segment {} starts at {} before segment {} ends at {}",
                    i + 1,
                    next.t1(),
                    i,
                    prev.t2()
                )));
            }
            if next.c1() < prev.c2() {
                return Err(SpinModelError::InvalidTable(format!(
                    "spin count decreases between segments {} and {} ({} -> {})",
                    i,
                    i + 1,
                    prev.c2(),
                    next.c1()
                )));
            }
            let reached = prev.c1() as f64 + (prev.total_phase() / DEGREES_PER_SPIN).floor();
            if reached > next.c1() as f64 {
                return Err(SpinModelError::InvalidTable(format!(
                    "segment {i} reaches spin {reached} by {}, past the next segment's first spin {}",
                    prev.t2(),
                    next.c1()
                )));
            }
            if next.t1() > prev.t2() {
                let reached = prev
                    .extrap_after_t(next.t1())
                    .map_err(|e| {
                        SpinModelError::InvalidTable(format!(
                            "cannot extrapolate segment {i} across gap: {e}"
                        ))
                    })?
                    .spin_count;
                if reached > next.c1() {
                    return Err(SpinModelError::InvalidTable(format!(
                        "segment {i} extrapolates to spin {reached} at {}, past the next segment's first spin {}",
                        next.t1(),
                        next.c1()
                    )));
                }
            }
        }
        Ok(Self { segments })
    }

    #[inline]
    pub fn segments(&self) -> &[SpinmodelSegment] {
        &self.segments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First `t1` to last `t2`, or `None` for an empty table.
    pub fn coverage(&self) -> Option<Interval> {
        let first = self.segments.first()?;
        let last = self.segments.last()?;
        Some(Interval::new(first.t1(), last.t2()))
    }

    /// Time ranges inside the coverage not spanned by any segment.
    pub fn gaps(&self) -> Vec<Interval> {
        match self.coverage() {
            Some(outer) => {
                let spans: Vec<Interval> =
                    self.segments.iter().map(SpinmodelSegment::interval).collect();
                complement_within(outer, &spans)
            }
            None => Vec::new(),
        }
    }

    /// Segments whose `[t1, t2)` intersects `range`.
    pub fn segments_overlapping(&self, range: Interval) -> &[SpinmodelSegment] {
        let start = self.segments.partition_point(|s| s.t2() <= range.start);
        let end = self.segments.partition_point(|s| s.t1() < range.end);
        &self.segments[start..end.max(start)]
    }

    /// Segments flagged as spanning an eclipse.
    pub fn eclipse_segments(&self) -> impl Iterator<Item = &SpinmodelSegment> + '_ {
        self.segments.iter().filter(|s| s.segflags().is_eclipse())
    }

    /// Classify `t` against the table by binary search.
    pub fn locate_time(&self, t: f64) -> Result<SegmentLocation> {
        if let Some(edge) = locate_edges(&self.segments, t)? {
            return Ok(edge);
        }
        let idx = self.segments.partition_point(|s| s.t1() <= t) - 1;
        Ok(classify(&self.segments, idx, t))
    }

    /// Spin state at time `t` (Unix seconds).
    pub fn query_time(&self, t: f64) -> Result<SpinState> {
        let location = self.locate_time(t)?;
        dispatch_time(&self.segments, location, t)
    }

    /// Spin state at a UTC timestamp.
    pub fn query_utc(&self, datetime: DateTime<Utc>) -> Result<SpinState> {
        self.query_time(epoch::unix_seconds(datetime))
    }

    /// Pulse time and spin period for spin count `n`.
    pub fn query_count(&self, n: i64) -> Result<CountState> {
        let (first, last) = match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(no_data()),
        };
        if n < first.c1() {
            return first.interp_before_n(n);
        }
        if n > last.c2() {
            return last.interp_after_n(n);
        }
        let idx = self.segments.partition_point(|s| s.c2() < n);
        let seg = &self.segments[idx];
        if n >= seg.c1() {
            seg.interp_n(n)
        } else {
            // Counts skipped by a gap belong to the preceding segment's extrapolation.
            self.segments[idx - 1].interp_after_n(n)
        }
    }

    /// A cursor for repeated time queries.
    pub fn cursor(&self) -> SegmentCursor<'_> {
        SegmentCursor {
            segments: &self.segments,
            hint: 0,
        }
    }

    /// Spin state for every time in `times`, in input order.
    ///
    /// Fails on the first sample that cannot be answered; see
    /// [`crate::spin_phase_series`] for per-sample fill policies.
    pub fn query_times(&self, times: &[f64]) -> Result<Vec<SpinState>> {
        let mut cursor = self.cursor();
        times.iter().map(|&t| cursor.query_time(t)).collect()
    }
}

/// Stateful lookup over a [`SpinModel`] that reuses the last segment found.
///
/// Any input order is accepted; sorted input costs O(1) amortised per query.
#[derive(Debug, Clone)]
pub struct SegmentCursor<'a> {
    segments: &'a [SpinmodelSegment],
    hint: usize,
}

impl SegmentCursor<'_> {
    pub fn locate(&mut self, t: f64) -> Result<SegmentLocation> {
        if let Some(edge) = locate_edges(self.segments, t)? {
            return Ok(edge);
        }
        let segs = self.segments;
        let h = self.hint.min(segs.len() - 1);
        let idx = if segs[h].t1() <= t {
            let mut i = h;
            let mut steps = 0;
            loop {
                if i + 1 >= segs.len() || segs[i + 1].t1() > t {
                    break i;
                }
                steps += 1;
                if steps > CURSOR_LINEAR_STEPS {
                    break i + segs[i..].partition_point(|s| s.t1() <= t) - 1;
                }
                i += 1;
            }
        } else {
            segs[..h].partition_point(|s| s.t1() <= t) - 1
        };
        self.hint = idx;
        Ok(classify(segs, idx, t))
    }

    pub fn query_time(&mut self, t: f64) -> Result<SpinState> {
        let location = self.locate(t)?;
        dispatch_time(self.segments, location, t)
    }
}

/// Shared, swappable reference to the current table.
///
/// Readers take an `Arc` snapshot with [`load`](Self::load); a rebuild for an
/// overlapping range publishes a new table with [`replace`](Self::replace).
/// Published tables are never mutated.
#[derive(Debug, Default)]
pub struct SpinModelHandle {
    current: RwLock<Arc<SpinModel>>,
}

impl SpinModelHandle {
    pub fn new(model: SpinModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    pub fn load(&self) -> Arc<SpinModel> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish `model`, returning the table it replaces.
    pub fn replace(&self, model: SpinModel) -> Arc<SpinModel> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(model))
    }
}

fn no_data() -> SpinModelError {
    SpinModelError::NoData("spin model table has no segments".into())
}

/// Handles the empty table, non-finite input and the two open ends.
fn locate_edges(segments: &[SpinmodelSegment], t: f64) -> Result<Option<SegmentLocation>> {
    let (first, last) = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(no_data()),
    };
    if !t.is_finite() {
        return Err(SpinModelError::domain(format!(
            "query time is not finite: {t}"
        )));
    }
    if t < first.t1() {
        Ok(Some(SegmentLocation::Before))
    } else if t > last.t2() {
        Ok(Some(SegmentLocation::After))
    } else {
        Ok(None)
    }
}

/// `idx` is the last segment with `t1 <= t`.
#[inline]
fn classify(segments: &[SpinmodelSegment], idx: usize, t: f64) -> SegmentLocation {
    if t <= segments[idx].t2() {
        SegmentLocation::Inside(idx)
    } else {
        SegmentLocation::Gap(idx)
    }
}

fn dispatch_time(
    segments: &[SpinmodelSegment],
    location: SegmentLocation,
    t: f64,
) -> Result<SpinState> {
    match location {
        SegmentLocation::Before => segments.first().ok_or_else(no_data)?.extrap_before_t(t),
        SegmentLocation::Inside(i) => segments[i].interp_t(t),
        SegmentLocation::Gap(i) => segments[i].extrap_after_t(t),
        SegmentLocation::After => segments.last().ok_or_else(no_data)?.extrap_after_t(t),
    }
}

// Serialized as the bare segment list; deserialization re-validates it.
#[cfg(feature = "serde")]
impl Serialize for SpinModel {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.segments.serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SpinModel {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let segments = Vec::<SpinmodelSegment>::deserialize(deserializer)?;
        SpinModel::from_segments(segments).map_err(D::Error::custom)
    }
}
