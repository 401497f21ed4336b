// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Half-open time ranges.
//!
//! This module provides:
//! - [`Interval<T>`]: a `[start, end)` range over any ordered instant type,
//!   by default seconds since the Unix epoch (`f64`)
//! - [`UtcInterval`]: the same range expressed with `chrono::DateTime<Utc>`
//! - [`complement_within`] for gaps in a sorted interval list

use crate::epoch;
use chrono::{DateTime, Utc};
use qtty::Seconds;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents a range between two instants.
///
/// # Examples
///
/// ```
/// use spinmodel::Interval;
///
/// let a = Interval::new(0.0, 10.0);
/// let b = Interval::new(5.0, 20.0);
/// assert_eq!(a.intersection(&b), Some(Interval::new(5.0, 10.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T = f64> {
    pub start: T,
    pub end: T,
}

/// UTC interval alias.
pub type UtcInterval = Interval<DateTime<Utc>>;

impl<T: PartialOrd + Copy> Interval<T> {
    pub fn new(start: T, end: T) -> Self {
        Interval { start, end }
    }

    /// `true` when `start <= t < end`.
    #[inline]
    pub fn contains(&self, t: T) -> bool {
        self.start <= t && t < self.end
    }

    /// `true` when the range holds no instant (`start >= end`).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns the overlapping sub-range between `self` and `other`.
    ///
    /// Ranges are half-open: if one ends exactly when the other starts, the
    /// intersection is empty and `None` is returned.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = if self.start >= other.start {
            self.start
        } else {
            other.start
        };
        let end = if self.end <= other.end {
            self.end
        } else {
            other.end
        };

        if start < end {
            Some(Self::new(start, end))
        } else {
            None
        }
    }
}

impl Interval<f64> {
    /// Length of the range.
    ///
    /// ```
    /// use qtty::Seconds;
    /// use spinmodel::Interval;
    ///
    /// assert_eq!(Interval::new(10.0, 12.5).duration(), Seconds::new(2.5));
    /// ```
    pub fn duration(&self) -> Seconds {
        Seconds::new(self.end - self.start)
    }

    /// Convert both endpoints to `chrono::DateTime<Utc>`.
    ///
    /// Returns `None` if either endpoint is outside chrono's range.
    pub fn to_utc(&self) -> Option<UtcInterval> {
        Some(Interval::new(
            epoch::to_utc(self.start)?,
            epoch::to_utc(self.end)?,
        ))
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Returns the gaps (complement) of `intervals` within the bounding `outer` range.
///
/// `intervals` must be sorted and non-overlapping. Runs in a single O(n) pass.
pub fn complement_within<T: PartialOrd + Copy>(
    outer: Interval<T>,
    intervals: &[Interval<T>],
) -> Vec<Interval<T>> {
    let mut gaps = Vec::new();
    let mut cursor = outer.start;
    for p in intervals {
        if p.start > cursor {
            gaps.push(Interval::new(cursor, p.start));
        }
        if p.end > cursor {
            cursor = p.end;
        }
    }
    if cursor < outer.end {
        gaps.push(Interval::new(cursor, outer.end));
    }
    gaps
}
