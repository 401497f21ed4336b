// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Error taxonomy shared by the segment primitives, the table builder and the
//! query engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpinModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpinModelError {
    /// A segment cannot answer the query (zero rate, negative discriminant,
    /// non-finite input). Fatal to the single query only.
    #[error("domain error: {0}")]
    Domain(String),

    /// The table is empty or has nothing for the requested range.
    #[error("no spin model data: {0}")]
    NoData(String),

    /// The builder could not fit the pulses within tolerance and degraded
    /// segments were disallowed.
    #[error("fit tolerance exceeded at t = {time}: phase error {phase_error} s > {tolerance} s")]
    FitTolerance {
        time: f64,
        phase_error: f64,
        tolerance: f64,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid segment table: {0}")]
    InvalidTable(String),

    #[error("variable store error: {0}")]
    Store(String),
}

impl SpinModelError {
    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        SpinModelError::Domain(msg.into())
    }
}
