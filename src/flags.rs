// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Segment quality / correction flags.
//!
//! | Bit | Constant | Meaning |
//! |-----|----------|---------|
//! | 0 | [`SegmentFlags::ECLIPSE`] | Segment spans a spacecraft eclipse |
//! | 1 | [`SegmentFlags::WAVEFORM_CORRECTION`] | Waveform (IDPU) correction applied |
//! | 2 | [`SegmentFlags::SPINFIT_CORRECTION`] | Spin-fit correction applied |
//! | 3 | [`SegmentFlags::DEGRADED`] | Builder could not fit within tolerance |
//!
//! Bits 0–2 match the layout of serialized spin-model tables; bit 3 is only
//! ever set by [`crate::SegmentTableBuilder`]. Unknown bits read from a
//! serialized table are retained.

use bitflags::bitflags;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Bitmask stored in every [`crate::SpinmodelSegment`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        const ECLIPSE = 1 << 0;
        const WAVEFORM_CORRECTION = 1 << 1;
        const SPINFIT_CORRECTION = 1 << 2;
        const DEGRADED = 1 << 3;

        /// Eclipse with the IDPU correction applied: both bits 0 and 1.
        const ECLIPSE_CORRECTED = Self::ECLIPSE.bits() | Self::WAVEFORM_CORRECTION.bits();
    }
}

impl SegmentFlags {
    #[inline]
    pub const fn is_eclipse(&self) -> bool {
        self.contains(Self::ECLIPSE)
    }

    #[inline]
    pub const fn waveform_corrected(&self) -> bool {
        self.contains(Self::WAVEFORM_CORRECTION)
    }

    #[inline]
    pub const fn spinfit_corrected(&self) -> bool {
        self.contains(Self::SPINFIT_CORRECTION)
    }

    #[inline]
    pub const fn is_degraded(&self) -> bool {
        self.contains(Self::DEGRADED)
    }
}

impl fmt::Display for SegmentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(&name.to_ascii_lowercase())?;
        }
        Ok(())
    }
}

// Serialized as the raw integer so cached tables keep their bit layout.
#[cfg(feature = "serde")]
impl Serialize for SegmentFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SegmentFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_bits_retain(u32::deserialize(deserializer)?))
    }
}
