// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pass identity.

use core::fmt;

/// Sentinel value for "no pass" in index fields.
pub(crate) const INVALID: u32 = u32::MAX;

/// A handle to a pass in a [`PassStore`](super::PassStore).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a pass is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl PassId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Rebuilds a handle from its parts, for decoding recorded traces.
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }
}

impl fmt::Debug for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PassId({}@gen{})", self.idx, self.generation)
    }
}
