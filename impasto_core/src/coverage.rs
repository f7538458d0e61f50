// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Save-layer coverage.
//!
//! [`compute_save_layer_coverage`] decides how much of the parent a
//! sub-pass can touch, which in turn sizes its offscreen target. The result
//! is in the parent's space and is not rounded; targets are rounded out to
//! whole pixels when they are allocated.

use kurbo::{Affine, Rect};

use crate::contents::FilterContents;
use crate::geometry::{self, MAXIMUM};

/// Fraction by which a filter-limited coverage may shrink before the layer
/// is clipped to it instead of keeping its full content bounds.
pub const SIZE_TOLERANCE: f64 = 0.3;

/// Flags that change how a save layer's input coverage is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SaveLayerFlags {
    /// The layer's blend mode can change pixels outside its content.
    pub destructive_blend: bool,
    /// The layer samples what is behind it.
    pub has_backdrop_filter: bool,
    /// The content coverage was specified by the caller and must be honored.
    pub bounds_from_caller: bool,
}

/// Computes the parent-space area a save layer can affect.
///
/// - `content_coverage` is in the layer's local space and may be
///   [`MAXIMUM`].
/// - `effect_transform` maps local space into the parent.
/// - `coverage_limit` is the parent-space area that is visible at all.
///
/// Returns `None` when the layer cannot affect anything visible.
#[must_use]
pub fn compute_save_layer_coverage(
    content_coverage: Rect,
    effect_transform: Affine,
    coverage_limit: Rect,
    image_filter: Option<&dyn FilterContents>,
    flags: SaveLayerFlags,
) -> Option<Rect> {
    let input = if flags.bounds_from_caller {
        content_coverage
    } else if flags.has_backdrop_filter || flags.destructive_blend {
        MAXIMUM
    } else {
        content_coverage
    };
    if !geometry::is_maximum(input) && geometry::is_empty(input) {
        return None;
    }

    let Some(filter) = image_filter else {
        if geometry::is_maximum(input) {
            return (!geometry::is_empty(coverage_limit)).then_some(coverage_limit);
        }
        let transformed = geometry::transform_bounds(effect_transform, input);
        return geometry::intersection(transformed, coverage_limit);
    };

    let source_limit = filter.source_coverage(effect_transform, coverage_limit)?;
    let transformed = geometry::transform_bounds(effect_transform, input);
    let clipped = geometry::intersection(transformed, source_limit)?;
    if !geometry::is_maximum(transformed) && within_tolerance(clipped, transformed) {
        return Some(transformed);
    }
    Some(clipped)
}

/// Whether `clipped` kept most of `full` in both dimensions.
fn within_tolerance(clipped: Rect, full: Rect) -> bool {
    let keep = 1.0 - SIZE_TOLERANCE;
    clipped.width() >= full.width() * keep && clipped.height() >= full.height() * keep
}
