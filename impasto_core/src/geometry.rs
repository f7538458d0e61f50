// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coverage rectangle helpers.
//!
//! Coverage is expressed as `Option<Rect>`: `None` means "nothing", while
//! [`MAXIMUM`] is the unbounded sentinel. The helpers here keep the sentinel
//! absorbing under union and neutral under intersection, and never produce
//! NaN coordinates by transforming it.

use kurbo::{Affine, Rect};

/// The unbounded coverage sentinel.
pub const MAXIMUM: Rect = Rect::new(
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::INFINITY,
);

/// Returns whether `rect` is the unbounded sentinel (or has any infinite edge).
#[inline]
#[must_use]
pub fn is_maximum(rect: Rect) -> bool {
    !(rect.x0.is_finite() && rect.y0.is_finite() && rect.x1.is_finite() && rect.y1.is_finite())
}

/// Returns whether `rect` has zero or negative area.
#[inline]
#[must_use]
pub fn is_empty(rect: Rect) -> bool {
    !(rect.x1 > rect.x0 && rect.y1 > rect.y0)
}

/// Maps `rect` through `transform` and returns the axis-aligned bounds.
///
/// The unbounded sentinel maps to itself.
#[must_use]
pub fn transform_bounds(transform: Affine, rect: Rect) -> Rect {
    if is_maximum(rect) {
        return MAXIMUM;
    }
    transform.transform_rect_bbox(rect)
}

/// Intersects two rectangles, returning `None` when the result is empty.
#[must_use]
pub fn intersection(a: Rect, b: Rect) -> Option<Rect> {
    let r = Rect::new(a.x0.max(b.x0), a.y0.max(b.y0), a.x1.min(b.x1), a.y1.min(b.y1));
    if is_empty(r) { None } else { Some(r) }
}

/// Returns whether two rectangles overlap with non-zero area.
#[inline]
#[must_use]
pub fn intersects(a: Rect, b: Rect) -> bool {
    intersection(a, b).is_some()
}

/// Unions two optional coverages; `None` is the identity element.
#[must_use]
pub fn union(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => {
            if is_maximum(a) || is_maximum(b) {
                Some(MAXIMUM)
            } else {
                Some(a.union(b))
            }
        }
        (a, None) => a,
        (None, b) => b,
    }
}

/// Expands `rect` outward to integer pixel boundaries.
#[inline]
#[must_use]
pub fn round_out(rect: Rect) -> Rect {
    rect.abs().expand()
}
