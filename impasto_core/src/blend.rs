// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blend modes, their coverage classification, and a reference blend formula.
//!
//! Modes up to and including [`BlendMode::Modulate`] are Porter-Duff style
//! "pipeline" blends that fixed-function hardware can express. Everything
//! after it is an *advanced* blend, which needs to read the destination
//! either through framebuffer fetch or a copied backdrop texture.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::color::Color;

/// How a source color is combined with the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlendMode {
    /// Clears the destination.
    Clear,
    /// Replaces the destination with the source.
    Source,
    /// Keeps the destination.
    Destination,
    /// Standard alpha compositing.
    #[default]
    SourceOver,
    /// Source drawn behind the destination.
    DestinationOver,
    /// Source kept where the destination is opaque.
    SourceIn,
    /// Destination kept where the source is opaque.
    DestinationIn,
    /// Source kept where the destination is transparent.
    SourceOut,
    /// Destination kept where the source is transparent.
    DestinationOut,
    /// Source atop the destination.
    SourceATop,
    /// Destination atop the source.
    DestinationATop,
    /// Non-overlapping regions of both.
    Xor,
    /// Saturating sum.
    Plus,
    /// Channel-wise product, including alpha.
    Modulate,
    /// Inverse of the product of inverses.
    Screen,
    /// Multiply or screen depending on the destination.
    Overlay,
    /// Channel-wise minimum.
    Darken,
    /// Channel-wise maximum.
    Lighten,
    /// Brightens the destination toward the source.
    ColorDodge,
    /// Darkens the destination toward the source.
    ColorBurn,
    /// Multiply or screen depending on the source.
    HardLight,
    /// Softened hard light.
    SoftLight,
    /// Absolute difference.
    Difference,
    /// Lower-contrast difference.
    Exclusion,
    /// Channel-wise product of colors.
    Multiply,
    /// Hue of the source with saturation and luminosity of the destination.
    Hue,
    /// Saturation of the source.
    Saturation,
    /// Hue and saturation of the source.
    Color,
    /// Luminosity of the source.
    Luminosity,
}

impl BlendMode {
    /// Every blend mode, in declaration order.
    pub const ALL: [Self; 29] = [
        Self::Clear,
        Self::Source,
        Self::Destination,
        Self::SourceOver,
        Self::DestinationOver,
        Self::SourceIn,
        Self::DestinationIn,
        Self::SourceOut,
        Self::DestinationOut,
        Self::SourceATop,
        Self::DestinationATop,
        Self::Xor,
        Self::Plus,
        Self::Modulate,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
        Self::Multiply,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
    ];

    /// The last mode expressible as a fixed-function blend.
    pub const LAST_PIPELINE_BLEND: Self = Self::Modulate;

    /// Returns whether drawing with this mode can change destination pixels
    /// outside the source's own footprint.
    ///
    /// Layers using these modes must be treated as covering everything
    /// beneath them.
    #[must_use]
    pub const fn should_cover_whole_screen(self) -> bool {
        matches!(
            self,
            Self::Clear
                | Self::Source
                | Self::SourceIn
                | Self::DestinationIn
                | Self::SourceOut
                | Self::DestinationOut
                | Self::DestinationATop
                | Self::Xor
                | Self::Modulate
        )
    }

    /// Returns whether this mode needs to read the destination in a shader.
    #[inline]
    #[must_use]
    pub fn is_advanced(self) -> bool {
        self > Self::LAST_PIPELINE_BLEND
    }
}

/// Blends premultiplied `src` over premultiplied `dst` with `mode`.
///
/// Porter-Duff modes use the conventional formulas. Separable advanced modes
/// follow the W3C compositing definitions. The non-separable modes
/// ([`Hue`](BlendMode::Hue), [`Saturation`](BlendMode::Saturation),
/// [`Color`](BlendMode::Color), [`Luminosity`](BlendMode::Luminosity))
/// return `src` unchanged.
#[must_use]
pub fn blend_color(src: Color, dst: Color, mode: BlendMode) -> Color {
    let sa = src.a;
    let da = dst.a;
    match mode {
        BlendMode::Clear => Color::TRANSPARENT,
        BlendMode::Source => src,
        BlendMode::Destination => dst,
        BlendMode::SourceOver => src + dst * (1.0 - sa),
        BlendMode::DestinationOver => dst + src * (1.0 - da),
        BlendMode::SourceIn => src * da,
        BlendMode::DestinationIn => dst * sa,
        BlendMode::SourceOut => src * (1.0 - da),
        BlendMode::DestinationOut => dst * (1.0 - sa),
        BlendMode::SourceATop => src * da + dst * (1.0 - sa),
        BlendMode::DestinationATop => dst * sa + src * (1.0 - da),
        BlendMode::Xor => src * (1.0 - da) + dst * (1.0 - sa),
        BlendMode::Plus => (src + dst).map(|c| c.min(1.0)),
        BlendMode::Modulate => src * dst,
        BlendMode::Screen => src + dst - src * dst,
        BlendMode::Overlay => separable(src, dst, |cs, cb| hard_light(cb, cs)),
        BlendMode::Darken => separable(src, dst, f32::min),
        BlendMode::Lighten => separable(src, dst, f32::max),
        BlendMode::ColorDodge => separable(src, dst, color_dodge),
        BlendMode::ColorBurn => separable(src, dst, color_burn),
        BlendMode::HardLight => separable(src, dst, hard_light),
        BlendMode::SoftLight => separable(src, dst, soft_light),
        BlendMode::Difference => separable(src, dst, |cs, cb| (cs - cb).abs()),
        BlendMode::Exclusion => separable(src, dst, |cs, cb| cs + cb - 2.0 * cs * cb),
        BlendMode::Multiply => separable(src, dst, |cs, cb| cs * cb),
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => src,
    }
}

/// The blend table as historically written, kept for fixtures recorded
/// against it.
///
/// Differs from [`blend_color`] in two entries: `SourceOut` evaluates to
/// `dst * (1 - dst.a)`, and `Screen` builds its destination term from `src`.
/// Renderers should use [`blend_color`].
#[must_use]
pub fn reference_blend_color(src: Color, dst: Color, mode: BlendMode) -> Color {
    match mode {
        BlendMode::SourceOut => dst * (1.0 - dst.a),
        BlendMode::Screen => src + src - src * dst,
        _ => blend_color(src, dst, mode),
    }
}

/// Applies a separable blend function `b(cs, cb)` on unpremultiplied channels
/// and recombines with source-over alpha.
fn separable(src: Color, dst: Color, b: impl Fn(f32, f32) -> f32) -> Color {
    let sa = src.a;
    let da = dst.a;
    let channel = |s: f32, d: f32| {
        let cs = if sa > 0.0 { s / sa } else { 0.0 };
        let cb = if da > 0.0 { d / da } else { 0.0 };
        s * (1.0 - da) + d * (1.0 - sa) + sa * da * b(cs, cb)
    };
    Color::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        sa + da - sa * da,
    )
}

fn hard_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        let s = 2.0 * cs - 1.0;
        cb + s - cb * s
    }
}

fn color_dodge(cs: f32, cb: f32) -> f32 {
    if cb <= 0.0 {
        0.0
    } else if cs >= 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
}

fn color_burn(cs: f32, cb: f32) -> f32 {
    if cb >= 1.0 {
        1.0
    } else if cs <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
}

fn soft_light(cs: f32, cb: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}
