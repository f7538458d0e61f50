// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Image filters and the filter node that applies them.
//!
//! A [`FilterContents`] answers two coverage questions and can render itself:
//!
//! - [`source_coverage`](FilterContents::source_coverage) maps an output
//!   limit back to the input area that can influence it. Save-layer sizing
//!   relies on this inverse query.
//! - [`filter_coverage`](FilterContents::filter_coverage) maps input coverage
//!   forward to the output area.
//!
//! Both take an *effect transform*: the transform from the filtered layer's
//! local space into the space the filter output is drawn in. Filter
//! parameters (blur sigma, matrix) are defined in local space.
//!
//! [`FilterNode`] is the [`Contents`] that snapshots a [`FilterInput`], runs
//! the filter, and composites the result.

use alloc::rc::Rc;
use core::fmt;

use kurbo::{Affine, Rect, Vec2};

use super::{ActivePass, ContentContext, Contents, Snapshot, TextureContents};
use crate::blend::BlendMode;
use crate::entity::Entity;
use crate::error::Result;
use crate::geometry::{self, MAXIMUM};
use crate::renderer::{DrawCommand, Pipeline, StencilOp, TextureId};

/// An image filter.
pub trait FilterContents: fmt::Debug {
    /// Input area, in output space, that can affect output inside
    /// `output_limit`. `None` if no input can produce visible output.
    fn source_coverage(&self, effect_transform: Affine, output_limit: Rect) -> Option<Rect>;

    /// Output area produced from input covering `input`.
    fn filter_coverage(&self, input: Rect, effect_transform: Affine) -> Option<Rect>;

    /// Renders the filtered result of `input` into a new snapshot.
    fn apply(
        &self,
        ctx: &mut ContentContext<'_>,
        input: &Snapshot,
        effect_transform: Affine,
    ) -> Result<Option<Snapshot>>;
}

/// Renders one pipeline draw into a fresh snapshot covering `output`.
fn draw_stage(
    ctx: &mut ContentContext<'_>,
    label: &'static str,
    output: Rect,
    pipeline: Pipeline,
    transform: Affine,
    bounds: Rect,
) -> Result<Option<Snapshot>> {
    ctx.render_to_texture(label, output, |ctx, pass, to_texture| {
        ctx.record(
            pass,
            DrawCommand {
                label,
                pipeline,
                transform: to_texture * transform,
                bounds,
                blend_mode: BlendMode::Source,
                stencil_reference: 0,
                stencil: StencilOp::Keep,
            },
        )
    })
}

/// Applies an affine matrix in the layer's local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixFilter {
    /// Local-space matrix.
    pub matrix: Affine,
}

impl MatrixFilter {
    /// Creates a matrix filter.
    #[must_use]
    pub const fn new(matrix: Affine) -> Self {
        Self { matrix }
    }

    /// The matrix expressed in output space: `E * M * E^-1`.
    fn effective(&self, effect_transform: Affine) -> Option<Affine> {
        if !is_invertible(effect_transform) {
            return None;
        }
        Some(effect_transform * self.matrix * effect_transform.inverse())
    }
}

fn is_invertible(transform: Affine) -> bool {
    let det = transform.determinant();
    det != 0.0 && det.is_finite()
}

impl FilterContents for MatrixFilter {
    fn source_coverage(&self, effect_transform: Affine, output_limit: Rect) -> Option<Rect> {
        let m = self.effective(effect_transform)?;
        if !is_invertible(m) {
            return None;
        }
        Some(geometry::transform_bounds(m.inverse(), output_limit))
    }

    fn filter_coverage(&self, input: Rect, effect_transform: Affine) -> Option<Rect> {
        let m = self.effective(effect_transform)?;
        let out = geometry::transform_bounds(m, input);
        (!geometry::is_empty(out)).then_some(out)
    }

    fn apply(
        &self,
        ctx: &mut ContentContext<'_>,
        input: &Snapshot,
        effect_transform: Affine,
    ) -> Result<Option<Snapshot>> {
        let (Some(m), Some(output)) = (
            self.effective(effect_transform),
            self.filter_coverage(input.rect, effect_transform),
        ) else {
            return Ok(None);
        };
        draw_stage(
            ctx,
            "Matrix Filter",
            output,
            Pipeline::Texture {
                texture: input.texture,
                source_rect: input.texel_rect(),
                opacity: 1.0,
            },
            m,
            input.rect,
        )
    }
}

/// Kernel radius per unit of sigma (`sqrt(3)`).
const KERNEL_RADIUS_PER_SIGMA: f64 = 1.732_050_807_57;

/// Blur radius for a Gaussian `sigma`; sigmas at or below one half blur
/// nothing.
#[must_use]
pub fn blur_radius(sigma: f64) -> f64 {
    if sigma > 0.5 {
        (sigma - 0.5) * KERNEL_RADIUS_PER_SIGMA
    } else {
        0.0
    }
}

/// Maps a local-space vector through the linear part of `transform`.
fn basis(transform: Affine, v: Vec2) -> Vec2 {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    Vec2::new((a * v.x + c * v.y).abs(), (b * v.x + d * v.y).abs())
}

/// Gaussian blur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurFilter {
    /// Horizontal standard deviation in local units.
    pub sigma_x: f64,
    /// Vertical standard deviation in local units.
    pub sigma_y: f64,
}

impl BlurFilter {
    /// A blur with the same sigma on both axes.
    #[must_use]
    pub const fn new(sigma: f64) -> Self {
        Self {
            sigma_x: sigma,
            sigma_y: sigma,
        }
    }

    fn padding(&self, effect_transform: Affine) -> Vec2 {
        basis(
            effect_transform,
            Vec2::new(blur_radius(self.sigma_x), blur_radius(self.sigma_y)),
        )
    }

    fn expand(&self, rect: Rect, effect_transform: Affine) -> Rect {
        if geometry::is_maximum(rect) {
            return MAXIMUM;
        }
        let pad = self.padding(effect_transform);
        rect.inflate(pad.x, pad.y)
    }
}

impl FilterContents for BlurFilter {
    fn source_coverage(&self, effect_transform: Affine, output_limit: Rect) -> Option<Rect> {
        Some(self.expand(output_limit, effect_transform))
    }

    fn filter_coverage(&self, input: Rect, effect_transform: Affine) -> Option<Rect> {
        Some(self.expand(input, effect_transform))
    }

    fn apply(
        &self,
        ctx: &mut ContentContext<'_>,
        input: &Snapshot,
        effect_transform: Affine,
    ) -> Result<Option<Snapshot>> {
        let output = geometry::round_out(self.expand(input.rect, effect_transform));
        let sigma = basis(effect_transform, Vec2::new(self.sigma_x, self.sigma_y));
        #[expect(
            clippy::cast_possible_truncation,
            reason = "sigma in texels is far below f32 precision limits"
        )]
        let (sigma_x, sigma_y) = (sigma.x as f32, sigma.y as f32);
        draw_stage(
            ctx,
            "Gaussian Blur Filter",
            output,
            Pipeline::Blur {
                texture: input.texture,
                source_rect: output - input.rect.origin().to_vec2(),
                sigma_x,
                sigma_y,
            },
            Affine::IDENTITY,
            output,
        )
    }
}

/// Applies a 4x5 color matrix to unpremultiplied color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMatrixFilter {
    /// Row-major matrix; the fifth column is an additive offset.
    pub matrix: [f32; 20],
}

impl ColorMatrixFilter {
    /// The identity color matrix.
    pub const IDENTITY: [f32; 20] = [
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0, //
    ];

    /// Creates a color matrix filter.
    #[must_use]
    pub const fn new(matrix: [f32; 20]) -> Self {
        Self { matrix }
    }

    /// Converts color to luminance-weighted grayscale.
    #[must_use]
    pub const fn grayscale() -> Self {
        const R: f32 = 0.2126;
        const G: f32 = 0.7152;
        const B: f32 = 0.0722;
        Self::new([
            R, G, B, 0.0, 0.0, //
            R, G, B, 0.0, 0.0, //
            R, G, B, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 0.0, //
        ])
    }
}

impl FilterContents for ColorMatrixFilter {
    fn source_coverage(&self, _effect_transform: Affine, output_limit: Rect) -> Option<Rect> {
        Some(output_limit)
    }

    fn filter_coverage(&self, input: Rect, _effect_transform: Affine) -> Option<Rect> {
        Some(input)
    }

    fn apply(
        &self,
        ctx: &mut ContentContext<'_>,
        input: &Snapshot,
        _effect_transform: Affine,
    ) -> Result<Option<Snapshot>> {
        draw_stage(
            ctx,
            "Color Matrix Filter",
            input.rect,
            Pipeline::ColorMatrix {
                texture: input.texture,
                source_rect: input.texel_rect(),
                matrix: self.matrix,
            },
            Affine::IDENTITY,
            input.rect,
        )
    }
}

/// Applies `inner`, then `outer`.
#[derive(Clone, Debug)]
pub struct ComposeFilter {
    /// Applied second.
    pub outer: Rc<dyn FilterContents>,
    /// Applied first.
    pub inner: Rc<dyn FilterContents>,
}

impl ComposeFilter {
    /// Composes two filters.
    #[must_use]
    pub fn new(outer: Rc<dyn FilterContents>, inner: Rc<dyn FilterContents>) -> Self {
        Self { outer, inner }
    }
}

impl FilterContents for ComposeFilter {
    fn source_coverage(&self, effect_transform: Affine, output_limit: Rect) -> Option<Rect> {
        let mid = self.outer.source_coverage(effect_transform, output_limit)?;
        self.inner.source_coverage(effect_transform, mid)
    }

    fn filter_coverage(&self, input: Rect, effect_transform: Affine) -> Option<Rect> {
        let mid = self.inner.filter_coverage(input, effect_transform)?;
        self.outer.filter_coverage(mid, effect_transform)
    }

    fn apply(
        &self,
        ctx: &mut ContentContext<'_>,
        input: &Snapshot,
        effect_transform: Affine,
    ) -> Result<Option<Snapshot>> {
        let Some(mid) = self.inner.apply(ctx, input, effect_transform)? else {
            return Ok(None);
        };
        self.outer.apply(ctx, &mid, effect_transform)
    }
}

/// What a filter node filters.
#[derive(Clone, Debug)]
pub enum FilterInput {
    /// Other contents, drawn with the node's entity.
    Contents(Rc<dyn Contents>),
    /// A region of an existing texture.
    Texture {
        /// The texture.
        texture: TextureId,
        /// Sampled region in texels.
        source_rect: Rect,
        /// Where the region lands, in entity space.
        destination: Rect,
    },
}

impl FilterInput {
    fn texture_contents(
        texture: TextureId,
        source_rect: Rect,
        destination: Rect,
    ) -> TextureContents {
        TextureContents::new(texture, source_rect, destination)
    }

    /// Coverage of the unfiltered input for `entity`.
    #[must_use]
    pub fn coverage(&self, entity: &Entity) -> Option<Rect> {
        match self {
            Self::Contents(contents) => contents.coverage(entity),
            Self::Texture {
                texture,
                source_rect,
                destination,
            } => Self::texture_contents(*texture, *source_rect, *destination).coverage(entity),
        }
    }

    /// Renders the unfiltered input clipped to `limit`.
    pub fn snapshot(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        limit: Rect,
    ) -> Result<Option<Snapshot>> {
        match self {
            Self::Contents(contents) => contents.render_to_snapshot(ctx, entity, limit),
            Self::Texture {
                texture,
                source_rect,
                destination,
            } => Self::texture_contents(*texture, *source_rect, *destination)
                .render_to_snapshot(ctx, entity, limit),
        }
    }
}

/// Contents that draw a filtered input.
#[derive(Clone, Debug)]
pub struct FilterNode {
    /// The filter to run.
    pub filter: Rc<dyn FilterContents>,
    /// What to filter.
    pub input: FilterInput,
    /// Layer-local to output space, see the module docs.
    pub effect_transform: Affine,
}

impl FilterNode {
    /// Creates a filter node.
    #[must_use]
    pub fn new(
        filter: Rc<dyn FilterContents>,
        input: FilterInput,
        effect_transform: Affine,
    ) -> Self {
        Self {
            filter,
            input,
            effect_transform,
        }
    }
}

impl Contents for FilterNode {
    fn coverage(&self, entity: &Entity) -> Option<Rect> {
        let input = self.input.coverage(entity)?;
        self.filter.filter_coverage(input, self.effect_transform)
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        let Some(limit) = self
            .filter
            .source_coverage(self.effect_transform, pass.target.rect())
        else {
            return Ok(());
        };
        let Some(input) = self.input.snapshot(ctx, entity, limit)? else {
            return Ok(());
        };
        let Some(output) = self.filter.apply(ctx, &input, self.effect_transform)? else {
            return Ok(());
        };
        ctx.record(
            pass,
            DrawCommand {
                label: "Filter Output",
                pipeline: Pipeline::Texture {
                    texture: output.texture,
                    source_rect: output.texel_rect(),
                    opacity: 1.0,
                },
                transform: Affine::IDENTITY,
                bounds: output.rect,
                blend_mode: entity.blend_mode,
                stencil_reference: entity.stencil_depth,
                stencil: StencilOp::Keep,
            },
        )
    }
}

/// Builds contents for "whatever is behind this layer", given that backdrop
/// as a [`FilterInput`] and the effect transform.
pub type BackdropFilterProc = Rc<dyn Fn(FilterInput, Affine) -> Rc<dyn Contents>>;

/// Wraps `filter` as a backdrop filter.
#[must_use]
pub fn backdrop_filter(filter: Rc<dyn FilterContents>) -> BackdropFilterProc {
    Rc::new(move |input, effect_transform| {
        Rc::new(FilterNode::new(Rc::clone(&filter), input, effect_transform)) as Rc<dyn Contents>
    })
}
