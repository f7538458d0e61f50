// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paintable contents.
//!
//! A [`Contents`] knows its bounds for a given [`Entity`], how it changes the
//! clip stack, whether it is worth drawing against the current clip, and how
//! to record itself into a render pass. The set of contents is open: the
//! pass walker only ever sees `Rc<dyn Contents>`.

mod clip;
mod filter;
mod solid;
mod text;
mod texture;

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Rect};

use crate::entity::Entity;
use crate::error::{RenderError, Result};
use crate::geometry::{self, MAXIMUM};
use crate::glyph_atlas::{LazyGlyphAtlas, TextFrame};
use crate::renderer::{
    Capabilities, DrawCommand, LoadAction, RenderPassId, RenderTarget, Renderer, TextureDescriptor,
    TextureId, TextureSize,
};

pub use clip::{ClipContents, ClipOp, ClipRestoreContents};
pub use filter::{
    BackdropFilterProc, BlurFilter, ColorMatrixFilter, ComposeFilter, FilterContents, FilterInput,
    FilterNode, MatrixFilter, backdrop_filter,
};
pub use solid::SolidColorContents;
pub use text::TextContents;
pub use texture::TextureContents;

/// How an entity changes the clip stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilCoverageKind {
    /// Leaves the clip stack alone.
    #[default]
    NoChange,
    /// Pushes a new clip level.
    Append,
    /// Pops back to the entity's stencil depth.
    Restore,
}

/// The clip-stack effect of an entity together with the resulting coverage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StencilCoverage {
    /// What happens to the clip stack.
    pub kind: StencilCoverageKind,
    /// Coverage of the clip after the change; `None` clips everything.
    pub coverage: Option<Rect>,
}

/// Simple geometry shared by solid fills and clips.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    /// An axis-aligned rectangle in entity space.
    Rect(Rect),
    /// Everything in the render target.
    Cover,
}

impl Geometry {
    /// Coverage of the geometry under `transform`.
    #[must_use]
    pub fn coverage(&self, transform: Affine) -> Option<Rect> {
        match self {
            Self::Rect(r) if geometry::is_empty(*r) => None,
            Self::Rect(r) => Some(geometry::transform_bounds(transform, *r)),
            Self::Cover => Some(MAXIMUM),
        }
    }

    /// Returns the `(transform, bounds)` pair to draw this geometry into `pass`.
    #[must_use]
    pub fn draw_bounds(&self, transform: Affine, pass: &ActivePass) -> (Affine, Rect) {
        match self {
            Self::Rect(r) => (transform, *r),
            Self::Cover => (Affine::IDENTITY, pass.target.rect()),
        }
    }
}

/// An open render pass on a particular target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivePass {
    /// Renderer handle.
    pub id: RenderPassId,
    /// What the pass draws into.
    pub target: RenderTarget,
}

/// A texture holding rendered pixels for a pixel-aligned target-space
/// rectangle. Texel `(0, 0)` corresponds to `rect.origin()`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    /// Rendered pixels.
    pub texture: TextureId,
    /// Target-space area covered by the texture.
    pub rect: Rect,
}

impl Snapshot {
    /// Texel rectangle covering the whole snapshot.
    #[must_use]
    pub fn texel_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.rect.width(), self.rect.height())
    }
}

/// Everything contents need while rendering.
pub struct ContentContext<'a> {
    /// The renderer to record into.
    pub renderer: &'a mut dyn Renderer,
    /// The glyph atlas shared by the pass tree.
    pub glyph_atlas: &'a LazyGlyphAtlas,
    /// Renderer feature set, cached for the frame.
    pub capabilities: Capabilities,
    transient: Vec<TextureId>,
}

impl fmt::Debug for ContentContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentContext")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<'a> ContentContext<'a> {
    /// Creates a context for one frame.
    #[must_use]
    pub fn new(renderer: &'a mut dyn Renderer, glyph_atlas: &'a LazyGlyphAtlas) -> Self {
        let capabilities = renderer.capabilities();
        Self {
            renderer,
            glyph_atlas,
            capabilities,
            transient: Vec::new(),
        }
    }

    /// Records a draw into `pass`.
    pub fn record(&mut self, pass: &ActivePass, command: DrawCommand) -> Result<()> {
        self.renderer.record(pass.id, command)
    }

    /// Allocates an offscreen target of `size`.
    ///
    /// The texture lives until [`release_transients`](Self::release_transients).
    pub fn create_target(
        &mut self,
        label: &'static str,
        size: TextureSize,
    ) -> Result<RenderTarget> {
        if size.width > self.capabilities.max_texture_size
            || size.height > self.capabilities.max_texture_size
        {
            return Err(RenderError::TextureAllocation {
                label,
                width: size.width,
                height: size.height,
            });
        }
        let texture = self
            .renderer
            .create_texture(&TextureDescriptor { label, size })?;
        self.transient.push(texture);
        Ok(RenderTarget::offscreen(texture, size))
    }

    /// Releases every texture allocated through this context.
    pub fn release_transients(&mut self) {
        for texture in self.transient.drain(..) {
            self.renderer.release_texture(texture);
        }
    }

    /// Renders into a fresh texture covering `rect` (rounded out) in its own
    /// command buffer.
    ///
    /// `draw` receives the open pass and the transform from target space into
    /// the texture.
    pub fn render_to_texture(
        &mut self,
        label: &'static str,
        rect: Rect,
        draw: impl FnOnce(&mut Self, &ActivePass, Affine) -> Result<()>,
    ) -> Result<Option<Snapshot>> {
        let rect = geometry::round_out(rect);
        let Some(size) = TextureSize::from_rect(rect) else {
            return Ok(None);
        };
        let target = self.create_target(label, size)?;
        let buffer = self.renderer.create_command_buffer()?;
        let id = self
            .renderer
            .begin_render_pass(buffer, &target, LoadAction::Clear)?;
        let pass = ActivePass { id, target };
        draw(self, &pass, Affine::translate(-rect.origin().to_vec2()))?;
        self.renderer.end_render_pass(id)?;
        self.renderer.submit(buffer)?;
        Ok(Some(Snapshot {
            texture: target.texture,
            rect,
        }))
    }
}

/// Something that can be painted by an [`Entity`].
pub trait Contents: fmt::Debug {
    /// Bounds in the space the entity's transformation maps into, or `None`
    /// if nothing would be drawn.
    fn coverage(&self, entity: &Entity) -> Option<Rect>;

    /// Effect on the clip stack given the `current` clip coverage.
    fn stencil_coverage(&self, entity: &Entity, current: Option<Rect>) -> StencilCoverage {
        _ = entity;
        StencilCoverage {
            kind: StencilCoverageKind::NoChange,
            coverage: current,
        }
    }

    /// Returns whether drawing could change any pixel inside `stencil_coverage`.
    fn should_render(&self, entity: &Entity, stencil_coverage: Option<Rect>) -> bool {
        let Some(stencil) = stencil_coverage else {
            return false;
        };
        let Some(coverage) = self.coverage(entity) else {
            return false;
        };
        geometry::is_maximum(coverage) || geometry::intersects(stencil, coverage)
    }

    /// Records the draw commands for this contents into `pass`.
    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()>;

    /// Renders into a standalone snapshot clipped to `limit`.
    ///
    /// Returns `Ok(None)` if nothing would be drawn inside `limit`.
    fn render_to_snapshot(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        limit: Rect,
    ) -> Result<Option<Snapshot>> {
        let Some(coverage) = self
            .coverage(entity)
            .and_then(|c| geometry::intersection(c, limit))
        else {
            return Ok(None);
        };
        ctx.render_to_texture("snapshot", coverage, |ctx, pass, to_texture| {
            let shifted = entity.snapshot_entity(to_texture);
            self.render(ctx, &shifted, pass)
        })
    }

    /// The text frame drawn by these contents, for glyph atlas registration.
    fn text_frame(&self) -> Option<&TextFrame> {
        None
    }

    /// Returns a copy that restores only `coverage`, for clip-restore
    /// contents. Other contents return `None`.
    fn with_restore_coverage(&self, coverage: Option<Rect>) -> Option<Rc<dyn Contents>> {
        _ = coverage;
        None
    }
}
