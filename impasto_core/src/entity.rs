// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The unit of painting: contents plus transform, clip depth, and blend mode.

use alloc::rc::Rc;

use kurbo::{Affine, Rect};

use crate::blend::BlendMode;
use crate::contents::{ActivePass, ContentContext, Contents, StencilCoverage};
use crate::error::Result;

/// One paintable item in an [`EntityPass`](crate::pass).
///
/// Entities are cheap to clone; contents are shared.
#[derive(Clone, Debug, Default)]
pub struct Entity {
    /// Maps entity space into the owning pass's space.
    pub transformation: Affine,
    /// What to paint. An entity without contents paints nothing.
    pub contents: Option<Rc<dyn Contents>>,
    /// Clip nesting level the entity is drawn at.
    pub stencil_depth: u32,
    /// How the entity composites with what is beneath it.
    pub blend_mode: BlendMode,
}

impl Entity {
    /// Creates an entity with identity transform, depth 0, and
    /// [`BlendMode::SourceOver`].
    #[must_use]
    pub fn new(contents: Rc<dyn Contents>) -> Self {
        Self {
            contents: Some(contents),
            ..Self::default()
        }
    }

    /// Sets the transformation.
    #[must_use]
    pub fn with_transformation(mut self, transformation: Affine) -> Self {
        self.transformation = transformation;
        self
    }

    /// Sets the stencil depth.
    #[must_use]
    pub fn with_stencil_depth(mut self, depth: u32) -> Self {
        self.stencil_depth = depth;
        self
    }

    /// Sets the blend mode.
    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Coverage of the contents, or `None` without contents.
    #[must_use]
    pub fn coverage(&self) -> Option<Rect> {
        self.contents.as_ref()?.coverage(self)
    }

    /// Clip-stack effect. Without contents this is a no-op with no coverage.
    #[must_use]
    pub fn stencil_coverage(&self, current: Option<Rect>) -> StencilCoverage {
        match &self.contents {
            Some(contents) => contents.stencil_coverage(self, current),
            None => StencilCoverage::default(),
        }
    }

    /// Returns whether the entity could affect pixels inside `stencil_coverage`.
    #[must_use]
    pub fn should_render(&self, stencil_coverage: Option<Rect>) -> bool {
        match &self.contents {
            Some(contents) => contents.should_render(self, stencil_coverage),
            None => false,
        }
    }

    /// Records the entity into `pass`. Entities without contents succeed
    /// without drawing.
    pub fn render(&self, ctx: &mut ContentContext<'_>, pass: &ActivePass) -> Result<()> {
        match &self.contents {
            Some(contents) => contents.render(ctx, self, pass),
            None => Ok(()),
        }
    }

    /// Whether the blend mode floods outside the entity's own bounds.
    #[inline]
    #[must_use]
    pub fn blend_mode_should_cover_whole_screen(&self) -> bool {
        self.blend_mode.should_cover_whole_screen()
    }

    /// Copy of this entity for drawing into a fresh snapshot texture.
    pub(crate) fn snapshot_entity(&self, to_texture: Affine) -> Self {
        Self {
            transformation: to_texture * self.transformation,
            contents: self.contents.clone(),
            stencil_depth: 0,
            blend_mode: BlendMode::SourceOver,
        }
    }
}
