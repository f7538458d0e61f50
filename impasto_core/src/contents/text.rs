// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Rect;

use super::{ActivePass, ContentContext, Contents};
use crate::color::Color;
use crate::entity::Entity;
use crate::error::{RenderError, Result};
use crate::geometry;
use crate::glyph_atlas::TextFrame;
use crate::renderer::{DrawCommand, Pipeline, StencilOp};

/// Draws a text frame using the pass tree's shared glyph atlas.
#[derive(Clone, Debug, PartialEq)]
pub struct TextContents {
    /// The laid-out glyphs.
    pub frame: TextFrame,
    /// Premultiplied fill color.
    pub color: Color,
}

impl TextContents {
    /// Creates text contents.
    #[must_use]
    pub fn new(frame: TextFrame, color: Color) -> Self {
        Self { frame, color }
    }
}

impl Contents for TextContents {
    fn coverage(&self, entity: &Entity) -> Option<Rect> {
        let bounds = self.frame.bounds()?;
        Some(geometry::transform_bounds(entity.transformation, bounds))
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        let atlas = ctx.glyph_atlas.create_or_get_atlas();
        for glyph in &self.frame.glyphs {
            let slot = atlas
                .slot(glyph.key)
                .ok_or(RenderError::Contents("glyph missing from atlas"))?;
            ctx.record(
                pass,
                DrawCommand {
                    label: "Glyph",
                    pipeline: Pipeline::Glyph {
                        color: self.color,
                        slot,
                    },
                    transform: entity.transformation,
                    bounds: glyph.frame_bounds(),
                    blend_mode: entity.blend_mode,
                    stencil_reference: entity.stencil_depth,
                    stencil: StencilOp::Keep,
                },
            )?;
        }
        Ok(())
    }

    fn text_frame(&self) -> Option<&TextFrame> {
        Some(&self.frame)
    }
}
