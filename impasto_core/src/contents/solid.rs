// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Rect;

use super::{ActivePass, ContentContext, Contents, Geometry};
use crate::color::Color;
use crate::entity::Entity;
use crate::error::Result;
use crate::renderer::{DrawCommand, Pipeline, StencilOp};

/// Fills geometry with a flat color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidColorContents {
    /// What to fill.
    pub geometry: Geometry,
    /// Premultiplied fill color.
    pub color: Color,
}

impl SolidColorContents {
    /// Fills a rectangle in entity space.
    #[must_use]
    pub const fn rect(rect: Rect, color: Color) -> Self {
        Self {
            geometry: Geometry::Rect(rect),
            color,
        }
    }

    /// Fills the whole render target.
    #[must_use]
    pub const fn cover(color: Color) -> Self {
        Self {
            geometry: Geometry::Cover,
            color,
        }
    }
}

impl Contents for SolidColorContents {
    fn coverage(&self, entity: &Entity) -> Option<Rect> {
        self.geometry.coverage(entity.transformation)
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        let (transform, bounds) = self.geometry.draw_bounds(entity.transformation, pass);
        ctx.record(
            pass,
            DrawCommand {
                label: "Solid Fill",
                pipeline: Pipeline::Solid(self.color),
                transform,
                bounds,
                blend_mode: entity.blend_mode,
                stencil_reference: entity.stencil_depth,
                stencil: StencilOp::Keep,
            },
        )
    }
}
