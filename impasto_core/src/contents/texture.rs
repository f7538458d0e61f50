// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Rect;

use super::{ActivePass, ContentContext, Contents};
use crate::entity::Entity;
use crate::error::Result;
use crate::geometry;
use crate::renderer::{DrawCommand, Pipeline, StencilOp, TextureId};

/// Draws a region of a texture into a destination rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureContents {
    /// Texture to sample.
    pub texture: TextureId,
    /// Sampled region in texels.
    pub source_rect: Rect,
    /// Where the region lands, in entity space.
    pub destination: Rect,
    /// Opacity multiplier.
    pub opacity: f32,
}

impl TextureContents {
    /// Draws `source_rect` of `texture` into `destination` at full opacity.
    #[must_use]
    pub const fn new(texture: TextureId, source_rect: Rect, destination: Rect) -> Self {
        Self {
            texture,
            source_rect,
            destination,
            opacity: 1.0,
        }
    }

    /// Sets the opacity multiplier.
    #[must_use]
    pub const fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }
}

impl Contents for TextureContents {
    fn coverage(&self, entity: &Entity) -> Option<Rect> {
        if self.opacity <= 0.0 || geometry::is_empty(self.destination) {
            return None;
        }
        Some(geometry::transform_bounds(
            entity.transformation,
            self.destination,
        ))
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        ctx.record(
            pass,
            DrawCommand {
                label: "Texture Fill",
                pipeline: Pipeline::Texture {
                    texture: self.texture,
                    source_rect: self.source_rect,
                    opacity: self.opacity,
                },
                transform: entity.transformation,
                bounds: self.destination,
                blend_mode: entity.blend_mode,
                stencil_reference: entity.stencil_depth,
                stencil: StencilOp::Keep,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;

    #[test]
    fn coverage_is_destination_transformed() {
        let contents = TextureContents::new(
            TextureId(1),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 20.0, 20.0),
        );
        let entity = Entity::default().with_transformation(Affine::translate((1.0, 2.0)));
        assert_eq!(
            contents.coverage(&entity),
            Some(Rect::new(1.0, 2.0, 21.0, 22.0))
        );
    }

    #[test]
    fn transparent_texture_has_no_coverage() {
        let contents = TextureContents::new(
            TextureId(1),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        )
        .with_opacity(0.0);
        assert_eq!(contents.coverage(&Entity::default()), None);
    }
}
