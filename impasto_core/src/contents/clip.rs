// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stencil clip and clip-restore contents.
//!
//! Clips never write color. An intersect clip increments the stencil inside
//! its geometry wherever the stencil still equals the entity's depth, so
//! only pixels inside every active clip reach `depth + 1`. A difference clip
//! increments the whole target and then decrements inside the geometry.
//! A restore sets every stencil value above the entity's depth back to it.

use alloc::rc::Rc;

use kurbo::{Affine, Rect};

use super::{
    ActivePass, ContentContext, Contents, Geometry, StencilCoverage, StencilCoverageKind,
};
use crate::blend::BlendMode;
use crate::color::Color;
use crate::entity::Entity;
use crate::error::Result;
use crate::geometry;
use crate::renderer::{DrawCommand, Pipeline, StencilOp};

/// Whether a clip keeps the inside or the outside of its geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipOp {
    /// Keep pixels inside the geometry.
    #[default]
    Intersect,
    /// Keep pixels outside the geometry.
    Difference,
}

/// Pushes a clip onto the stencil stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipContents {
    /// Clip geometry in entity space.
    pub geometry: Geometry,
    /// Which side of the geometry survives.
    pub op: ClipOp,
}

impl ClipContents {
    /// Creates a clip.
    #[must_use]
    pub const fn new(geometry: Geometry, op: ClipOp) -> Self {
        Self { geometry, op }
    }

    fn stencil_command(
        label: &'static str,
        transform: Affine,
        bounds: Rect,
        reference: u32,
        stencil: StencilOp,
    ) -> DrawCommand {
        DrawCommand {
            label,
            pipeline: Pipeline::Solid(Color::TRANSPARENT),
            transform,
            bounds,
            blend_mode: BlendMode::Destination,
            stencil_reference: reference,
            stencil,
        }
    }
}

impl Contents for ClipContents {
    fn coverage(&self, _entity: &Entity) -> Option<Rect> {
        None
    }

    fn stencil_coverage(&self, entity: &Entity, current: Option<Rect>) -> StencilCoverage {
        let coverage = match self.op {
            // Conservatively keep the whole current clip.
            ClipOp::Difference => current,
            ClipOp::Intersect => current.and_then(|current| {
                let clip = self.geometry.coverage(entity.transformation)?;
                geometry::intersection(current, clip)
            }),
        };
        StencilCoverage {
            kind: StencilCoverageKind::Append,
            coverage,
        }
    }

    fn should_render(&self, _entity: &Entity, _stencil_coverage: Option<Rect>) -> bool {
        true
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        let depth = entity.stencil_depth;
        let (transform, bounds) = self.geometry.draw_bounds(entity.transformation, pass);
        match self.op {
            ClipOp::Intersect => ctx.record(
                pass,
                Self::stencil_command(
                    "Intersect Clip",
                    transform,
                    bounds,
                    depth,
                    StencilOp::IncrementWhereEqual,
                ),
            ),
            ClipOp::Difference => {
                ctx.record(
                    pass,
                    Self::stencil_command(
                        "Difference Clip (Increment)",
                        Affine::IDENTITY,
                        pass.target.rect(),
                        depth,
                        StencilOp::IncrementWhereEqual,
                    ),
                )?;
                ctx.record(
                    pass,
                    Self::stencil_command(
                        "Difference Clip (Punch)",
                        transform,
                        bounds,
                        depth + 1,
                        StencilOp::DecrementWhereEqual,
                    ),
                )
            }
        }
    }
}

/// Pops the stencil stack back to the entity's depth.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipRestoreContents {
    /// Target-space area to restore; `None` restores the whole target.
    pub restore_coverage: Option<Rect>,
}

impl ClipRestoreContents {
    /// Creates a restore covering the whole target.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            restore_coverage: None,
        }
    }
}

impl Contents for ClipRestoreContents {
    fn coverage(&self, _entity: &Entity) -> Option<Rect> {
        None
    }

    fn stencil_coverage(&self, _entity: &Entity, current: Option<Rect>) -> StencilCoverage {
        StencilCoverage {
            kind: StencilCoverageKind::Restore,
            coverage: current,
        }
    }

    fn should_render(&self, _entity: &Entity, _stencil_coverage: Option<Rect>) -> bool {
        true
    }

    fn render(
        &self,
        ctx: &mut ContentContext<'_>,
        entity: &Entity,
        pass: &ActivePass,
    ) -> Result<()> {
        let target = pass.target.rect();
        let Some(bounds) = self
            .restore_coverage
            .map_or(Some(target), |r| geometry::intersection(geometry::round_out(r), target))
        else {
            return Ok(());
        };
        ctx.record(
            pass,
            ClipContents::stencil_command(
                "Restore Clip",
                Affine::IDENTITY,
                bounds,
                entity.stencil_depth,
                StencilOp::RestoreWhereGreater,
            ),
        )
    }

    fn with_restore_coverage(&self, coverage: Option<Rect>) -> Option<Rc<dyn Contents>> {
        Some(Rc::new(Self {
            restore_coverage: coverage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_clip(x0: f64, y0: f64, x1: f64, y1: f64, op: ClipOp) -> ClipContents {
        ClipContents::new(Geometry::Rect(Rect::new(x0, y0, x1, y1)), op)
    }

    fn stencil_of(clip: &impl Contents, current: Option<Rect>) -> StencilCoverage {
        clip.stencil_coverage(&Entity::default(), current)
    }

    #[test]
    fn intersect_clip_appends_intersection() {
        let clip = rect_clip(5.0, 5.0, 50.0, 50.0, ClipOp::Intersect);
        let stencil = stencil_of(&clip, Some(Rect::new(0.0, 0.0, 20.0, 20.0)));
        assert_eq!(stencil.kind, StencilCoverageKind::Append);
        assert_eq!(stencil.coverage, Some(Rect::new(5.0, 5.0, 20.0, 20.0)));
    }

    #[test]
    fn disjoint_intersect_clip_clips_everything() {
        let clip = rect_clip(50.0, 50.0, 60.0, 60.0, ClipOp::Intersect);
        let stencil = stencil_of(&clip, Some(Rect::new(0.0, 0.0, 20.0, 20.0)));
        assert_eq!(stencil.kind, StencilCoverageKind::Append);
        assert_eq!(stencil.coverage, None);
    }

    #[test]
    fn difference_clip_keeps_current_coverage() {
        let clip = rect_clip(5.0, 5.0, 10.0, 10.0, ClipOp::Difference);
        let current = Some(Rect::new(0.0, 0.0, 20.0, 20.0));
        let stencil = stencil_of(&clip, current);
        assert_eq!(stencil.coverage, current);
    }

    #[test]
    fn clips_always_render() {
        let clip = ClipContents::new(Geometry::Cover, ClipOp::Intersect);
        assert!(clip.should_render(&Entity::default(), None));
        assert!(ClipRestoreContents::new().should_render(&Entity::default(), None));
    }

    #[test]
    fn restore_reports_restore() {
        let restore = ClipRestoreContents::new();
        let current = Some(Rect::new(0.0, 0.0, 1.0, 1.0));
        let stencil = stencil_of(&restore, current);
        assert_eq!(stencil.kind, StencilCoverageKind::Restore);
        assert_eq!(stencil.coverage, current);
    }

    #[test]
    fn restore_coverage_is_replaced() {
        let restore = ClipRestoreContents::new();
        let replaced = restore
            .with_restore_coverage(Some(Rect::new(1.0, 1.0, 2.0, 2.0)))
            .expect("restore contents accept coverage");
        assert_eq!(replaced.coverage(&Entity::default()), None);
        let solid = super::super::SolidColorContents::cover(Color::RED);
        assert!(solid.with_restore_coverage(None).is_none());
    }
}
