// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass policy hooks.

use alloc::rc::Rc;
use core::fmt;

use kurbo::Rect;

use crate::contents::{Contents, FilterContents, TextureContents};
use crate::renderer::{TextureId, TextureSize};

/// Decides how a sub-pass is composited into its parent.
pub trait EntityPassDelegate: fmt::Debug {
    /// Returns whether the sub-pass can be skipped entirely.
    fn can_elide(&self) -> bool {
        false
    }

    /// Returns whether the sub-pass may be drawn straight into its parent.
    fn can_collapse_into_parent_pass(&self) -> bool;

    /// Builds the contents that draw the sub-pass's rendered texture.
    ///
    /// `destination` is where the texture lands in the parent target.
    fn create_contents_for_subpass_target(
        &self,
        texture: TextureId,
        size: TextureSize,
        destination: Rect,
    ) -> Rc<dyn Contents>;

    /// Filter applied to the sub-pass output, if any.
    fn image_filter(&self) -> Option<Rc<dyn FilterContents>> {
        None
    }
}

/// Collapses when possible and composites at full opacity.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPassDelegate;

impl EntityPassDelegate for DefaultPassDelegate {
    fn can_collapse_into_parent_pass(&self) -> bool {
        true
    }

    fn create_contents_for_subpass_target(
        &self,
        texture: TextureId,
        size: TextureSize,
        destination: Rect,
    ) -> Rc<dyn Contents> {
        Rc::new(TextureContents::new(texture, size.to_rect(), destination))
    }
}

/// A save layer with group opacity and an optional image filter.
///
/// Group opacity applies to the flattened layer, so the layer always renders
/// offscreen.
#[derive(Clone, Debug)]
pub struct PaintPassDelegate {
    /// Group opacity.
    pub opacity: f32,
    /// Filter applied to the layer.
    pub image_filter: Option<Rc<dyn FilterContents>>,
}

impl PaintPassDelegate {
    /// A layer at `opacity` without a filter.
    #[must_use]
    pub fn new(opacity: f32) -> Self {
        Self {
            opacity,
            image_filter: None,
        }
    }

    /// Sets the image filter.
    #[must_use]
    pub fn with_image_filter(mut self, filter: Rc<dyn FilterContents>) -> Self {
        self.image_filter = Some(filter);
        self
    }
}

impl EntityPassDelegate for PaintPassDelegate {
    fn can_elide(&self) -> bool {
        self.opacity <= 0.0
    }

    fn can_collapse_into_parent_pass(&self) -> bool {
        false
    }

    fn create_contents_for_subpass_target(
        &self,
        texture: TextureId,
        size: TextureSize,
        destination: Rect,
    ) -> Rc<dyn Contents> {
        Rc::new(
            TextureContents::new(texture, size.to_rect(), destination).with_opacity(self.opacity),
        )
    }

    fn image_filter(&self) -> Option<Rc<dyn FilterContents>> {
        self.image_filter.clone()
    }
}
