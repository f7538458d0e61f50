// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderer contract.
//!
//! The pass walker talks to a GPU (or a stand-in for one) exclusively through
//! the [`Renderer`] trait: it allocates textures, opens command buffers and
//! render passes on them, records [`DrawCommand`]s, copies textures with
//! blits, and submits. Every call is fallible; a failure aborts the frame.
//!
//! Draw commands are backend-neutral. Each one names a [`Pipeline`] (what to
//! shade), a local-space `bounds` rectangle and a `transform` into the
//! render target, the [`BlendMode`] to composite with, and the stencil
//! reference and [`StencilOp`] that implement nested clipping.
//!
//! Texture-sampling pipelines carry a `source_rect` in texel coordinates.
//! A point `q` inside `bounds` samples the texel at
//! `source_rect.origin() + (q - bounds.origin()) * source_rect.size() / bounds.size()`.

use core::fmt;

use kurbo::{Affine, Rect};

use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::Result;

/// A handle to a renderer-owned texture.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

/// A handle to an open command buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandBufferId(pub u32);

impl fmt::Debug for CommandBufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandBufferId({})", self.0)
    }
}

/// A handle to an open render pass.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderPassId(pub u32);

impl fmt::Debug for RenderPassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderPassId({})", self.0)
    }
}

/// Integer texture dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TextureSize {
    /// Creates a size.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the size of a pixel-aligned rectangle, or `None` if it is empty
    /// or does not fit in `u32`.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Option<Self> {
        let w = rect.width();
        let h = rect.height();
        if !(w >= 1.0 && h >= 1.0 && w <= f64::from(u32::MAX) && h <= f64::from(u32::MAX)) {
            return None;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "range checked above and the rect is pixel aligned"
        )]
        let size = Self::new(w as u32, h as u32);
        Some(size)
    }

    /// Returns the rectangle `(0, 0, width, height)`.
    #[inline]
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    /// Returns whether either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Parameters for [`Renderer::create_texture`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// Diagnostic label.
    pub label: &'static str,
    /// Dimensions.
    pub size: TextureSize,
}

/// A texture being rendered into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    /// The color (and stencil) attachment.
    pub texture: TextureId,
    /// Attachment dimensions.
    pub size: TextureSize,
    /// Whether this is the presentable surface rather than an offscreen
    /// texture.
    pub onscreen: bool,
}

impl RenderTarget {
    /// Describes the presentable surface.
    #[must_use]
    pub const fn onscreen(texture: TextureId, size: TextureSize) -> Self {
        Self {
            texture,
            size,
            onscreen: true,
        }
    }

    /// Describes an offscreen texture.
    #[must_use]
    pub const fn offscreen(texture: TextureId, size: TextureSize) -> Self {
        Self {
            texture,
            size,
            onscreen: false,
        }
    }

    /// Returns the target's bounds in its own pixel space.
    #[inline]
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.size.to_rect()
    }
}

/// What happens to the attachment contents when a render pass begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadAction {
    /// Clear color to transparent and stencil to zero.
    #[default]
    Clear,
    /// Keep the existing color and stencil contents.
    Load,
}

/// Stencil behavior of a draw.
///
/// Every op only affects pixels whose stencil value passes the comparison
/// against the command's `stencil_reference`. Only [`Keep`](Self::Keep)
/// writes color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilOp {
    /// Draw color where stencil equals the reference; stencil untouched.
    #[default]
    Keep,
    /// Increment stencil where it equals the reference.
    IncrementWhereEqual,
    /// Decrement stencil where it equals the reference.
    DecrementWhereEqual,
    /// Set stencil to the reference where it is greater.
    RestoreWhereGreater,
}

/// What a draw command shades.
#[derive(Clone, Debug, PartialEq)]
pub enum Pipeline {
    /// A flat premultiplied color.
    Solid(Color),
    /// Samples a texture.
    Texture {
        /// Source texture.
        texture: TextureId,
        /// Sampled region in texels.
        source_rect: Rect,
        /// Multiplier applied to the sampled color.
        opacity: f32,
    },
    /// Separable Gaussian blur of a texture.
    Blur {
        /// Source texture.
        texture: TextureId,
        /// Sampled region in texels.
        source_rect: Rect,
        /// Horizontal standard deviation in texels.
        sigma_x: f32,
        /// Vertical standard deviation in texels.
        sigma_y: f32,
    },
    /// A 4x5 row-major color matrix applied to unpremultiplied texels.
    ColorMatrix {
        /// Source texture.
        texture: TextureId,
        /// Sampled region in texels.
        source_rect: Rect,
        /// Matrix rows for r, g, b, a; the fifth column is an offset.
        matrix: [f32; 20],
    },
    /// Blends a source texture against a copied backdrop in the shader.
    Blend {
        /// Foreground texture.
        source: TextureId,
        /// Sampled foreground region in texels.
        source_rect: Rect,
        /// Copy of the destination.
        backdrop: TextureId,
        /// Sampled backdrop region in texels.
        backdrop_rect: Rect,
        /// The advanced blend to evaluate.
        mode: BlendMode,
    },
    /// A glyph from the frame's glyph atlas.
    Glyph {
        /// Fill color.
        color: Color,
        /// Atlas slot.
        slot: u32,
    },
}

/// A single draw recorded into a render pass.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    /// Diagnostic label.
    pub label: &'static str,
    /// What to shade.
    pub pipeline: Pipeline,
    /// Maps `bounds` into render-target pixels.
    pub transform: Affine,
    /// Local-space geometry.
    pub bounds: Rect,
    /// How to composite with the destination.
    pub blend_mode: BlendMode,
    /// Stencil reference value.
    pub stencil_reference: u32,
    /// Stencil behavior.
    pub stencil: StencilOp,
}

/// Optional renderer features the pass walker adapts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Shaders can read the destination pixel, so advanced blends need no
    /// backdrop copy.
    pub supports_framebuffer_fetch: bool,
    /// The onscreen surface can be sampled and blitted from.
    pub supports_read_from_onscreen: bool,
    /// Largest texture dimension the renderer accepts.
    pub max_texture_size: u32,
}

impl Capabilities {
    /// Typical desktop GPU: no framebuffer fetch, readable swapchain.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            supports_framebuffer_fetch: false,
            supports_read_from_onscreen: true,
            max_texture_size: 16384,
        }
    }

    /// Typical tiled mobile GPU: framebuffer fetch, write-only swapchain.
    #[must_use]
    pub const fn mobile() -> Self {
        Self {
            supports_framebuffer_fetch: true,
            supports_read_from_onscreen: false,
            max_texture_size: 8192,
        }
    }

    /// A renderer that can do everything, such as a CPU rasterizer.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self {
            supports_framebuffer_fetch: true,
            supports_read_from_onscreen: true,
            max_texture_size: u32::MAX,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::desktop()
    }
}

/// A command-buffer based renderer.
///
/// Calls on one command buffer are ordered. Textures created during a frame
/// stay valid until they are passed to
/// [`release_texture`](Self::release_texture).
pub trait Renderer {
    /// Returns the feature set the walker can rely on.
    fn capabilities(&self) -> Capabilities;

    /// Allocates a texture usable as both render target and sampler source.
    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId>;

    /// Opens a command buffer.
    fn create_command_buffer(&mut self) -> Result<CommandBufferId>;

    /// Begins a render pass on `target` within `buffer`.
    fn begin_render_pass(
        &mut self,
        buffer: CommandBufferId,
        target: &RenderTarget,
        load: LoadAction,
    ) -> Result<RenderPassId>;

    /// Records a draw into an open render pass.
    fn record(&mut self, pass: RenderPassId, command: DrawCommand) -> Result<()>;

    /// Ends a render pass.
    fn end_render_pass(&mut self, pass: RenderPassId) -> Result<()>;

    /// Copies `source` into `destination`, which must be at least as large.
    fn blit(
        &mut self,
        buffer: CommandBufferId,
        source: TextureId,
        destination: TextureId,
    ) -> Result<()>;

    /// Submits a command buffer. The buffer id is invalid afterwards.
    fn submit(&mut self, buffer: CommandBufferId) -> Result<()>;

    /// Gives back a texture made by [`create_texture`](Self::create_texture).
    ///
    /// The walk calls this once per texture after the frame's command
    /// buffers have been submitted or abandoned. The id is invalid afterwards;
    /// work already submitted may still sample the texture.
    fn release_texture(&mut self, texture: TextureId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_from_pixel_rect() {
        assert_eq!(
            TextureSize::from_rect(Rect::new(10.0, 20.0, 42.0, 36.0)),
            Some(TextureSize::new(32, 16))
        );
        assert_eq!(TextureSize::from_rect(Rect::new(0.0, 0.0, 0.0, 10.0)), None);
        assert_eq!(
            TextureSize::from_rect(Rect::new(0.0, 0.0, f64::INFINITY, 10.0)),
            None
        );
    }

    #[test]
    fn target_rect_is_at_origin() {
        let t = RenderTarget::offscreen(TextureId(3), TextureSize::new(8, 4));
        assert_eq!(t.rect(), Rect::new(0.0, 0.0, 8.0, 4.0));
        assert!(!t.onscreen);
    }

    #[test]
    fn capability_presets() {
        assert!(!Capabilities::desktop().supports_framebuffer_fetch);
        assert!(Capabilities::desktop().supports_read_from_onscreen);
        assert!(Capabilities::mobile().supports_framebuffer_fetch);
        assert!(!Capabilities::mobile().supports_read_from_onscreen);
        assert_eq!(Capabilities::default(), Capabilities::desktop());
    }
}
