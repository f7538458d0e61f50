// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A CPU reference renderer.
//!
//! Commands execute as soon as they are recorded, so a submitted command
//! buffer is only bookkeeping. Every texture carries a color plane and a
//! stencil plane. Pixels are shaded at their centers without anti-aliasing,
//! which keeps results exact enough to assert on.

use std::collections::HashMap;

use impasto_core::blend::{BlendMode, blend_color};
use impasto_core::color::Color;
use impasto_core::error::{RenderError, Result};
use impasto_core::geometry;
use impasto_core::renderer::{
    Capabilities, CommandBufferId, DrawCommand, LoadAction, Pipeline, RenderPassId, RenderTarget,
    Renderer, StencilOp, TextureDescriptor, TextureId, TextureSize,
};
use kurbo::{Point, Rect};

/// Color and stencil planes of one texture.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    size: TextureSize,
    pixels: Vec<Color>,
    stencil: Vec<u32>,
}

impl Surface {
    fn new(size: TextureSize) -> Self {
        let len = size.width as usize * size.height as usize;
        Self {
            size,
            pixels: vec![Color::TRANSPARENT; len],
            stencil: vec![0; len],
        }
    }

    /// Dimensions in pixels.
    #[must_use]
    pub fn size(&self) -> TextureSize {
        self.size
    }

    /// Premultiplied color at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.index(i64::from(x), i64::from(y)).map(|i| self.pixels[i])
    }

    /// Stencil value at `(x, y)`.
    #[must_use]
    pub fn stencil(&self, x: u32, y: u32) -> Option<u32> {
        self.index(i64::from(x), i64::from(y)).map(|i| self.stencil[i])
    }

    /// All pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let w = i64::from(self.size.width);
        let h = i64::from(self.size.height);
        if x < 0 || y < 0 || x >= w || y >= h {
            return None;
        }
        usize::try_from(y * w + x).ok()
    }

    fn clear(&mut self) {
        self.pixels.fill(Color::TRANSPARENT);
        self.stencil.fill(0);
    }
}

/// A sampling view of a surface whose texel `(0, 0)` sits at `origin`.
///
/// Blurred images grow past their source, so their origin is negative.
#[derive(Clone, Debug)]
struct Image {
    surface: Surface,
    origin: (i64, i64),
}

impl Image {
    fn new(surface: Surface) -> Self {
        Self {
            surface,
            origin: (0, 0),
        }
    }

    /// Nearest-texel lookup; outside the image is transparent.
    fn sample(&self, texel: Point) -> Color {
        let x = floor_px(texel.x) - self.origin.0;
        let y = floor_px(texel.y) - self.origin.1;
        self.surface
            .index(x, y)
            .map_or(Color::TRANSPARENT, |i| self.surface.pixels[i])
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "coordinates are bounded by texture sizes"
)]
fn floor_px(v: f64) -> i64 {
    v.floor() as i64
}

/// Maps a point inside `bounds` onto the corresponding point of `source_rect`.
fn map_to_texels(local: Point, bounds: Rect, source_rect: Rect) -> Point {
    let sx = source_rect.width() / bounds.width();
    let sy = source_rect.height() / bounds.height();
    Point::new(
        source_rect.x0 + (local.x - bounds.x0) * sx,
        source_rect.y0 + (local.y - bounds.y0) * sy,
    )
}

/// Gaussian blur with transparent edges. The result is padded by the kernel
/// radius on each side.
fn blur(image: &Image, sigma_x: f32, sigma_y: f32) -> Image {
    let horizontal = blur_axis(image, sigma_x, true);
    blur_axis(&horizontal, sigma_y, false)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "the kernel radius is small and normalized weights fit in f32"
)]
fn kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let sigma = f64::from(sigma);
    let radius = (3.0 * sigma).ceil() as i32;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| {
            let x = f64::from(i);
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / total) as f32).collect()
}

fn blur_axis(image: &Image, sigma: f32, horizontal: bool) -> Image {
    let weights = kernel(sigma);
    let radius = u32::try_from(weights.len() / 2).unwrap_or(0);
    let src = &image.surface;
    let size = if horizontal {
        TextureSize::new(src.size.width + 2 * radius, src.size.height)
    } else {
        TextureSize::new(src.size.width, src.size.height + 2 * radius)
    };
    let mut out = Surface::new(size);
    let r = i64::from(radius);
    for y in 0..size.height {
        for x in 0..size.width {
            let (ox, oy) = (i64::from(x), i64::from(y));
            let mut acc = Color::TRANSPARENT;
            for (k, w) in (-r..=r).zip(&weights) {
                let (sx, sy) = if horizontal {
                    (ox - r + k, oy)
                } else {
                    (ox, oy - r + k)
                };
                if let Some(i) = src.index(sx, sy) {
                    acc = acc + src.pixels[i] * *w;
                }
            }
            if let Some(i) = out.index(ox, oy) {
                out.pixels[i] = acc;
            }
        }
    }
    let origin = if horizontal {
        (image.origin.0 - r, image.origin.1)
    } else {
        (image.origin.0, image.origin.1 - r)
    };
    Image {
        surface: out,
        origin,
    }
}

fn apply_color_matrix(color: Color, m: &[f32; 20]) -> Color {
    let (r, g, b) = if color.a > 0.0 {
        (color.r / color.a, color.g / color.a, color.b / color.a)
    } else {
        (0.0, 0.0, 0.0)
    };
    let a = color.a;
    let row = |i: usize| {
        let m = &m[i * 5..i * 5 + 5];
        m[0] * r + m[1] * g + m[2] * b + m[3] * a + m[4]
    };
    Color::from_straight(row(0), row(1), row(2), row(3).clamp(0.0, 1.0)).clamped()
}

/// A pipeline with its inputs resolved.
#[derive(Debug)]
enum Shader {
    Solid(Color),
    Texture {
        image: Image,
        source_rect: Rect,
        opacity: f32,
    },
    ColorMatrix {
        image: Image,
        source_rect: Rect,
        matrix: [f32; 20],
    },
    Blend {
        source: Image,
        source_rect: Rect,
        backdrop: Image,
        backdrop_rect: Rect,
        mode: BlendMode,
    },
}

impl Shader {
    fn shade(&self, local: Point, bounds: Rect) -> Color {
        match self {
            Self::Solid(color) => *color,
            Self::Texture {
                image,
                source_rect,
                opacity,
            } => image.sample(map_to_texels(local, bounds, *source_rect)) * *opacity,
            Self::ColorMatrix {
                image,
                source_rect,
                matrix,
            } => {
                apply_color_matrix(image.sample(map_to_texels(local, bounds, *source_rect)), matrix)
            }
            Self::Blend {
                source,
                source_rect,
                backdrop,
                backdrop_rect,
                mode,
            } => {
                let src = source.sample(map_to_texels(local, bounds, *source_rect));
                let dst = backdrop.sample(map_to_texels(local, bounds, *backdrop_rect));
                blend_color(src, dst, *mode)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct OpenPass {
    buffer: CommandBufferId,
    target: TextureId,
}

/// Rasterizes draw commands into in-memory surfaces.
#[derive(Debug)]
pub struct SoftwareRenderer {
    capabilities: Capabilities,
    surfaces: HashMap<TextureId, Surface>,
    buffers: Vec<CommandBufferId>,
    passes: HashMap<RenderPassId, OpenPass>,
    next_id: u32,
}

impl SoftwareRenderer {
    /// Creates a renderer reporting `capabilities`.
    ///
    /// The rasterizer itself can do everything; narrower capabilities make
    /// the pass walk take the paths a constrained GPU would need.
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            surfaces: HashMap::new(),
            buffers: Vec::new(),
            passes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Allocates the surface a frame is presented to.
    pub fn create_onscreen(&mut self, size: TextureSize) -> RenderTarget {
        let texture = TextureId(self.next());
        self.surfaces.insert(texture, Surface::new(size));
        RenderTarget::onscreen(texture, size)
    }

    /// The surface behind `texture`.
    #[must_use]
    pub fn surface(&self, texture: TextureId) -> Option<&Surface> {
        self.surfaces.get(&texture)
    }

    /// Number of live textures, the onscreen surface included.
    ///
    /// Textures the walk allocates are released when its frame ends, so
    /// between frames only onscreen surfaces remain.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.surfaces.len()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn image(&self, texture: TextureId) -> Result<Image> {
        self.surfaces
            .get(&texture)
            .cloned()
            .map(Image::new)
            .ok_or(RenderError::Pipeline("sampled texture does not exist"))
    }

    fn shader(&self, pipeline: &Pipeline) -> Result<Shader> {
        Ok(match pipeline {
            Pipeline::Solid(color) => Shader::Solid(*color),
            Pipeline::Glyph { color, .. } => Shader::Solid(*color),
            Pipeline::Texture {
                texture,
                source_rect,
                opacity,
            } => Shader::Texture {
                image: self.image(*texture)?,
                source_rect: *source_rect,
                opacity: *opacity,
            },
            Pipeline::Blur {
                texture,
                source_rect,
                sigma_x,
                sigma_y,
            } => Shader::Texture {
                image: blur(&self.image(*texture)?, *sigma_x, *sigma_y),
                source_rect: *source_rect,
                opacity: 1.0,
            },
            Pipeline::ColorMatrix {
                texture,
                source_rect,
                matrix,
            } => Shader::ColorMatrix {
                image: self.image(*texture)?,
                source_rect: *source_rect,
                matrix: *matrix,
            },
            Pipeline::Blend {
                source,
                source_rect,
                backdrop,
                backdrop_rect,
                mode,
            } => Shader::Blend {
                source: self.image(*source)?,
                source_rect: *source_rect,
                backdrop: self.image(*backdrop)?,
                backdrop_rect: *backdrop_rect,
                mode: *mode,
            },
        })
    }

    fn rasterize(&mut self, target: TextureId, command: &DrawCommand) -> Result<()> {
        if geometry::is_empty(command.bounds) {
            return Ok(());
        }
        let det = command.transform.determinant();
        if det == 0.0 || !det.is_finite() {
            return Ok(());
        }
        let inverse = command.transform.inverse();
        let shader = self.shader(&command.pipeline)?;
        let surface = self
            .surfaces
            .get_mut(&target)
            .ok_or(RenderError::RenderPass("render target does not exist"))?;
        let device = geometry::transform_bounds(command.transform, command.bounds);
        let Some(area) = geometry::intersection(device, surface.size.to_rect()) else {
            return Ok(());
        };
        let area = geometry::round_out(area);
        let reference = command.stencil_reference;
        let px = |v: f64| u32::try_from(floor_px(v)).unwrap_or(0);
        for y in px(area.y0)..px(area.y1) {
            for x in px(area.x0)..px(area.x1) {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let local = inverse * center;
                let b = command.bounds;
                if local.x < b.x0 || local.x >= b.x1 || local.y < b.y0 || local.y >= b.y1 {
                    continue;
                }
                let Some(i) = surface.index(i64::from(x), i64::from(y)) else {
                    continue;
                };
                let stencil = surface.stencil[i];
                let passes = match command.stencil {
                    StencilOp::RestoreWhereGreater => stencil > reference,
                    _ => stencil == reference,
                };
                if !passes {
                    continue;
                }
                match command.stencil {
                    StencilOp::Keep => {}
                    StencilOp::IncrementWhereEqual => surface.stencil[i] = stencil + 1,
                    StencilOp::DecrementWhereEqual => {
                        surface.stencil[i] = stencil.saturating_sub(1);
                    }
                    StencilOp::RestoreWhereGreater => surface.stencil[i] = reference,
                }
                if command.blend_mode == BlendMode::Destination {
                    continue;
                }
                let src = shader.shade(local, b);
                surface.pixels[i] =
                    blend_color(src, surface.pixels[i], command.blend_mode).clamped();
            }
        }
        Ok(())
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new(Capabilities::unrestricted())
    }
}

impl Renderer for SoftwareRenderer {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId> {
        let max = self.capabilities.max_texture_size;
        if desc.size.is_empty() || desc.size.width > max || desc.size.height > max {
            return Err(RenderError::TextureAllocation {
                label: desc.label,
                width: desc.size.width,
                height: desc.size.height,
            });
        }
        let texture = TextureId(self.next());
        self.surfaces.insert(texture, Surface::new(desc.size));
        Ok(texture)
    }

    fn create_command_buffer(&mut self) -> Result<CommandBufferId> {
        let buffer = CommandBufferId(self.next());
        self.buffers.push(buffer);
        Ok(buffer)
    }

    fn begin_render_pass(
        &mut self,
        buffer: CommandBufferId,
        target: &RenderTarget,
        load: LoadAction,
    ) -> Result<RenderPassId> {
        if !self.buffers.contains(&buffer) {
            return Err(RenderError::RenderPass("command buffer is not open"));
        }
        let surface = self
            .surfaces
            .get_mut(&target.texture)
            .ok_or(RenderError::RenderPass("render target does not exist"))?;
        if load == LoadAction::Clear {
            surface.clear();
        }
        let pass = RenderPassId(self.next());
        self.passes.insert(
            pass,
            OpenPass {
                buffer,
                target: target.texture,
            },
        );
        Ok(pass)
    }

    fn record(&mut self, pass: RenderPassId, command: DrawCommand) -> Result<()> {
        let open = *self
            .passes
            .get(&pass)
            .ok_or(RenderError::RenderPass("draw into a pass that is not open"))?;
        self.rasterize(open.target, &command)
    }

    fn end_render_pass(&mut self, pass: RenderPassId) -> Result<()> {
        self.passes
            .remove(&pass)
            .map(|_| ())
            .ok_or(RenderError::RenderPass("ending a pass that is not open"))
    }

    fn blit(
        &mut self,
        buffer: CommandBufferId,
        source: TextureId,
        destination: TextureId,
    ) -> Result<()> {
        if !self.buffers.contains(&buffer) {
            return Err(RenderError::BlitPass("command buffer is not open"));
        }
        let src = self
            .surfaces
            .get(&source)
            .cloned()
            .ok_or(RenderError::BlitPass("blit source does not exist"))?;
        let dst = self
            .surfaces
            .get_mut(&destination)
            .ok_or(RenderError::BlitPass("blit destination does not exist"))?;
        if src.size.width > dst.size.width || src.size.height > dst.size.height {
            return Err(RenderError::BlitPass("blit destination is too small"));
        }
        for y in 0..src.size.height {
            for x in 0..src.size.width {
                if let (Some(s), Some(d)) = (
                    src.index(i64::from(x), i64::from(y)),
                    dst.index(i64::from(x), i64::from(y)),
                ) {
                    dst.pixels[d] = src.pixels[s];
                }
            }
        }
        Ok(())
    }

    fn submit(&mut self, buffer: CommandBufferId) -> Result<()> {
        let Some(slot) = self.buffers.iter().position(|b| *b == buffer) else {
            return Err(RenderError::Submit);
        };
        if self.passes.values().any(|p| p.buffer == buffer) {
            log::warn!("submitting {buffer:?} with a render pass still open");
            return Err(RenderError::Submit);
        }
        self.buffers.swap_remove(slot);
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureId) {
        if self.surfaces.remove(&texture).is_none() {
            log::warn!("released unknown texture {texture:?}");
        }
    }
}
