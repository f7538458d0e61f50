// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render walk.
//!
//! Coverage and clips are tracked in the space of the render target being
//! drawn into. Every target carries its own clip stack: a list of
//! `(coverage, depth)` levels whose bottom entry is the whole target at the
//! target's stencil floor. Stencil references recorded into a target are
//! relative to that floor.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use kurbo::{Affine, Rect};

use super::id::PassId;
use super::store::{Element, PassStore};
use crate::blend::BlendMode;
use crate::contents::{ActivePass, ContentContext, FilterInput, FilterNode, StencilCoverageKind};
use crate::entity::Entity;
use crate::error::{RenderError, Result};
use crate::geometry;
use crate::renderer::{
    CommandBufferId, DrawCommand, LoadAction, Pipeline, RenderTarget, Renderer, StencilOp,
    TextureSize,
};
use crate::trace::{
    EntityCulledEvent, FrameSummaryBuilder, PassBeginEvent, PassEndEvent, StencilChangeEvent,
    SubpassDecision, SubpassEvent, Tracer,
};

/// What a sub-pass resolves to when its parent reaches it.
#[derive(Debug)]
pub enum EntityResult {
    /// An entity that draws the sub-pass into the parent target.
    Success(Entity),
    /// Nothing left to draw: culled, elided, or already drawn inline.
    Empty,
    /// Rendering failed; the frame must be abandoned.
    Failure(RenderError),
}

impl From<Result<Option<Entity>>> for EntityResult {
    fn from(result: Result<Option<Entity>>) -> Self {
        match result {
            Ok(Some(entity)) => Self::Success(entity),
            Ok(None) => Self::Empty,
            Err(err) => Self::Failure(err),
        }
    }
}

/// A render pass on one target that is opened on demand.
///
/// The first pass clears the target; passes reopened after
/// [`end_pass`](Self::end_pass) load what is already there.
#[derive(Debug)]
struct InlinePassContext {
    target: RenderTarget,
    buffer: Option<CommandBufferId>,
    pass: Option<ActivePass>,
    load: LoadAction,
}

impl InlinePassContext {
    fn new(target: RenderTarget) -> Self {
        Self {
            target,
            buffer: None,
            pass: None,
            load: LoadAction::Clear,
        }
    }

    fn render_pass(&mut self, ctx: &mut ContentContext<'_>) -> Result<ActivePass> {
        if let Some(pass) = self.pass {
            return Ok(pass);
        }
        let buffer = ctx.renderer.create_command_buffer()?;
        let id = ctx
            .renderer
            .begin_render_pass(buffer, &self.target, self.load)?;
        self.load = LoadAction::Load;
        let pass = ActivePass {
            id,
            target: self.target,
        };
        self.buffer = Some(buffer);
        self.pass = Some(pass);
        Ok(pass)
    }

    fn end_pass(&mut self, ctx: &mut ContentContext<'_>) -> Result<()> {
        let (Some(pass), Some(buffer)) = (self.pass.take(), self.buffer.take()) else {
            return Ok(());
        };
        ctx.renderer.end_render_pass(pass.id)?;
        ctx.renderer.submit(buffer)
    }
}

#[derive(Clone, Copy, Debug)]
struct StencilLevel {
    coverage: Option<Rect>,
    depth: u32,
}

/// Everything tied to one render target during the walk.
#[derive(Debug)]
struct TargetState {
    pass_ctx: InlinePassContext,
    stencil: Vec<StencilLevel>,
    floor: u32,
}

impl TargetState {
    fn new(target: RenderTarget, floor: u32) -> Self {
        Self {
            pass_ctx: InlinePassContext::new(target),
            stencil: vec![StencilLevel {
                coverage: Some(target.rect()),
                depth: floor,
            }],
            floor,
        }
    }

    fn clip_coverage(&self) -> Option<Rect> {
        self.stencil.last().and_then(|level| level.coverage)
    }

    fn stencil_height(&self) -> u32 {
        u32::try_from(self.stencil.len()).unwrap_or(u32::MAX)
    }
}

struct Walker<'a, 't> {
    store: &'a PassStore,
    ctx: ContentContext<'a>,
    tracer: &'a mut Tracer<'t>,
    summary: FrameSummaryBuilder,
}

impl PassStore {
    /// Renders the tree rooted at `root` into `target`.
    ///
    /// Any renderer failure aborts the frame and is returned; culled
    /// content is not an error. Every intermediate texture is released
    /// before returning, whether or not the frame succeeded.
    ///
    /// # Panics
    ///
    /// Panics if `root` is stale.
    pub fn render(
        &self,
        root: PassId,
        renderer: &mut dyn Renderer,
        target: &RenderTarget,
    ) -> Result<()> {
        self.render_with_tracer(root, renderer, target, &mut Tracer::none())
    }

    /// Like [`render`](Self::render), reporting walk events to `tracer`.
    pub fn render_with_tracer(
        &self,
        root: PassId,
        renderer: &mut dyn Renderer,
        target: &RenderTarget,
        tracer: &mut Tracer<'_>,
    ) -> Result<()> {
        self.validate(root);
        let mut walker = Walker {
            store: self,
            ctx: ContentContext::new(renderer, &self.glyph_atlas[root.idx as usize]),
            tracer,
            summary: FrameSummaryBuilder::new(),
        };
        let result = walker.render_root(root, target);
        walker.ctx.release_transients();
        if let Err(err) = &result {
            log::warn!("frame aborted: {err}");
        }
        let summary = walker.summary.finish(result.is_ok());
        walker.tracer.frame_summary(&summary);
        result
    }
}

impl Walker<'_, '_> {
    fn render_root(&mut self, root: PassId, target: &RenderTarget) -> Result<()> {
        let caps = self.ctx.capabilities;
        let needs_copy = target.onscreen
            && !caps.supports_read_from_onscreen
            && self.store.reads_from_target(root.idx, caps);
        if !needs_copy {
            return self.render_into(root, *target);
        }

        log::debug!("rendering {root:?} offscreen: the onscreen target cannot be sampled");
        let offscreen = self.ctx.create_target("Root Offscreen", target.size)?;
        self.render_into(root, offscreen)?;
        let buffer = self.ctx.renderer.create_command_buffer()?;
        self.ctx
            .renderer
            .blit(buffer, offscreen.texture, target.texture)?;
        self.ctx.renderer.submit(buffer)
    }

    fn render_into(&mut self, root: PassId, target: RenderTarget) -> Result<()> {
        let r = root.idx as usize;
        let mut state = TargetState::new(target, self.store.stencil_depth[r]);
        state.pass_ctx.render_pass(&mut self.ctx)?;
        self.on_render(root, &mut state, self.store.transformation[r], 0)?;
        state.pass_ctx.end_pass(&mut self.ctx)
    }

    /// Renders the elements of `pass` into the current target.
    ///
    /// `to_target` maps pass-local space into target pixels.
    fn on_render(
        &mut self,
        pass: PassId,
        state: &mut TargetState,
        to_target: Affine,
        depth: u32,
    ) -> Result<()> {
        let store = self.store;
        let elements = &store.elements[pass.idx as usize];
        self.summary.pass();
        self.tracer.pass_begin(&PassBeginEvent {
            pass,
            depth,
            target: state.pass_ctx.target.size,
            element_count: u32::try_from(elements.len()).unwrap_or(u32::MAX),
        });

        let mut drawn = 0;
        let mut culled = 0;
        for (index, element) in elements.iter().enumerate() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            let entity = match element {
                Element::Entity(entity) => {
                    let mut entity = entity.clone();
                    entity.transformation = to_target * entity.transformation;
                    entity
                }
                Element::Subpass(sub) => {
                    match self.element_entity(*sub, state, to_target, depth + 1) {
                        EntityResult::Success(entity) => entity,
                        EntityResult::Empty => continue,
                        EntityResult::Failure(err) => return Err(err),
                    }
                }
            };
            if self.render_element(entity, state, pass, index)? {
                drawn += 1;
            } else {
                culled += 1;
            }
        }

        self.tracer.pass_end(&PassEndEvent {
            pass,
            depth,
            entities_drawn: drawn,
            entities_culled: culled,
        });
        Ok(())
    }

    /// Applies the entity's clip-stack effect and draws it.
    ///
    /// Returns `false` if the entity was culled by the clip test.
    fn render_element(
        &mut self,
        mut entity: Entity,
        state: &mut TargetState,
        pass: PassId,
        index: u32,
    ) -> Result<bool> {
        let current = state.clip_coverage();
        if !entity.should_render(current) {
            self.summary.entity_culled();
            self.tracer.entity_culled(&EntityCulledEvent {
                pass,
                element_index: index,
            });
            return Ok(false);
        }

        let stencil = entity.stencil_coverage(current);
        match stencil.kind {
            StencilCoverageKind::NoChange => {}
            StencilCoverageKind::Append => {
                state.stencil.push(StencilLevel {
                    coverage: stencil.coverage,
                    depth: entity.stencil_depth + 1,
                });
                self.stencil_changed(pass, stencil.kind, state);
                if current.is_none() {
                    // Everything is already clipped away.
                    return Ok(true);
                }
            }
            StencilCoverageKind::Restore => {
                let top = state.stencil.last().map_or(state.floor, |level| level.depth);
                if top <= entity.stencil_depth {
                    return Ok(true);
                }
                let keep = entity.stencil_depth.saturating_sub(state.floor) as usize + 1;
                // Only the area of the level being popped needs restoring.
                let restore_coverage = state.stencil.get(keep).and_then(|level| level.coverage);
                state.stencil.truncate(keep);
                self.stencil_changed(pass, stencil.kind, state);
                if state.clip_coverage().is_none() {
                    return Ok(true);
                }
                if let Some(contents) = entity
                    .contents
                    .as_ref()
                    .and_then(|c| c.with_restore_coverage(restore_coverage))
                {
                    entity.contents = Some(contents);
                }
            }
        }

        entity.stencil_depth = entity.stencil_depth.saturating_sub(state.floor);
        if entity.blend_mode.is_advanced() && !self.ctx.capabilities.supports_framebuffer_fetch {
            let target = state.pass_ctx.target.rect();
            let limit = current
                .and_then(|clip| geometry::intersection(clip, target))
                .unwrap_or(target);
            self.render_advanced_blend(&entity, &mut state.pass_ctx, limit)?;
        } else {
            let render_pass = state.pass_ctx.render_pass(&mut self.ctx)?;
            entity.render(&mut self.ctx, &render_pass)?;
        }
        self.summary.entity_drawn();
        Ok(true)
    }

    /// Draws an advanced blend by sampling a copy of the target.
    fn render_advanced_blend(
        &mut self,
        entity: &Entity,
        pass_ctx: &mut InlinePassContext,
        limit: Rect,
    ) -> Result<()> {
        let Some(contents) = entity.contents.as_ref() else {
            return Ok(());
        };
        let Some(source) = contents.render_to_snapshot(&mut self.ctx, entity, limit)? else {
            return Ok(());
        };

        let target = pass_ctx.target;
        pass_ctx.end_pass(&mut self.ctx)?;
        let backdrop = self
            .ctx
            .create_target("Advanced Blend Backdrop", target.size)?;
        let buffer = self.ctx.renderer.create_command_buffer()?;
        self.ctx
            .renderer
            .blit(buffer, target.texture, backdrop.texture)?;
        self.ctx.renderer.submit(buffer)?;

        let render_pass = pass_ctx.render_pass(&mut self.ctx)?;
        self.ctx.record(
            &render_pass,
            DrawCommand {
                label: "Advanced Blend",
                pipeline: Pipeline::Blend {
                    source: source.texture,
                    source_rect: source.texel_rect(),
                    backdrop: backdrop.texture,
                    backdrop_rect: source.rect,
                    mode: entity.blend_mode,
                },
                transform: Affine::IDENTITY,
                bounds: source.rect,
                blend_mode: BlendMode::Source,
                stencil_reference: entity.stencil_depth,
                stencil: StencilOp::Keep,
            },
        )
    }

    fn element_entity(
        &mut self,
        sub: PassId,
        state: &mut TargetState,
        to_target: Affine,
        depth: u32,
    ) -> EntityResult {
        self.resolve_subpass(sub, state, to_target, depth).into()
    }

    fn resolve_subpass(
        &mut self,
        sub: PassId,
        state: &mut TargetState,
        to_target: Affine,
        depth: u32,
    ) -> Result<Option<Entity>> {
        let store = self.store;
        let s = sub.idx as usize;
        let delegate = &store.delegate[s];
        let blend_mode = store.blend_mode[s];
        let stencil_depth = store.stencil_depth[s];
        debug_assert!(
            stencil_depth >= state.floor,
            "subpass stencil depth {stencil_depth} is below its target's floor {}",
            state.floor
        );

        if blend_mode == BlendMode::Destination || delegate.can_elide() {
            self.decide(sub, depth, SubpassDecision::Elided, None);
            return Ok(None);
        }

        let target_rect = state.pass_ctx.target.rect();
        let effect = to_target * store.transformation[s];
        let Some(coverage) = state
            .clip_coverage()
            .and_then(|clip| geometry::intersection(clip, target_rect))
            .and_then(|limit| store.subpass_coverage_at(sub.idx, effect, limit))
            .filter(|c| !geometry::is_empty(*c))
        else {
            self.decide(sub, depth, SubpassDecision::Culled, None);
            return Ok(None);
        };

        let image_filter = delegate.image_filter();
        let backdrop = store.backdrop_filter[s].as_ref();
        let collapsible = delegate.can_collapse_into_parent_pass()
            && backdrop.is_none()
            && image_filter.is_none()
            && store.bounds_limit[s].is_none()
            && blend_mode == BlendMode::SourceOver
            && store.elements[s].iter().all(|el| match el {
                Element::Entity(e) => e.blend_mode == BlendMode::SourceOver,
                Element::Subpass(_) => true,
            });
        if collapsible {
            self.decide(sub, depth, SubpassDecision::Collapsed, Some(coverage));
            self.on_render(sub, state, effect, depth)?;
            return Ok(None);
        }

        let bounds = geometry::round_out(coverage);
        let Some(size) = TextureSize::from_rect(bounds) else {
            self.decide(sub, depth, SubpassDecision::Culled, Some(coverage));
            return Ok(None);
        };
        let to_subpass = Affine::translate(-bounds.origin().to_vec2());

        let backdrop_contents = match backdrop {
            Some(make_backdrop) => {
                // The parent's pixels so far become the filter input.
                state.pass_ctx.end_pass(&mut self.ctx)?;
                let parent = state.pass_ctx.target;
                let input = FilterInput::Texture {
                    texture: parent.texture,
                    source_rect: parent.rect(),
                    destination: parent.rect(),
                };
                Some(make_backdrop(input, to_subpass * effect))
            }
            None => None,
        };

        self.decide(sub, depth, SubpassDecision::Offscreen, Some(coverage));
        let target = self.ctx.create_target("Subpass", size)?;
        let mut sub_state = TargetState::new(target, stencil_depth);
        sub_state.pass_ctx.render_pass(&mut self.ctx)?;
        if let Some(contents) = backdrop_contents {
            let entity = Entity {
                transformation: to_subpass,
                contents: Some(contents),
                stencil_depth,
                blend_mode: BlendMode::Source,
            };
            self.render_element(entity, &mut sub_state, sub, u32::MAX)?;
        }
        self.on_render(sub, &mut sub_state, to_subpass * effect, depth)?;
        sub_state.pass_ctx.end_pass(&mut self.ctx)?;

        let mut contents =
            delegate.create_contents_for_subpass_target(target.texture, size, bounds);
        if let Some(filter) = image_filter {
            contents = Rc::new(FilterNode::new(filter, FilterInput::Contents(contents), effect));
        }
        Ok(Some(Entity {
            transformation: Affine::IDENTITY,
            contents: Some(contents),
            stencil_depth,
            blend_mode,
        }))
    }

    fn decide(
        &mut self,
        pass: PassId,
        depth: u32,
        decision: SubpassDecision,
        coverage: Option<Rect>,
    ) {
        if matches!(decision, SubpassDecision::Culled | SubpassDecision::Elided) {
            log::debug!("subpass {pass:?} {}", decision.name());
        }
        self.summary.subpass(decision);
        self.tracer.subpass(&SubpassEvent {
            pass,
            depth,
            decision,
            coverage,
        });
    }

    fn stencil_changed(&mut self, pass: PassId, kind: StencilCoverageKind, state: &TargetState) {
        self.tracer.stencil_change(&StencilChangeEvent {
            pass,
            kind,
            stack_height: state.stencil_height(),
            coverage: state.clip_coverage(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::contents::{
        BlurFilter, ClipContents, ClipOp, ClipRestoreContents, Geometry, SolidColorContents,
        backdrop_filter,
    };
    use crate::pass::PaintPassDelegate;
    use crate::renderer::{Capabilities, RenderPassId, TextureDescriptor, TextureId};

    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Texture(TextureId, TextureSize),
        Begin(TextureId, LoadAction),
        Draw(DrawCommand),
        End,
        Blit(TextureId, TextureId),
        Submit,
    }

    #[derive(Debug)]
    struct LogRenderer {
        caps: Capabilities,
        events: Vec<Event>,
        targets: Vec<TextureId>,
        released: Vec<TextureId>,
        next: u32,
        fail_on_draw: Option<usize>,
    }

    impl LogRenderer {
        fn new(caps: Capabilities) -> Self {
            Self {
                caps,
                events: Vec::new(),
                targets: Vec::new(),
                released: Vec::new(),
                next: 100,
                fail_on_draw: None,
            }
        }

        fn draws(&self) -> Vec<&DrawCommand> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Draw(cmd) => Some(cmd),
                    _ => None,
                })
                .collect()
        }

        fn labels(&self) -> Vec<&'static str> {
            self.draws().iter().map(|cmd| cmd.label).collect()
        }

        fn textures(&self) -> Vec<TextureSize> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    Event::Texture(_, size) => Some(*size),
                    _ => None,
                })
                .collect()
        }
    }

    impl Renderer for LogRenderer {
        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId> {
            self.next += 1;
            let id = TextureId(self.next);
            self.events.push(Event::Texture(id, desc.size));
            Ok(id)
        }

        fn create_command_buffer(&mut self) -> Result<CommandBufferId> {
            self.next += 1;
            Ok(CommandBufferId(self.next))
        }

        fn begin_render_pass(
            &mut self,
            _buffer: CommandBufferId,
            target: &RenderTarget,
            load: LoadAction,
        ) -> Result<RenderPassId> {
            self.next += 1;
            self.targets.push(target.texture);
            self.events.push(Event::Begin(target.texture, load));
            Ok(RenderPassId(self.next))
        }

        fn record(&mut self, _pass: RenderPassId, command: DrawCommand) -> Result<()> {
            if self.fail_on_draw == Some(self.draws().len()) {
                return Err(RenderError::Pipeline("injected"));
            }
            self.events.push(Event::Draw(command));
            Ok(())
        }

        fn end_render_pass(&mut self, _pass: RenderPassId) -> Result<()> {
            self.events.push(Event::End);
            Ok(())
        }

        fn blit(
            &mut self,
            _buffer: CommandBufferId,
            source: TextureId,
            destination: TextureId,
        ) -> Result<()> {
            self.events.push(Event::Blit(source, destination));
            Ok(())
        }

        fn submit(&mut self, _buffer: CommandBufferId) -> Result<()> {
            self.events.push(Event::Submit);
            Ok(())
        }

        fn release_texture(&mut self, texture: TextureId) {
            self.released.push(texture);
        }
    }

    fn created(renderer: &LogRenderer) -> Vec<TextureId> {
        renderer
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Texture(id, _) => Some(*id),
                _ => None,
            })
            .collect()
    }

    const ONSCREEN: TextureId = TextureId(1);

    fn screen() -> RenderTarget {
        RenderTarget::onscreen(ONSCREEN, TextureSize::new(100, 100))
    }

    fn solid(rect: Rect, color: Color) -> Entity {
        Entity::new(Rc::new(SolidColorContents::rect(rect, color)))
    }

    #[test]
    fn entities_render_in_order_into_one_pass() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        store.add_entity(root, solid(Rect::new(5.0, 5.0, 20.0, 20.0), Color::GREEN));

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();

        assert_eq!(
            renderer.events.first(),
            Some(&Event::Begin(ONSCREEN, LoadAction::Clear))
        );
        let colors: Vec<_> = renderer
            .draws()
            .iter()
            .map(|cmd| cmd.pipeline.clone())
            .collect();
        assert_eq!(colors, vec![Pipeline::Solid(Color::RED), Pipeline::Solid(Color::GREEN)]);
        assert_eq!(&renderer.events[renderer.events.len() - 2..], &[Event::End, Event::Submit]);
    }

    #[test]
    fn failure_stops_the_walk() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        for _ in 0..3 {
            store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        }
        let mut renderer = LogRenderer::new(Capabilities::desktop());
        renderer.fail_on_draw = Some(1);
        let err = store.render(root, &mut renderer, &screen()).unwrap_err();
        assert_eq!(err, RenderError::Pipeline("injected"));
        assert_eq!(renderer.draws().len(), 1);
    }

    #[test]
    fn offscreen_entities_are_culled() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(root, solid(Rect::new(200.0, 200.0, 210.0, 210.0), Color::RED));
        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert!(renderer.draws().is_empty());
    }

    #[test]
    fn simple_subpass_collapses_into_parent() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        store.set_transformation(sub, Affine::translate((30.0, 40.0)));
        store.add_subpass(root, sub);

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert!(renderer.textures().is_empty());
        let draws = renderer.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].transform, Affine::translate((30.0, 40.0)));
    }

    #[test]
    fn opacity_layer_renders_offscreen() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(10.5, 10.0, 20.0, 30.0), Color::RED));
        store.set_delegate(sub, Rc::new(PaintPassDelegate::new(0.5)));
        store.add_subpass(root, sub);

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert_eq!(renderer.textures(), vec![TextureSize::new(10, 20)]);

        let draws = renderer.draws();
        assert_eq!(draws.len(), 2);
        // Drawn into the layer texture, shifted to its origin.
        assert_eq!(draws[0].transform, Affine::translate((-10.0, -10.0)));
        assert_eq!(draws[1].label, "Texture Fill");
        assert_eq!(draws[1].bounds, Rect::new(10.0, 10.0, 20.0, 30.0));
        assert!(matches!(draws[1].pipeline, Pipeline::Texture { opacity, .. } if opacity == 0.5));
    }

    #[test]
    fn layer_textures_are_released_after_the_frame() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        store.set_delegate(sub, Rc::new(PaintPassDelegate::new(0.5)));
        store.add_subpass(root, sub);
        store.add_entity(
            root,
            solid(Rect::new(0.0, 0.0, 5.0, 5.0), Color::BLUE).with_blend_mode(BlendMode::Screen),
        );

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        // Layer, blend snapshot, and backdrop copy.
        assert_eq!(created(&renderer).len(), 3);
        assert_eq!(renderer.released, created(&renderer));
        assert!(!renderer.released.contains(&ONSCREEN));
    }

    #[test]
    fn textures_are_released_when_the_frame_fails() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        store.set_delegate(sub, Rc::new(PaintPassDelegate::new(0.5)));
        store.add_subpass(root, sub);

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        // The layer's own fill succeeds, compositing it fails.
        renderer.fail_on_draw = Some(1);
        store.render(root, &mut renderer, &screen()).unwrap_err();
        assert_eq!(created(&renderer).len(), 1);
        assert_eq!(renderer.released, created(&renderer));
    }

    #[test]
    fn transparent_layer_is_elided() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
        store.set_delegate(sub, Rc::new(PaintPassDelegate::new(0.0)));
        store.add_subpass(root, sub);

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert!(renderer.draws().is_empty());
        assert!(renderer.textures().is_empty());
    }

    #[test]
    fn clip_and_restore_use_relative_stencil_references() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(
            root,
            Entity::new(Rc::new(ClipContents::new(
                Geometry::Rect(Rect::new(0.0, 0.0, 50.0, 50.0)),
                ClipOp::Intersect,
            ))),
        );
        store.add_entity(
            root,
            solid(Rect::new(10.0, 10.0, 90.0, 90.0), Color::RED).with_stencil_depth(1),
        );
        store.add_entity(root, Entity::new(Rc::new(ClipRestoreContents::new())));
        store.add_entity(root, solid(Rect::new(60.0, 60.0, 90.0, 90.0), Color::BLUE));

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        let draws = renderer.draws();
        let summary: Vec<_> = draws
            .iter()
            .map(|cmd| (cmd.label, cmd.stencil_reference, cmd.stencil))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Intersect Clip", 0, StencilOp::IncrementWhereEqual),
                ("Solid Fill", 1, StencilOp::Keep),
                ("Restore Clip", 0, StencilOp::RestoreWhereGreater),
                ("Solid Fill", 0, StencilOp::Keep),
            ]
        );
        // Only the clipped area needs restoring.
        assert_eq!(draws[2].bounds, Rect::new(0.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn content_outside_the_clip_is_culled() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(
            root,
            Entity::new(Rc::new(ClipContents::new(
                Geometry::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
                ClipOp::Intersect,
            ))),
        );
        store.add_entity(
            root,
            solid(Rect::new(50.0, 50.0, 60.0, 60.0), Color::RED).with_stencil_depth(1),
        );
        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert_eq!(renderer.labels(), vec!["Intersect Clip"]);
    }

    #[test]
    fn advanced_blend_without_fetch_reads_back_target() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 50.0, 50.0), Color::BLUE));
        store.add_entity(
            root,
            solid(Rect::new(10.0, 10.0, 20.0, 20.0), Color::RED)
                .with_blend_mode(BlendMode::Multiply),
        );

        let mut renderer = LogRenderer::new(Capabilities::desktop());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert!(renderer.events.iter().any(|e| matches!(e, Event::Blit(ONSCREEN, _))));
        let draws = renderer.draws();
        let blend = draws.last().expect("blend draw recorded");
        assert_eq!(blend.label, "Advanced Blend");
        assert_eq!(blend.blend_mode, BlendMode::Source);
        assert_eq!(blend.bounds, Rect::new(10.0, 10.0, 20.0, 20.0));
        assert!(matches!(blend.pipeline, Pipeline::Blend { mode: BlendMode::Multiply, .. }));
    }

    #[test]
    fn advanced_blend_with_fetch_draws_directly() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(
            root,
            solid(Rect::new(10.0, 10.0, 20.0, 20.0), Color::RED).with_blend_mode(BlendMode::Screen),
        );
        let mut renderer = LogRenderer::new(Capabilities::unrestricted());
        store.render(root, &mut renderer, &screen()).unwrap();
        assert!(!renderer.events.iter().any(|e| matches!(e, Event::Blit(..))));
        assert_eq!(renderer.draws()[0].blend_mode, BlendMode::Screen);
    }

    #[test]
    fn backdrop_on_unreadable_screen_renders_offscreen_then_blits() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 100.0, 100.0), Color::BLUE));
        let sub = store.create_pass();
        store.set_backdrop_filter(sub, Some(backdrop_filter(Rc::new(BlurFilter::new(3.0)))));
        store.add_subpass(root, sub);

        let mut renderer = LogRenderer::new(Capabilities::mobile());
        store.render(root, &mut renderer, &screen()).unwrap();
        // Nothing draws into the screen directly.
        assert!(!renderer.targets.contains(&ONSCREEN));
        assert!(matches!(
            renderer.events.iter().rev().nth(1),
            Some(Event::Blit(_, ONSCREEN))
        ));
    }

    #[test]
    fn oversized_layer_fails_the_frame() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 80.0, 80.0), Color::RED));
        store.set_delegate(sub, Rc::new(PaintPassDelegate::new(0.5)));
        store.add_subpass(root, sub);
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::GREEN));

        let mut caps = Capabilities::desktop();
        caps.max_texture_size = 64;
        let mut renderer = LogRenderer::new(caps);
        let err = store.render(root, &mut renderer, &screen()).unwrap_err();
        assert!(matches!(err, RenderError::TextureAllocation { width: 80, .. }));
        assert!(renderer.draws().is_empty());
    }

    #[test]
    fn entity_result_from_result() {
        assert!(matches!(EntityResult::from(Ok(None)), EntityResult::Empty));
        assert!(matches!(
            EntityResult::from(Ok(Some(Entity::default()))),
            EntityResult::Success(_)
        ));
        assert!(matches!(
            EntityResult::from(Err(RenderError::Submit)),
            EntityResult::Failure(RenderError::Submit)
        ));
    }
}
