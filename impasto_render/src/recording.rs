// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A renderer that only records what it is asked to do.

use impasto_core::error::{RenderError, Result};
use impasto_core::renderer::{
    Capabilities, CommandBufferId, DrawCommand, LoadAction, RenderPassId, RenderTarget, Renderer,
    TextureDescriptor, TextureId, TextureSize,
};

/// One call made on a [`RecordingRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A texture was allocated.
    CreateTexture {
        /// Assigned id.
        texture: TextureId,
        /// Label passed by the caller.
        label: &'static str,
        /// Requested size.
        size: TextureSize,
    },
    /// A command buffer was opened.
    CreateCommandBuffer(CommandBufferId),
    /// A render pass began.
    BeginRenderPass {
        /// Owning command buffer.
        buffer: CommandBufferId,
        /// Assigned pass id.
        pass: RenderPassId,
        /// Texture drawn into.
        target: TextureId,
        /// Whether the target was cleared or loaded.
        load: LoadAction,
    },
    /// A draw was recorded.
    Draw {
        /// Pass the draw belongs to.
        pass: RenderPassId,
        /// The draw itself.
        command: DrawCommand,
    },
    /// A render pass ended.
    EndRenderPass(RenderPassId),
    /// A texture was copied.
    Blit {
        /// Owning command buffer.
        buffer: CommandBufferId,
        /// Copied from.
        source: TextureId,
        /// Copied into.
        destination: TextureId,
    },
    /// A command buffer was submitted.
    Submit(CommandBufferId),
    /// A texture was handed back.
    ReleaseTexture(TextureId),
}

/// Renderer entry points, for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Renderer::create_texture`].
    CreateTexture,
    /// [`Renderer::create_command_buffer`].
    CreateCommandBuffer,
    /// [`Renderer::begin_render_pass`].
    BeginRenderPass,
    /// [`Renderer::record`].
    Record,
    /// [`Renderer::end_render_pass`].
    EndRenderPass,
    /// [`Renderer::blit`].
    Blit,
    /// [`Renderer::submit`].
    Submit,
}

impl Operation {
    fn error(self) -> RenderError {
        match self {
            Self::CreateTexture => RenderError::TextureAllocation {
                label: "injected",
                width: 0,
                height: 0,
            },
            Self::CreateCommandBuffer => RenderError::CommandBuffer,
            Self::BeginRenderPass => RenderError::RenderPass("injected failure"),
            Self::Record => RenderError::Pipeline("injected failure"),
            Self::EndRenderPass => RenderError::RenderPass("injected failure"),
            Self::Blit => RenderError::BlitPass("injected failure"),
            Self::Submit => RenderError::Submit,
        }
    }
}

/// Logs every renderer call and hands out sequential ids.
///
/// Useful for asserting on the exact command stream the pass walk produces,
/// and for making a chosen call fail.
#[derive(Clone, Debug)]
pub struct RecordingRenderer {
    capabilities: Capabilities,
    events: Vec<RecordedEvent>,
    next_id: u32,
    calls: Vec<(Operation, usize)>,
    failure: Option<(Operation, usize)>,
}

impl RecordingRenderer {
    /// Creates a recorder reporting `capabilities`.
    #[must_use]
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            events: Vec::new(),
            next_id: 0,
            calls: Vec::new(),
            failure: None,
        }
    }

    /// Makes the `nth` (zero-based) call to `operation` fail.
    #[must_use]
    pub fn failing_at(mut self, operation: Operation, nth: usize) -> Self {
        self.failure = Some((operation, nth));
        self
    }

    /// Allocates an onscreen target that is not recorded as a texture
    /// creation.
    pub fn onscreen_target(&mut self, size: TextureSize) -> RenderTarget {
        RenderTarget::onscreen(TextureId(self.next()), size)
    }

    /// Everything recorded so far, in call order.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Recorded draws, in call order.
    pub fn draws(&self) -> impl Iterator<Item = &DrawCommand> {
        self.events.iter().filter_map(|e| match e {
            RecordedEvent::Draw { command, .. } => Some(command),
            _ => None,
        })
    }

    /// Labels of every texture created, in call order.
    #[must_use]
    pub fn texture_labels(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::CreateTexture { label, .. } => Some(*label),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded events, keeping the id counter and failure plan.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn call(&mut self, operation: Operation) -> Result<()> {
        let slot = match self.calls.iter().position(|(op, _)| *op == operation) {
            Some(slot) => slot,
            None => {
                self.calls.push((operation, 0));
                self.calls.len() - 1
            }
        };
        let nth = self.calls[slot].1;
        self.calls[slot].1 += 1;
        if self.failure == Some((operation, nth)) {
            log::debug!("injecting failure into {operation:?} call {nth}");
            return Err(operation.error());
        }
        Ok(())
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new(Capabilities::default())
    }
}

impl Renderer for RecordingRenderer {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureId> {
        self.call(Operation::CreateTexture)?;
        let texture = TextureId(self.next());
        self.events.push(RecordedEvent::CreateTexture {
            texture,
            label: desc.label,
            size: desc.size,
        });
        Ok(texture)
    }

    fn create_command_buffer(&mut self) -> Result<CommandBufferId> {
        self.call(Operation::CreateCommandBuffer)?;
        let buffer = CommandBufferId(self.next());
        self.events.push(RecordedEvent::CreateCommandBuffer(buffer));
        Ok(buffer)
    }

    fn begin_render_pass(
        &mut self,
        buffer: CommandBufferId,
        target: &RenderTarget,
        load: LoadAction,
    ) -> Result<RenderPassId> {
        self.call(Operation::BeginRenderPass)?;
        let pass = RenderPassId(self.next());
        self.events.push(RecordedEvent::BeginRenderPass {
            buffer,
            pass,
            target: target.texture,
            load,
        });
        Ok(pass)
    }

    fn record(&mut self, pass: RenderPassId, command: DrawCommand) -> Result<()> {
        self.call(Operation::Record)?;
        self.events.push(RecordedEvent::Draw { pass, command });
        Ok(())
    }

    fn end_render_pass(&mut self, pass: RenderPassId) -> Result<()> {
        self.call(Operation::EndRenderPass)?;
        self.events.push(RecordedEvent::EndRenderPass(pass));
        Ok(())
    }

    fn blit(
        &mut self,
        buffer: CommandBufferId,
        source: TextureId,
        destination: TextureId,
    ) -> Result<()> {
        self.call(Operation::Blit)?;
        self.events.push(RecordedEvent::Blit {
            buffer,
            source,
            destination,
        });
        Ok(())
    }

    fn submit(&mut self, buffer: CommandBufferId) -> Result<()> {
        self.call(Operation::Submit)?;
        self.events.push(RecordedEvent::Submit(buffer));
        Ok(())
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.events.push(RecordedEvent::ReleaseTexture(texture));
    }
}
