// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the pass walk.
//!
//! [`TraceSink`] has one method per event, each defaulting to a no-op, so a
//! sink only implements the events it cares about.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. With the `trace` feature
//! **off** every `Tracer` method compiles to nothing. With it **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] tallies what the walk did and produces a
//! [`FrameSummary`] when the frame ends.

use kurbo::Rect;

use crate::contents::StencilCoverageKind;
use crate::pass::PassId;
use crate::renderer::TextureSize;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a sub-pass was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubpassDecision {
    /// Drawn straight into the parent's render pass.
    Collapsed,
    /// Rendered into its own texture and composited.
    Offscreen,
    /// Coverage was empty or clipped away.
    Culled,
    /// Skipped because it cannot change any pixel.
    Elided,
}

impl SubpassDecision {
    /// Short lowercase name, for text output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Collapsed => "collapsed",
            Self::Offscreen => "offscreen",
            Self::Culled => "culled",
            Self::Elided => "elided",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the walker starts rendering a pass into a target.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// The pass.
    pub pass: PassId,
    /// Nesting level; the root is 0.
    pub depth: u32,
    /// Size of the render target the pass draws into.
    pub target: TextureSize,
    /// Number of direct elements.
    pub element_count: u32,
}

/// Emitted when the walker finishes a pass.
#[derive(Clone, Copy, Debug)]
pub struct PassEndEvent {
    /// The pass.
    pub pass: PassId,
    /// Nesting level; the root is 0.
    pub depth: u32,
    /// Entities drawn directly by this pass.
    pub entities_drawn: u32,
    /// Entities skipped by the clip test.
    pub entities_culled: u32,
}

/// Emitted once a sub-pass has been resolved.
#[derive(Clone, Copy, Debug)]
pub struct SubpassEvent {
    /// The sub-pass.
    pub pass: PassId,
    /// Nesting level of the sub-pass.
    pub depth: u32,
    /// What the walker did with it.
    pub decision: SubpassDecision,
    /// Coverage in the parent target, when computed.
    pub coverage: Option<Rect>,
}

/// Emitted when an entity is skipped because it is outside the clip.
#[derive(Clone, Copy, Debug)]
pub struct EntityCulledEvent {
    /// Owning pass.
    pub pass: PassId,
    /// Index of the entity within the pass's elements.
    pub element_index: u32,
}

/// Emitted when an entity changes the clip stack.
#[derive(Clone, Copy, Debug)]
pub struct StencilChangeEvent {
    /// Owning pass.
    pub pass: PassId,
    /// Append or restore.
    pub kind: StencilCoverageKind,
    /// Clip stack height after the change.
    pub stack_height: u32,
    /// Coverage of the new top of the stack.
    pub coverage: Option<Rect>,
}

/// Per-frame tally produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Passes walked, including collapsed ones.
    pub passes: u32,
    /// Offscreen textures allocated for sub-passes.
    pub offscreen_targets: u32,
    /// Sub-passes drawn inline.
    pub collapsed: u32,
    /// Sub-passes culled by coverage.
    pub culled_subpasses: u32,
    /// Sub-passes elided.
    pub elided_subpasses: u32,
    /// Entities recorded.
    pub entities_drawn: u32,
    /// Entities culled by the clip test.
    pub entities_culled: u32,
    /// Whether the frame finished without error.
    pub succeeded: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the pass walk.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a pass starts rendering.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called when a pass finishes rendering.
    fn on_pass_end(&mut self, e: &PassEndEvent) {
        _ = e;
    }

    /// Called when a sub-pass has been resolved.
    fn on_subpass(&mut self, e: &SubpassEvent) {
        _ = e;
    }

    /// Called when an entity is culled by the clip test.
    fn on_entity_culled(&mut self, e: &EntityCulledEvent) {
        _ = e;
    }

    /// Called when the clip stack changes.
    fn on_stencil_change(&mut self, e: &StencilChangeEvent) {
        _ = e;
    }

    /// Called once per frame with the summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

/// Expands to one `Tracer` method forwarding to a sink method.
macro_rules! forward {
    ($(#[$doc:meta])* $name:ident => $sink_method:ident($ty:ty)) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$ty) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$sink_method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    forward!(
        /// Emits a [`PassBeginEvent`].
        pass_begin => on_pass_begin(PassBeginEvent)
    );
    forward!(
        /// Emits a [`PassEndEvent`].
        pass_end => on_pass_end(PassEndEvent)
    );
    forward!(
        /// Emits a [`SubpassEvent`].
        subpass => on_subpass(SubpassEvent)
    );
    forward!(
        /// Emits an [`EntityCulledEvent`].
        entity_culled => on_entity_culled(EntityCulledEvent)
    );
    forward!(
        /// Emits a [`StencilChangeEvent`].
        stencil_change => on_stencil_change(StencilChangeEvent)
    );
    forward!(
        /// Emits a [`FrameSummary`].
        frame_summary => on_frame_summary(FrameSummary)
    );
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Tallies walk activity during a frame and produces a [`FrameSummary`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameSummaryBuilder {
    summary: FrameSummary,
}

impl FrameSummaryBuilder {
    /// Starts an empty tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a walked pass.
    pub fn pass(&mut self) {
        self.summary.passes += 1;
    }

    /// Counts a drawn entity.
    pub fn entity_drawn(&mut self) {
        self.summary.entities_drawn += 1;
    }

    /// Counts a culled entity.
    pub fn entity_culled(&mut self) {
        self.summary.entities_culled += 1;
    }

    /// Counts a resolved sub-pass.
    pub fn subpass(&mut self, decision: SubpassDecision) {
        let counter = match decision {
            SubpassDecision::Collapsed => &mut self.summary.collapsed,
            SubpassDecision::Offscreen => &mut self.summary.offscreen_targets,
            SubpassDecision::Culled => &mut self.summary.culled_subpasses,
            SubpassDecision::Elided => &mut self.summary.elided_subpasses,
        };
        *counter += 1;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self, succeeded: bool) -> FrameSummary {
        FrameSummary {
            succeeded,
            ..self.summary
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
