// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Lines are
//! indented by pass depth so the tree shape is visible at a glance.

use std::io::Write;

use impasto_core::contents::StencilCoverageKind;
use impasto_core::pass::PassId;
use impasto_core::trace::{
    EntityCulledEvent, FrameSummary, PassBeginEvent, PassEndEvent, StencilChangeEvent,
    SubpassEvent, TraceSink,
};
use kurbo::Rect;

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    depth: u32,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer, depth: 0 }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer, depth: 0 }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, depth: u32, args: std::fmt::Arguments<'_>) {
        let indent = depth as usize * 2;
        let _ = writeln!(self.writer, "{:indent$}{args}", "");
    }
}

fn pass_name(pass: PassId) -> String {
    format!("#{}.{}", pass.index(), pass.generation())
}

fn rect_text(rect: Option<Rect>) -> String {
    match rect {
        Some(r) => format!("({:.1},{:.1})-({:.1},{:.1})", r.x0, r.y0, r.x1, r.y1),
        None => "none".into(),
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.depth = e.depth;
        self.line(
            e.depth,
            format_args!(
                "[pass] {} target={}x{} elements={}",
                pass_name(e.pass),
                e.target.width,
                e.target.height,
                e.element_count,
            ),
        );
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.line(
            e.depth,
            format_args!(
                "[pass:end] {} drawn={} culled={}",
                pass_name(e.pass),
                e.entities_drawn,
                e.entities_culled,
            ),
        );
        self.depth = e.depth.saturating_sub(1);
    }

    fn on_subpass(&mut self, e: &SubpassEvent) {
        self.line(
            e.depth,
            format_args!(
                "[subpass] {} {} coverage={}",
                pass_name(e.pass),
                e.decision.name(),
                rect_text(e.coverage),
            ),
        );
    }

    fn on_entity_culled(&mut self, e: &EntityCulledEvent) {
        let depth = self.depth + 1;
        self.line(
            depth,
            format_args!("[cull] {} element={}", pass_name(e.pass), e.element_index),
        );
    }

    fn on_stencil_change(&mut self, e: &StencilChangeEvent) {
        let kind = match e.kind {
            StencilCoverageKind::Append => "push",
            StencilCoverageKind::Restore => "pop",
            StencilCoverageKind::NoChange => "keep",
        };
        let depth = self.depth + 1;
        self.line(
            depth,
            format_args!(
                "[clip:{kind}] {} height={} coverage={}",
                pass_name(e.pass),
                e.stack_height,
                rect_text(e.coverage),
            ),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let status = if s.succeeded { "ok" } else { "FAILED" };
        self.line(
            0,
            format_args!(
                "[summary] passes={} offscreen={} collapsed={} culled={} elided={} \
                 drawn={} entities_culled={} status={status}",
                s.passes,
                s.offscreen_targets,
                s.collapsed,
                s.culled_subpasses,
                s.elided_subpasses,
                s.entities_drawn,
                s.entities_culled,
            ),
        );
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impasto_core::renderer::TextureSize;
    use impasto_core::trace::SubpassDecision;

    #[test]
    fn nested_pass_lines_are_indented() {
        let root = PassId::from_raw(0, 0);
        let sub = PassId::from_raw(1, 0);
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_pass_begin(&PassBeginEvent {
            pass: root,
            depth: 0,
            target: TextureSize::new(64, 48),
            element_count: 2,
        });
        sink.on_subpass(&SubpassEvent {
            pass: sub,
            depth: 1,
            decision: SubpassDecision::Offscreen,
            coverage: Some(Rect::new(0.0, 0.0, 8.0, 8.0)),
        });
        sink.on_pass_end(&PassEndEvent {
            pass: root,
            depth: 0,
            entities_drawn: 1,
            entities_culled: 0,
        });

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3, "got: {output}");
        assert_eq!(lines[0], "[pass] #0.0 target=64x48 elements=2");
        assert_eq!(
            lines[1],
            "  [subpass] #1.0 offscreen coverage=(0.0,0.0)-(8.0,8.0)"
        );
        assert!(lines[2].starts_with("[pass:end] #0.0 drawn=1"), "got: {output}");
    }

    #[test]
    fn failed_summary_is_flagged() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_summary(&FrameSummary {
            passes: 1,
            ..FrameSummary::default()
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("passes=1"), "got: {output}");
        assert!(output.contains("status=FAILED"), "got: {output}");
    }
}
