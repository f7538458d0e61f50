// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records, each led by a one-byte tag.
//! [`decode`] reads them back as an iterator of [`RecordedEvent`].
//!
//! Optional rectangles are stored as a presence byte followed by four `f64`
//! values, so every record of a given tag has the same size.

use impasto_core::contents::StencilCoverageKind;
use impasto_core::pass::PassId;
use impasto_core::renderer::TextureSize;
use impasto_core::trace::{
    EntityCulledEvent, FrameSummary, PassBeginEvent, PassEndEvent, StencilChangeEvent,
    SubpassDecision, SubpassEvent, TraceSink,
};
use kurbo::Rect;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PASS_BEGIN: u8 = 1;
const TAG_PASS_END: u8 = 2;
const TAG_SUBPASS: u8 = 3;
const TAG_ENTITY_CULLED: u8 = 4;
const TAG_STENCIL_CHANGE: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_pass(&mut self, pass: PassId) {
        self.write_u32(pass.index());
        self.write_u32(pass.generation());
    }

    fn write_option_rect(&mut self, rect: Option<Rect>) {
        self.write_u8(u8::from(rect.is_some()));
        let r = rect.unwrap_or(Rect::ZERO);
        for v in [r.x0, r.y0, r.x1, r.y1] {
            self.write_f64(v);
        }
    }

    fn write_decision(&mut self, d: SubpassDecision) {
        self.write_u8(match d {
            SubpassDecision::Collapsed => 0,
            SubpassDecision::Offscreen => 1,
            SubpassDecision::Culled => 2,
            SubpassDecision::Elided => 3,
        });
    }

    fn write_stencil_kind(&mut self, k: StencilCoverageKind) {
        self.write_u8(match k {
            StencilCoverageKind::NoChange => 0,
            StencilCoverageKind::Append => 1,
            StencilCoverageKind::Restore => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_pass(e.pass);
        self.write_u32(e.depth);
        self.write_u32(e.target.width);
        self.write_u32(e.target.height);
        self.write_u32(e.element_count);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.write_u8(TAG_PASS_END);
        self.write_pass(e.pass);
        self.write_u32(e.depth);
        self.write_u32(e.entities_drawn);
        self.write_u32(e.entities_culled);
    }

    fn on_subpass(&mut self, e: &SubpassEvent) {
        self.write_u8(TAG_SUBPASS);
        self.write_pass(e.pass);
        self.write_u32(e.depth);
        self.write_decision(e.decision);
        self.write_option_rect(e.coverage);
    }

    fn on_entity_culled(&mut self, e: &EntityCulledEvent) {
        self.write_u8(TAG_ENTITY_CULLED);
        self.write_pass(e.pass);
        self.write_u32(e.element_index);
    }

    fn on_stencil_change(&mut self, e: &StencilChangeEvent) {
        self.write_u8(TAG_STENCIL_CHANGE);
        self.write_pass(e.pass);
        self.write_stencil_kind(e.kind);
        self.write_u32(e.stack_height);
        self.write_option_rect(e.coverage);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u32(s.passes);
        self.write_u32(s.offscreen_targets);
        self.write_u32(s.collapsed);
        self.write_u32(s.culled_subpasses);
        self.write_u32(s.elided_subpasses);
        self.write_u32(s.entities_drawn);
        self.write_u32(s.entities_culled);
        self.write_u8(u8::from(s.succeeded));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`PassBeginEvent`].
    PassBegin(PassBeginEvent),
    /// A [`PassEndEvent`].
    PassEnd(PassEndEvent),
    /// A [`SubpassEvent`].
    Subpass(SubpassEvent),
    /// An [`EntityCulledEvent`].
    EntityCulled(EntityCulledEvent),
    /// A [`StencilChangeEvent`].
    StencilChange(StencilChangeEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn read_pass(&mut self) -> Option<PassId> {
        Some(PassId::from_raw(self.read_u32()?, self.read_u32()?))
    }

    fn read_option_rect(&mut self) -> Option<Option<Rect>> {
        let present = self.read_u8()?;
        let rect = Rect::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        );
        Some((present != 0).then_some(rect))
    }

    fn read_decision(&mut self) -> Option<SubpassDecision> {
        Some(match self.read_u8()? {
            0 => SubpassDecision::Collapsed,
            1 => SubpassDecision::Offscreen,
            2 => SubpassDecision::Culled,
            _ => SubpassDecision::Elided,
        })
    }

    fn read_stencil_kind(&mut self) -> Option<StencilCoverageKind> {
        Some(match self.read_u8()? {
            0 => StencilCoverageKind::NoChange,
            1 => StencilCoverageKind::Append,
            _ => StencilCoverageKind::Restore,
        })
    }

    fn decode_pass_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassBegin(PassBeginEvent {
            pass: self.read_pass()?,
            depth: self.read_u32()?,
            target: TextureSize::new(self.read_u32()?, self.read_u32()?),
            element_count: self.read_u32()?,
        }))
    }

    fn decode_pass_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassEnd(PassEndEvent {
            pass: self.read_pass()?,
            depth: self.read_u32()?,
            entities_drawn: self.read_u32()?,
            entities_culled: self.read_u32()?,
        }))
    }

    fn decode_subpass(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Subpass(SubpassEvent {
            pass: self.read_pass()?,
            depth: self.read_u32()?,
            decision: self.read_decision()?,
            coverage: self.read_option_rect()?,
        }))
    }

    fn decode_entity_culled(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EntityCulled(EntityCulledEvent {
            pass: self.read_pass()?,
            element_index: self.read_u32()?,
        }))
    }

    fn decode_stencil_change(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::StencilChange(StencilChangeEvent {
            pass: self.read_pass()?,
            kind: self.read_stencil_kind()?,
            stack_height: self.read_u32()?,
            coverage: self.read_option_rect()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            passes: self.read_u32()?,
            offscreen_targets: self.read_u32()?,
            collapsed: self.read_u32()?,
            culled_subpasses: self.read_u32()?,
            elided_subpasses: self.read_u32()?,
            entities_drawn: self.read_u32()?,
            entities_culled: self.read_u32()?,
            succeeded: self.read_u8()? != 0,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_PASS_BEGIN => self.decode_pass_begin(),
            TAG_PASS_END => self.decode_pass_end(),
            TAG_SUBPASS => self.decode_subpass(),
            TAG_ENTITY_CULLED => self.decode_entity_culled(),
            TAG_STENCIL_CHANGE => self.decode_stencil_change(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use impasto_core::color::Color;
    use impasto_core::contents::{
        ClipContents, ClipOp, ClipRestoreContents, Geometry, SolidColorContents,
    };
    use impasto_core::entity::Entity;
    use impasto_core::pass::{PaintPassDelegate, PassStore};
    use impasto_core::trace::Tracer;
    use impasto_render::RecordingRenderer;

    fn solid(rect: Rect) -> Entity {
        Entity::new(Rc::new(SolidColorContents::rect(rect, Color::RED)))
    }

    #[test]
    fn subpass_coverage_survives_recording() {
        let mut rec = RecorderSink::new();
        let orig = SubpassEvent {
            pass: PassId::from_raw(3, 2),
            depth: 1,
            decision: SubpassDecision::Offscreen,
            coverage: Some(Rect::new(1.5, 2.0, 10.0, 12.25)),
        };
        rec.on_subpass(&orig);
        rec.on_subpass(&SubpassEvent {
            coverage: None,
            decision: SubpassDecision::Culled,
            ..orig
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::Subpass(e) => {
                assert_eq!(e.pass, orig.pass);
                assert_eq!(e.decision, SubpassDecision::Offscreen);
                assert_eq!(e.coverage, orig.coverage);
            }
            other => panic!("expected Subpass, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::Subpass(e) => {
                assert_eq!(e.decision, SubpassDecision::Culled);
                assert_eq!(e.coverage, None);
            }
            other => panic!("expected Subpass, got {other:?}"),
        }
    }

    #[test]
    fn records_a_rendered_frame() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(
            root,
            Entity::new(Rc::new(ClipContents::new(
                Geometry::Rect(Rect::new(0.0, 0.0, 4.0, 8.0)),
                ClipOp::Intersect,
            ))),
        );
        store.add_entity(root, solid(Rect::new(6.0, 0.0, 8.0, 8.0)).with_stencil_depth(1));
        store.add_entity(root, Entity::new(Rc::new(ClipRestoreContents::new())));
        let layer = store.create_pass();
        store.add_entity(layer, solid(Rect::new(0.0, 0.0, 4.0, 4.0)));
        store.set_delegate(layer, Rc::new(PaintPassDelegate::new(0.5)));
        store.add_subpass(root, layer);

        let mut renderer = RecordingRenderer::default();
        let target = renderer.onscreen_target(TextureSize::new(8, 8));
        let mut rec = RecorderSink::new();
        store
            .render_with_tracer(root, &mut renderer, &target, &mut Tracer::new(&mut rec))
            .unwrap();

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(matches!(events[0], RecordedEvent::PassBegin(e) if e.pass == root));
        assert!(events.iter().any(|e| matches!(
            e,
            RecordedEvent::StencilChange(s) if s.kind == StencilCoverageKind::Append
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RecordedEvent::EntityCulled(c) if c.element_index == 1
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RecordedEvent::Subpass(s)
                if s.pass == layer && s.decision == SubpassDecision::Offscreen
        )));
        match events.last() {
            Some(RecordedEvent::FrameSummary(s)) => {
                assert!(s.succeeded);
                assert_eq!(s.offscreen_targets, 1);
                assert_eq!(s.entities_culled, 1);
            }
            other => panic!("expected FrameSummary last, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_entity_culled(&EntityCulledEvent {
            pass: PassId::from_raw(0, 0),
            element_index: 4,
        });
        rec.on_frame_summary(&FrameSummary::default());
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RecordedEvent::EntityCulled(_)));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
