// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Walk events carry no clock, so each event is stamped with its position in
//! the recording, one microsecond apart. Pass begin and end become duration
//! slices, which nest the way the passes do.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use impasto_core::pass::PassId;
use kurbo::Rect;
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for (ts, recorded) in decode(bytes).enumerate() {
        let event = match recorded {
            RecordedEvent::PassBegin(e) => json!({
                "ph": "B",
                "name": pass_name(e.pass),
                "cat": "Pass",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "depth": e.depth,
                    "width": e.target.width,
                    "height": e.target.height,
                    "elements": e.element_count,
                }
            }),
            RecordedEvent::PassEnd(e) => json!({
                "ph": "E",
                "name": pass_name(e.pass),
                "cat": "Pass",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "args": {
                    "drawn": e.entities_drawn,
                    "culled": e.entities_culled,
                }
            }),
            RecordedEvent::Subpass(e) => json!({
                "ph": "i",
                "name": format!("Subpass {}", e.decision.name()),
                "cat": "Subpass",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "t",
                "args": {
                    "pass": pass_name(e.pass),
                    "depth": e.depth,
                    "coverage": rect_value(e.coverage),
                }
            }),
            RecordedEvent::EntityCulled(e) => json!({
                "ph": "i",
                "name": "EntityCulled",
                "cat": "Entity",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "t",
                "args": {
                    "pass": pass_name(e.pass),
                    "element": e.element_index,
                }
            }),
            RecordedEvent::StencilChange(e) => json!({
                "ph": "i",
                "name": format!("Stencil {:?}", e.kind),
                "cat": "Stencil",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "t",
                "args": {
                    "pass": pass_name(e.pass),
                    "height": e.stack_height,
                    "coverage": rect_value(e.coverage),
                }
            }),
            RecordedEvent::FrameSummary(s) => json!({
                "ph": "i",
                "name": "FrameSummary",
                "cat": "Summary",
                "ts": ts,
                "pid": 0,
                "tid": 0,
                "s": "g",
                "args": {
                    "passes": s.passes,
                    "offscreen_targets": s.offscreen_targets,
                    "collapsed": s.collapsed,
                    "culled_subpasses": s.culled_subpasses,
                    "elided_subpasses": s.elided_subpasses,
                    "entities_drawn": s.entities_drawn,
                    "entities_culled": s.entities_culled,
                    "succeeded": s.succeeded,
                }
            }),
        };
        events.push(event);
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn pass_name(pass: PassId) -> String {
    format!("Pass #{}", pass.index())
}

fn rect_value(rect: Option<Rect>) -> Value {
    match rect {
        Some(r) => json!([r.x0, r.y0, r.x1, r.y1]),
        None => Value::Null,
    }
}
