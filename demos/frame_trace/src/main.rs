// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renders a small pass tree in software and exports its walk trace.
//!
//! The tree has a clipped card, a translucent layer, a blurred glow, a
//! frosted backdrop, and one layer positioned off screen. Each frame is
//! traced to a [`PrettyPrintSink`] on stdout and to a [`RecorderSink`],
//! which is then exported as `frame_trace.json` for `chrome://tracing`.

use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;

use impasto_core::blend::BlendMode;
use impasto_core::color::Color;
use impasto_core::contents::{
    BlurFilter, ClipContents, ClipOp, ClipRestoreContents, ColorMatrixFilter, Geometry,
    SolidColorContents, backdrop_filter,
};
use impasto_core::entity::Entity;
use impasto_core::pass::{PaintPassDelegate, PassId, PassStore};
use impasto_core::renderer::{Capabilities, TextureSize};
use impasto_core::trace::{
    EntityCulledEvent, FrameSummary, PassBeginEvent, PassEndEvent, StencilChangeEvent,
    SubpassEvent, TraceSink, Tracer,
};
use impasto_debug::pretty::PrettyPrintSink;
use impasto_debug::recorder::RecorderSink;
use impasto_render::SoftwareRenderer;
use kurbo::{Affine, Rect};

const SIZE: u32 = 64;

/// Forwards every event to two sinks.
struct Tee<'a> {
    a: &'a mut dyn TraceSink,
    b: &'a mut dyn TraceSink,
}

impl TraceSink for Tee<'_> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.a.on_pass_begin(e);
        self.b.on_pass_begin(e);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.a.on_pass_end(e);
        self.b.on_pass_end(e);
    }

    fn on_subpass(&mut self, e: &SubpassEvent) {
        self.a.on_subpass(e);
        self.b.on_subpass(e);
    }

    fn on_entity_culled(&mut self, e: &EntityCulledEvent) {
        self.a.on_entity_culled(e);
        self.b.on_entity_culled(e);
    }

    fn on_stencil_change(&mut self, e: &StencilChangeEvent) {
        self.a.on_stencil_change(e);
        self.b.on_stencil_change(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.a.on_frame_summary(s);
        self.b.on_frame_summary(s);
    }
}

fn solid(rect: Rect, color: Color) -> Entity {
    Entity::new(Rc::new(SolidColorContents::rect(rect, color)))
}

fn build_scene(store: &mut PassStore) -> PassId {
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 64.0, 64.0), Color::WHITE));

    // -- clipped card ------------------------------------------------------
    store.add_entity(
        root,
        Entity::new(Rc::new(ClipContents::new(
            Geometry::Rect(Rect::new(4.0, 4.0, 28.0, 28.0)),
            ClipOp::Intersect,
        ))),
    );
    store.add_entity(
        root,
        solid(Rect::new(0.0, 0.0, 32.0, 32.0), Color::BLUE).with_stencil_depth(1),
    );
    // Outside the clip; culled.
    store.add_entity(
        root,
        solid(Rect::new(40.0, 40.0, 48.0, 48.0), Color::RED).with_stencil_depth(1),
    );
    store.add_entity(root, Entity::new(Rc::new(ClipRestoreContents::new())));

    // -- translucent layer -------------------------------------------------
    let layer = store.create_pass();
    store.add_entity(layer, solid(Rect::new(0.0, 0.0, 16.0, 16.0), Color::RED));
    store.add_entity(layer, solid(Rect::new(8.0, 8.0, 24.0, 24.0), Color::GREEN));
    store.set_transformation(layer, Affine::translate((32.0, 4.0)));
    store.set_delegate(layer, Rc::new(PaintPassDelegate::new(0.6)));
    store.add_subpass(root, layer);

    // -- blurred glow, multiplied onto the background -----------------------
    let glow = store.create_pass();
    store.add_entity(glow, solid(Rect::new(36.0, 36.0, 52.0, 52.0), Color::GREEN));
    store.set_delegate(
        glow,
        Rc::new(PaintPassDelegate::new(1.0).with_image_filter(Rc::new(BlurFilter::new(3.0)))),
    );
    store.set_blend_mode(glow, BlendMode::Multiply);
    store.add_subpass(root, glow);

    // -- frosted strip -----------------------------------------------------
    let frosted = store.create_pass();
    store.set_backdrop_filter(
        frosted,
        Some(backdrop_filter(Rc::new(ColorMatrixFilter::grayscale()))),
    );
    store.add_entity(
        frosted,
        solid(Rect::new(0.0, 56.0, 64.0, 64.0), Color::from_straight(1.0, 1.0, 1.0, 0.3)),
    );
    store.add_subpass(root, frosted);

    // -- off screen; culled by coverage --------------------------------------
    let hidden = store.create_pass();
    store.add_entity(hidden, solid(Rect::new(0.0, 0.0, 8.0, 8.0), Color::BLACK));
    store.set_transformation(hidden, Affine::translate((200.0, 200.0)));
    store.set_delegate(hidden, Rc::new(PaintPassDelegate::new(0.5)));
    store.add_subpass(root, hidden);

    root
}

fn main() {
    let mut store = PassStore::new();
    let root = build_scene(&mut store);

    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let mut recorder = RecorderSink::new();

    for caps in [Capabilities::unrestricted(), Capabilities::mobile()] {
        println!("-- {caps:?}");
        let mut renderer = SoftwareRenderer::new(caps);
        let target = renderer.create_onscreen(TextureSize::new(SIZE, SIZE));
        let mut tee = Tee {
            a: &mut pretty,
            b: &mut recorder,
        };
        let result =
            store.render_with_tracer(root, &mut renderer, &target, &mut Tracer::new(&mut tee));
        match result {
            Ok(()) => println!(
                "rendered {SIZE}x{SIZE}, {} live textures after the frame",
                renderer.texture_count()
            ),
            Err(err) => println!("frame failed: {err}"),
        }
    }

    let path = "frame_trace.json";
    let file = File::create(path).expect("failed to create frame_trace.json");
    let mut writer = BufWriter::new(file);
    impasto_debug::chrome::export(recorder.as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path}");
}
