// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-stream checks through the recording renderer.

use std::rc::Rc;

use impasto_core::blend::BlendMode;
use impasto_core::color::Color;
use impasto_core::contents::{BlurFilter, SolidColorContents, backdrop_filter};
use impasto_core::entity::Entity;
use impasto_core::error::RenderError;
use impasto_core::pass::{PaintPassDelegate, PassId, PassStore};
use impasto_core::renderer::{Capabilities, LoadAction, TextureSize};
use impasto_render::{Operation, RecordedEvent, RecordingRenderer};
use kurbo::Rect;

fn solid(rect: Rect, color: Color) -> Entity {
    Entity::new(Rc::new(SolidColorContents::rect(rect, color)))
}

/// Recorded events minus texture releases.
fn work(r: &RecordingRenderer) -> Vec<&RecordedEvent> {
    r.events()
        .iter()
        .filter(|e| !matches!(e, RecordedEvent::ReleaseTexture(_)))
        .collect()
}

fn opacity_layer(store: &mut PassStore, parent: PassId, rect: Rect) -> PassId {
    let layer = store.create_pass();
    store.add_entity(layer, solid(rect, Color::RED));
    store.set_delegate(layer, Rc::new(PaintPassDelegate::new(0.5)));
    store.add_subpass(parent, layer);
    layer
}

#[test]
fn draws_follow_element_order() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED));
    opacity_layer(&mut store, root, Rect::new(5.0, 5.0, 15.0, 15.0));
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLUE));

    let mut r = RecordingRenderer::new(Capabilities::desktop());
    let target = r.onscreen_target(TextureSize::new(32, 32));
    store.render(root, &mut r, &target).unwrap();

    let labels: Vec<_> = r.draws().map(|d| d.label).collect();
    assert_eq!(labels, ["Solid Fill", "Solid Fill", "Texture Fill", "Solid Fill"]);
    assert_eq!(r.texture_labels(), ["Subpass"]);

    // The layer renders in its own command buffer; the root pass stays open.
    let root_begins = r
        .events()
        .iter()
        .filter(|e| {
            matches!(e, RecordedEvent::BeginRenderPass { target: t, .. } if *t == target.texture)
        })
        .count();
    assert_eq!(root_begins, 1);
}

#[test]
fn layers_clipped_away_allocate_nothing() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    opacity_layer(&mut store, root, Rect::new(100.0, 100.0, 110.0, 110.0));

    let mut r = RecordingRenderer::default();
    let target = r.onscreen_target(TextureSize::new(32, 32));
    store.render(root, &mut r, &target).unwrap();
    assert!(r.texture_labels().is_empty());
    assert_eq!(r.draws().count(), 0);
}

#[test]
fn backdrop_ends_and_resumes_the_parent_pass() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 32.0, 32.0), Color::BLUE));
    let frosted = store.create_pass();
    store.set_backdrop_filter(frosted, Some(backdrop_filter(Rc::new(BlurFilter::new(4.0)))));
    store.add_subpass(root, frosted);

    let mut r = RecordingRenderer::new(Capabilities::desktop());
    let target = r.onscreen_target(TextureSize::new(32, 32));
    store.render(root, &mut r, &target).unwrap();

    let loads: Vec<_> = r
        .events()
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::BeginRenderPass { target: t, load, .. } if *t == target.texture => {
                Some(*load)
            }
            _ => None,
        })
        .collect();
    assert_eq!(loads, [LoadAction::Clear, LoadAction::Load]);
    // A readable screen needs no root copy.
    assert!(!r.texture_labels().contains(&"Root Offscreen"));
}

#[test]
fn write_only_screen_gets_a_root_copy() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(
        root,
        solid(Rect::new(0.0, 0.0, 8.0, 8.0), Color::RED).with_blend_mode(BlendMode::Overlay),
    );

    // Framebuffer fetch handles the blend, so the screen is never read.
    let mut fetch = RecordingRenderer::new(Capabilities::mobile());
    let target = fetch.onscreen_target(TextureSize::new(16, 16));
    store.render(root, &mut fetch, &target).unwrap();
    assert!(fetch.texture_labels().is_empty());

    let mut caps = Capabilities::mobile();
    caps.supports_framebuffer_fetch = false;
    let mut r = RecordingRenderer::new(caps);
    let target = r.onscreen_target(TextureSize::new(16, 16));
    store.render(root, &mut r, &target).unwrap();
    assert_eq!(r.texture_labels().first(), Some(&"Root Offscreen"));
    let events = work(&r);
    assert!(matches!(
        events[events.len() - 2],
        RecordedEvent::Blit { destination, .. } if *destination == target.texture
    ));
    assert!(matches!(events[events.len() - 1], RecordedEvent::Submit(_)));
}

#[test]
fn advanced_blend_layer_on_write_only_screen_gets_a_root_copy() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 16.0, 16.0), Color::BLUE));
    let layer = opacity_layer(&mut store, root, Rect::new(4.0, 4.0, 12.0, 12.0));
    store.set_blend_mode(layer, BlendMode::Multiply);

    let mut caps = Capabilities::mobile();
    caps.supports_framebuffer_fetch = false;
    let mut r = RecordingRenderer::new(caps);
    let target = r.onscreen_target(TextureSize::new(16, 16));
    store.render(root, &mut r, &target).unwrap();

    let labels = r.texture_labels();
    assert_eq!(labels.first(), Some(&"Root Offscreen"));
    assert!(labels.contains(&"Advanced Blend Backdrop"));
    // The screen is only written, by the final copy.
    let screen_reads = r.events().iter().filter(|e| match e {
        RecordedEvent::Blit { source, .. } => *source == target.texture,
        RecordedEvent::BeginRenderPass { target: t, .. } => *t == target.texture,
        _ => false,
    });
    assert_eq!(screen_reads.count(), 0);
}

#[test]
fn intermediate_textures_are_released_at_frame_end() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    opacity_layer(&mut store, root, Rect::new(0.0, 0.0, 4.0, 4.0));
    store.add_entity(
        root,
        solid(Rect::new(0.0, 0.0, 4.0, 4.0), Color::GREEN).with_blend_mode(BlendMode::Screen),
    );

    let mut r = RecordingRenderer::new(Capabilities::desktop());
    let target = r.onscreen_target(TextureSize::new(8, 8));
    store.render(root, &mut r, &target).unwrap();

    let created: Vec<_> = r
        .events()
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::CreateTexture { texture, .. } => Some(*texture),
            _ => None,
        })
        .collect();
    let released: Vec<_> = r
        .events()
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::ReleaseTexture(texture) => Some(*texture),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 3);
    assert_eq!(released, created);
    // Releases come after the last submit.
    let last_submit = r
        .events()
        .iter()
        .rposition(|e| matches!(e, RecordedEvent::Submit(_)))
        .unwrap();
    let first_release = r
        .events()
        .iter()
        .position(|e| matches!(e, RecordedEvent::ReleaseTexture(_)))
        .unwrap();
    assert!(first_release > last_submit);
}

#[test]
fn draw_failure_aborts_the_frame() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    for _ in 0..3 {
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED));
    }
    let mut r = RecordingRenderer::default().failing_at(Operation::Record, 1);
    let target = r.onscreen_target(TextureSize::new(8, 8));
    let err = store.render(root, &mut r, &target).unwrap_err();
    assert_eq!(err, RenderError::Pipeline("injected failure"));
    assert_eq!(r.draws().count(), 1);
    // Nothing is submitted after the failure.
    assert!(!r.events().iter().any(|e| matches!(e, RecordedEvent::Submit(_))));
}

#[test]
fn texture_failure_in_a_layer_aborts_the_frame() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    opacity_layer(&mut store, root, Rect::new(0.0, 0.0, 4.0, 4.0));
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 4.0, 4.0), Color::GREEN));

    let mut r = RecordingRenderer::default().failing_at(Operation::CreateTexture, 0);
    let target = r.onscreen_target(TextureSize::new(8, 8));
    let err = store.render(root, &mut r, &target).unwrap_err();
    assert!(matches!(err, RenderError::TextureAllocation { .. }));
    assert_eq!(r.draws().count(), 0);
}

#[test]
fn submit_failure_surfaces() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED));
    let mut r = RecordingRenderer::default().failing_at(Operation::Submit, 0);
    let target = r.onscreen_target(TextureSize::new(8, 8));
    assert_eq!(store.render(root, &mut r, &target), Err(RenderError::Submit));
}

#[test]
fn cloned_tree_renders_the_same_stream() {
    let mut store = PassStore::new();
    let root = store.create_pass();
    store.add_entity(root, solid(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED));
    opacity_layer(&mut store, root, Rect::new(2.0, 2.0, 6.0, 6.0));
    let copy = store.clone_pass(root);

    let mut a = RecordingRenderer::default();
    let target = a.onscreen_target(TextureSize::new(8, 8));
    store.render(root, &mut a, &target).unwrap();
    let mut b = RecordingRenderer::default();
    let target = b.onscreen_target(TextureSize::new(8, 8));
    store.render(copy, &mut b, &target).unwrap();
    assert_eq!(a.events(), b.events());
}
