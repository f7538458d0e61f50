// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text frames and the lazily built glyph atlas shared by a pass tree.
//!
//! Every text frame added anywhere in a pass tree is registered with one
//! [`LazyGlyphAtlas`]. The atlas itself (a slot assignment for each unique
//! glyph) is only built the first time text contents render, so trees that
//! never draw text never pay for it.
//!
//! The atlas is shared through `Rc` and populated through `RefCell`. Rendering
//! is single-threaded; a tree recorded from several threads would need the
//! cells replaced with a lock around first population.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use kurbo::{Point, Rect};

use crate::geometry;

/// Identifies a glyph independent of where it is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphKey {
    /// Font identifier assigned by the text stack.
    pub font: u32,
    /// Glyph index within the font.
    pub glyph: u32,
}

/// A glyph placed in a text frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedGlyph {
    /// Which glyph.
    pub key: GlyphKey,
    /// Baseline origin in frame space.
    pub position: Point,
    /// Ink bounds relative to `position`.
    pub bounds: Rect,
}

impl PositionedGlyph {
    /// Returns the ink bounds in frame space.
    #[must_use]
    pub fn frame_bounds(&self) -> Rect {
        self.bounds + self.position.to_vec2()
    }
}

/// A laid-out run of glyphs ready for drawing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextFrame {
    /// Glyphs in draw order.
    pub glyphs: Vec<PositionedGlyph>,
}

impl TextFrame {
    /// Creates a frame from positioned glyphs.
    #[must_use]
    pub fn new(glyphs: Vec<PositionedGlyph>) -> Self {
        Self { glyphs }
    }

    /// Returns the union of glyph ink bounds, or `None` for an empty frame.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        self.glyphs
            .iter()
            .map(|g| Some(g.frame_bounds()))
            .fold(None, geometry::union)
    }
}

/// A built atlas: one slot per unique glyph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphAtlas {
    slots: BTreeMap<GlyphKey, u32>,
}

impl GlyphAtlas {
    fn from_frames(frames: &[TextFrame]) -> Self {
        let mut slots = BTreeMap::new();
        for glyph in frames.iter().flat_map(|f| f.glyphs.iter()) {
            let next = u32::try_from(slots.len()).unwrap_or(u32::MAX);
            slots.entry(glyph.key).or_insert(next);
        }
        Self { slots }
    }

    /// Returns the slot assigned to `key`.
    #[must_use]
    pub fn slot(&self, key: GlyphKey) -> Option<u32> {
        self.slots.get(&key).copied()
    }

    /// Number of unique glyphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether the atlas holds no glyphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Collects text frames and builds a [`GlyphAtlas`] on first request.
#[derive(Debug, Default)]
pub struct LazyGlyphAtlas {
    frames: RefCell<Vec<TextFrame>>,
    atlas: RefCell<Option<Rc<GlyphAtlas>>>,
}

impl LazyGlyphAtlas {
    /// Creates an empty atlas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a frame. Drops any atlas built from the previous frame set.
    pub fn add_text_frame(&self, frame: TextFrame) {
        self.frames.borrow_mut().push(frame);
        self.atlas.borrow_mut().take();
    }

    /// Replaces the registered frames and drops any built atlas.
    pub(crate) fn replace_frames(&self, frames: Vec<TextFrame>) {
        *self.frames.borrow_mut() = frames;
        self.atlas.borrow_mut().take();
    }

    /// Moves every frame registered with `other` into `self`.
    pub(crate) fn absorb(&self, other: &Self) {
        let moved: Vec<TextFrame> = other.frames.borrow_mut().drain(..).collect();
        other.atlas.borrow_mut().take();
        if moved.is_empty() {
            return;
        }
        self.frames.borrow_mut().extend(moved);
        self.atlas.borrow_mut().take();
    }

    /// Number of registered frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Returns whether the atlas has been built since the last registration.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.atlas.borrow().is_some()
    }

    /// Returns the atlas, building it from the registered frames if needed.
    pub fn create_or_get_atlas(&self) -> Rc<GlyphAtlas> {
        if let Some(atlas) = self.atlas.borrow().as_ref() {
            return Rc::clone(atlas);
        }
        let atlas = Rc::new(GlyphAtlas::from_frames(&self.frames.borrow()));
        log::debug!(
            "built glyph atlas with {} glyphs from {} frames",
            atlas.len(),
            self.frame_count()
        );
        *self.atlas.borrow_mut() = Some(Rc::clone(&atlas));
        atlas
    }
}
