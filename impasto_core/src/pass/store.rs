// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays pass storage with allocation, topology, and coverage
//! queries.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Rect};

use super::delegate::{DefaultPassDelegate, EntityPassDelegate};
use super::id::{INVALID, PassId};
use crate::blend::BlendMode;
use crate::contents::BackdropFilterProc;
use crate::coverage::{SaveLayerFlags, compute_save_layer_coverage};
use crate::entity::Entity;
use crate::geometry::{self, MAXIMUM};
use crate::glyph_atlas::LazyGlyphAtlas;
use crate::renderer::Capabilities;

/// One item in a pass, in paint order.
#[derive(Clone, Debug)]
pub enum Element {
    /// An entity drawn directly by the pass.
    Entity(Entity),
    /// A nested pass owned by this one.
    Subpass(PassId),
}

/// Struct-of-arrays storage for a forest of entity passes.
///
/// Passes are addressed by [`PassId`] handles. Each pass occupies a slot in
/// parallel arrays; destroyed passes are recycled via a free list, and
/// generation counters prevent stale handle access.
///
/// A pass owns its sub-passes: destroying or replacing a parent destroys the
/// sub-passes it drops. The `superpass` back-reference is a plain index and
/// never keeps anything alive.
pub struct PassStore {
    // -- Topology --
    pub(crate) elements: Vec<Vec<Element>>,
    pub(crate) superpass: Vec<u32>,

    // -- Properties --
    pub(crate) transformation: Vec<Affine>,
    pub(crate) stencil_depth: Vec<u32>,
    pub(crate) blend_mode: Vec<BlendMode>,
    pub(crate) backdrop_filter: Vec<Option<BackdropFilterProc>>,
    pub(crate) delegate: Vec<Rc<dyn EntityPassDelegate>>,
    pub(crate) bounds_limit: Vec<Option<Rect>>,

    // -- Derived --
    pub(crate) contains_advanced_blends: Vec<bool>,
    pub(crate) glyph_atlas: Vec<Rc<LazyGlyphAtlas>>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
}

impl fmt::Debug for PassStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassStore")
            .field("len", &self.len)
            .field("free", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl Default for PassStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PassStore {
    /// Creates an empty pass store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            superpass: Vec::new(),
            transformation: Vec::new(),
            stencil_depth: Vec::new(),
            blend_mode: Vec::new(),
            backdrop_filter: Vec::new(),
            delegate: Vec::new(),
            bounds_limit: Vec::new(),
            contains_advanced_blends: Vec::new(),
            glyph_atlas: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    // -- Allocation API --

    /// Creates an empty root pass and returns its handle.
    ///
    /// The pass starts with an identity transform, stencil depth 0,
    /// [`BlendMode::SourceOver`], the [`DefaultPassDelegate`], and its own
    /// glyph atlas.
    pub fn create_pass(&mut self) -> PassId {
        let delegate: Rc<dyn EntityPassDelegate> = Rc::new(DefaultPassDelegate);
        let atlas = Rc::new(LazyGlyphAtlas::new());
        let idx = if let Some(idx) = self.free_list.pop() {
            // Freed slots were reset on destroy; only the shared handles
            // need replacing.
            self.delegate[idx as usize] = delegate;
            self.glyph_atlas[idx as usize] = atlas;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.elements.push(Vec::new());
            self.superpass.push(INVALID);
            self.transformation.push(Affine::IDENTITY);
            self.stencil_depth.push(0);
            self.blend_mode.push(BlendMode::SourceOver);
            self.backdrop_filter.push(None);
            self.delegate.push(delegate);
            self.bounds_limit.push(None);
            self.contains_advanced_blends.push(false);
            self.glyph_atlas.push(atlas);
            self.generation.push(0);
            idx
        };
        PassId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a pass and every sub-pass it owns.
    ///
    /// If the pass is attached to a superpass it is removed from the
    /// superpass's elements first.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_pass(&mut self, id: PassId) {
        self.validate(id);
        let parent = self.superpass[id.idx as usize];
        if parent != INVALID {
            self.elements[parent as usize]
                .retain(|el| !matches!(el, Element::Subpass(s) if *s == id));
        }
        self.destroy_subtree(id.idx);
        if parent != INVALID {
            self.resync_text(parent);
        }
    }

    /// Returns whether the given handle refers to a live pass.
    #[must_use]
    pub fn is_alive(&self, id: PassId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Number of live passes.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology API --

    /// Appends an entity to `pass`.
    ///
    /// Advanced blend modes mark the pass as needing destination reads, and
    /// text frames are registered with the pass's glyph atlas.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn add_entity(&mut self, pass: PassId, entity: Entity) {
        self.validate(pass);
        let p = pass.idx as usize;
        if entity.blend_mode.is_advanced() {
            self.contains_advanced_blends[p] = true;
        }
        self.register_text(p, &entity);
        self.elements[p].push(Element::Entity(entity));
    }

    /// Appends `subpass` to `pass` and returns its handle.
    ///
    /// The sub-pass's subtree starts sharing `pass`'s glyph atlas; frames it
    /// had registered move over. Returns `None` without doing anything if
    /// `subpass` is stale.
    ///
    /// # Panics
    ///
    /// Panics if `pass` is stale, if `subpass` already has a superpass, or if
    /// `subpass` is `pass` or one of its ancestors.
    pub fn add_subpass(&mut self, pass: PassId, subpass: PassId) -> Option<PassId> {
        self.validate(pass);
        if !self.is_alive(subpass) {
            return None;
        }
        assert!(subpass != pass, "a pass cannot contain itself");
        assert!(
            self.superpass[subpass.idx as usize] == INVALID,
            "subpass already has a superpass"
        );
        assert!(
            !self.is_ancestor(subpass, pass),
            "cannot add an ancestor as a subpass"
        );
        self.attach(pass.idx, subpass.idx);
        self.elements[pass.idx as usize].push(Element::Subpass(subpass));
        Some(subpass)
    }

    /// Replaces the elements of `pass`.
    ///
    /// Sub-passes in `elements` must be detached or already owned by `pass`.
    /// Previously owned sub-passes missing from `elements` are destroyed, and
    /// the tree's glyph atlas is re-registered from what remains.
    ///
    /// # Panics
    ///
    /// Panics on stale handles, if a sub-pass is owned by another pass, is
    /// listed twice, or is `pass` or one of its ancestors.
    pub fn set_elements(&mut self, pass: PassId, elements: Vec<Element>) {
        self.validate(pass);
        let p = pass.idx;
        let mut kept: Vec<PassId> = Vec::new();
        for el in &elements {
            let Element::Subpass(sub) = el else {
                continue;
            };
            self.validate(*sub);
            assert!(*sub != pass, "a pass cannot contain itself");
            assert!(!kept.contains(sub), "subpass listed twice");
            let owner = self.superpass[sub.idx as usize];
            assert!(
                owner == INVALID || owner == p,
                "subpass is owned by another pass"
            );
            assert!(
                owner == p || !self.is_ancestor(*sub, pass),
                "cannot add an ancestor as a subpass"
            );
            kept.push(*sub);
        }

        let old = core::mem::take(&mut self.elements[p as usize]);
        for el in old {
            if let Element::Subpass(sub) = el
                && !kept.contains(&sub)
            {
                self.destroy_subtree(sub.idx);
            }
        }
        for sub in &kept {
            if self.superpass[sub.idx as usize] == INVALID {
                self.attach(p, sub.idx);
            }
        }
        self.elements[p as usize] = elements;
        self.refresh_advanced_blends(p);
        self.resync_text(p);
    }

    /// Returns the elements of `pass` in paint order.
    #[must_use]
    pub fn elements(&self, pass: PassId) -> &[Element] {
        self.validate(pass);
        &self.elements[pass.idx as usize]
    }

    /// Returns the pass that owns `pass`, if any.
    #[must_use]
    pub fn superpass(&self, pass: PassId) -> Option<PassId> {
        self.validate(pass);
        let s = self.superpass[pass.idx as usize];
        (s != INVALID).then(|| PassId {
            idx: s,
            generation: self.generation[s as usize],
        })
    }

    /// Returns whether `pass` has no superpass.
    #[must_use]
    pub fn is_root(&self, pass: PassId) -> bool {
        self.superpass(pass).is_none()
    }

    /// Height of the sub-pass tree below and including `pass`; a pass
    /// without sub-passes has depth 1.
    #[must_use]
    pub fn subpasses_depth(&self, pass: PassId) -> usize {
        self.validate(pass);
        self.depth_of(pass.idx)
    }

    /// Deep-copies `pass` and its sub-passes into fresh slots.
    ///
    /// The copy is a detached root with its own glyph atlas. Entities share
    /// contents with the original.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn clone_pass(&mut self, pass: PassId) -> PassId {
        self.validate(pass);
        let atlas = Rc::new(LazyGlyphAtlas::new());
        self.clone_subtree(pass.idx, INVALID, &atlas)
    }

    /// Visits every entity below `pass` depth-first in paint order.
    ///
    /// Stops early and returns `false` as soon as `f` returns `false`.
    pub fn iterate_all_entities(&self, pass: PassId, mut f: impl FnMut(&Entity) -> bool) -> bool {
        self.validate(pass);
        self.visit(pass.idx, &mut f)
    }

    /// Mutable variant of [`iterate_all_entities`](Self::iterate_all_entities).
    pub fn iterate_all_entities_mut(
        &mut self,
        pass: PassId,
        mut f: impl FnMut(&mut Entity) -> bool,
    ) -> bool {
        self.validate(pass);
        let completed = self.visit_mut(pass.idx, &mut f);
        // Contents may have been swapped.
        self.resync_text(pass.idx);
        completed
    }

    // -- Property API --

    /// Returns the pass-to-parent transform.
    #[must_use]
    pub fn transformation(&self, pass: PassId) -> Affine {
        self.validate(pass);
        self.transformation[pass.idx as usize]
    }

    /// Sets the pass-to-parent transform.
    pub fn set_transformation(&mut self, pass: PassId, transformation: Affine) {
        self.validate(pass);
        self.transformation[pass.idx as usize] = transformation;
    }

    /// Returns the stencil depth the pass composites at.
    #[must_use]
    pub fn stencil_depth(&self, pass: PassId) -> u32 {
        self.validate(pass);
        self.stencil_depth[pass.idx as usize]
    }

    /// Sets the stencil depth the pass composites at.
    pub fn set_stencil_depth(&mut self, pass: PassId, depth: u32) {
        self.validate(pass);
        self.stencil_depth[pass.idx as usize] = depth;
    }

    /// Returns the blend mode the pass composites with.
    #[must_use]
    pub fn blend_mode(&self, pass: PassId) -> BlendMode {
        self.validate(pass);
        self.blend_mode[pass.idx as usize]
    }

    /// Sets the blend mode the pass composites with.
    pub fn set_blend_mode(&mut self, pass: PassId, blend_mode: BlendMode) {
        self.validate(pass);
        self.blend_mode[pass.idx as usize] = blend_mode;
    }

    /// Returns the backdrop filter, if any.
    #[must_use]
    pub fn backdrop_filter(&self, pass: PassId) -> Option<&BackdropFilterProc> {
        self.validate(pass);
        self.backdrop_filter[pass.idx as usize].as_ref()
    }

    /// Sets or clears the backdrop filter.
    pub fn set_backdrop_filter(&mut self, pass: PassId, filter: Option<BackdropFilterProc>) {
        self.validate(pass);
        self.backdrop_filter[pass.idx as usize] = filter;
    }

    /// Returns the delegate.
    #[must_use]
    pub fn delegate(&self, pass: PassId) -> &Rc<dyn EntityPassDelegate> {
        self.validate(pass);
        &self.delegate[pass.idx as usize]
    }

    /// Replaces the delegate.
    pub fn set_delegate(&mut self, pass: PassId, delegate: Rc<dyn EntityPassDelegate>) {
        self.validate(pass);
        self.delegate[pass.idx as usize] = delegate;
    }

    /// Returns the caller-specified bounds, in pass-local space.
    #[must_use]
    pub fn bounds_limit(&self, pass: PassId) -> Option<Rect> {
        self.validate(pass);
        self.bounds_limit[pass.idx as usize]
    }

    /// Sets or clears caller-specified bounds, in pass-local space.
    pub fn set_bounds_limit(&mut self, pass: PassId, bounds: Option<Rect>) {
        self.validate(pass);
        self.bounds_limit[pass.idx as usize] = bounds;
    }

    /// Returns the glyph atlas shared by the pass's tree.
    #[must_use]
    pub fn glyph_atlas(&self, pass: PassId) -> &Rc<LazyGlyphAtlas> {
        self.validate(pass);
        &self.glyph_atlas[pass.idx as usize]
    }

    /// Returns whether any direct entity uses an advanced blend mode.
    #[must_use]
    pub fn contains_advanced_blends(&self, pass: PassId) -> bool {
        self.validate(pass);
        self.contains_advanced_blends[pass.idx as usize]
    }

    // -- Coverage API --

    /// Union of element coverage in pass-local space.
    ///
    /// Returns [`MAXIMUM`] as soon as any element is unbounded, and `None`
    /// if nothing would be drawn.
    #[must_use]
    pub fn elements_coverage(&self, pass: PassId) -> Option<Rect> {
        self.validate(pass);
        self.elements_coverage_at(pass.idx)
    }

    /// Coverage of `subpass` in its superpass's space, limited to
    /// `coverage_limit` (unbounded if `None`).
    #[must_use]
    pub fn subpass_coverage(&self, subpass: PassId, coverage_limit: Option<Rect>) -> Option<Rect> {
        self.validate(subpass);
        let s = subpass.idx as usize;
        self.subpass_coverage_at(
            subpass.idx,
            self.transformation[s],
            coverage_limit.unwrap_or(MAXIMUM),
        )
    }

    // -- Internal helpers --

    pub(crate) fn elements_coverage_at(&self, idx: u32) -> Option<Rect> {
        let mut acc: Option<Rect> = None;
        for el in &self.elements[idx as usize] {
            let coverage = match el {
                Element::Entity(entity) => entity.coverage(),
                Element::Subpass(sub) => self.subpass_output_coverage(sub.idx),
            };
            acc = geometry::union(acc, coverage);
            if acc.is_some_and(geometry::is_maximum) {
                return Some(MAXIMUM);
            }
        }
        acc
    }

    /// What a sub-pass paints into its parent, after its image filter.
    fn subpass_output_coverage(&self, idx: u32) -> Option<Rect> {
        let s = idx as usize;
        if self.backdrop_filter[s].is_some() {
            return Some(MAXIMUM);
        }
        if self.delegate[s].can_elide() || self.blend_mode[s] == BlendMode::Destination {
            return None;
        }
        let coverage = self.subpass_coverage_at(idx, self.transformation[s], MAXIMUM)?;
        match self.delegate[s].image_filter() {
            Some(filter) => filter.filter_coverage(coverage, self.transformation[s]),
            None => Some(coverage),
        }
    }

    /// Save-layer coverage of pass `idx` under `effect_transform`.
    pub(crate) fn subpass_coverage_at(
        &self,
        idx: u32,
        effect_transform: Affine,
        coverage_limit: Rect,
    ) -> Option<Rect> {
        let s = idx as usize;
        let content = match self.bounds_limit[s] {
            Some(bounds) => Some(bounds),
            None => self.elements_coverage_at(idx),
        };
        let filter = self.delegate[s].image_filter();
        compute_save_layer_coverage(
            content.unwrap_or(Rect::ZERO),
            effect_transform,
            coverage_limit,
            filter.as_deref(),
            SaveLayerFlags {
                destructive_blend: self.blend_mode[s].should_cover_whole_screen(),
                has_backdrop_filter: self.backdrop_filter[s].is_some(),
                bounds_from_caller: self.bounds_limit[s].is_some(),
            },
        )
    }

    /// Whether rendering the tree at `idx` samples its own render target.
    ///
    /// Sub-passes that composite with an advanced blend count too: their
    /// output is blended by reading back the parent target.
    pub(crate) fn reads_from_target(&self, idx: u32, capabilities: Capabilities) -> bool {
        let p = idx as usize;
        let fetch = capabilities.supports_framebuffer_fetch;
        if self.contains_advanced_blends[p] && !fetch {
            return true;
        }
        self.elements[p].iter().any(|el| match el {
            Element::Entity(_) => false,
            Element::Subpass(sub) => {
                let s = sub.idx as usize;
                self.backdrop_filter[s].is_some()
                    || (self.blend_mode[s].is_advanced() && !fetch)
                    || self.reads_from_target(sub.idx, capabilities)
            }
        })
    }

    fn attach(&mut self, parent: u32, sub: u32) {
        self.superpass[sub as usize] = parent;
        let atlas = Rc::clone(&self.glyph_atlas[parent as usize]);
        if !Rc::ptr_eq(&atlas, &self.glyph_atlas[sub as usize]) {
            atlas.absorb(&self.glyph_atlas[sub as usize]);
        }
        for idx in self.subtree(sub) {
            self.glyph_atlas[idx as usize] = Rc::clone(&atlas);
        }
    }

    fn register_text(&self, p: usize, entity: &Entity) {
        if let Some(frame) = entity.contents.as_ref().and_then(|c| c.text_frame()) {
            self.glyph_atlas[p].add_text_frame(frame.clone());
        }
    }

    /// Re-registers the text frames of the whole tree containing `idx`, so
    /// the shared atlas holds exactly what the tree still draws.
    fn resync_text(&self, idx: u32) {
        let mut root = idx;
        while self.superpass[root as usize] != INVALID {
            root = self.superpass[root as usize];
        }
        let frames = self
            .subtree(root)
            .into_iter()
            .flat_map(|p| &self.elements[p as usize])
            .filter_map(|el| match el {
                Element::Entity(entity) => entity.contents.as_ref()?.text_frame().cloned(),
                Element::Subpass(_) => None,
            })
            .collect();
        self.glyph_atlas[root as usize].replace_frames(frames);
    }

    fn refresh_advanced_blends(&mut self, p: u32) {
        self.contains_advanced_blends[p as usize] = self.elements[p as usize]
            .iter()
            .any(|el| matches!(el, Element::Entity(e) if e.blend_mode.is_advanced()));
    }

    /// Returns whether `candidate` is `of` or one of its superpasses.
    fn is_ancestor(&self, candidate: PassId, of: PassId) -> bool {
        let mut idx = of.idx;
        while idx != INVALID {
            if idx == candidate.idx {
                return true;
            }
            idx = self.superpass[idx as usize];
        }
        false
    }

    /// Slot indices of `root` and everything below it, preorder.
    fn subtree(&self, root: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            for el in self.elements[idx as usize].iter().rev() {
                if let Element::Subpass(sub) = el {
                    stack.push(sub.idx);
                }
            }
        }
        out
    }

    fn depth_of(&self, idx: u32) -> usize {
        1 + self.elements[idx as usize]
            .iter()
            .filter_map(|el| match el {
                Element::Subpass(sub) => Some(self.depth_of(sub.idx)),
                Element::Entity(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn clone_subtree(&mut self, src: u32, superpass: u32, atlas: &Rc<LazyGlyphAtlas>) -> PassId {
        let id = self.create_pass();
        let (s, d) = (src as usize, id.idx as usize);
        self.superpass[d] = superpass;
        self.transformation[d] = self.transformation[s];
        self.stencil_depth[d] = self.stencil_depth[s];
        self.blend_mode[d] = self.blend_mode[s];
        self.backdrop_filter[d] = self.backdrop_filter[s].clone();
        self.delegate[d] = Rc::clone(&self.delegate[s]);
        self.bounds_limit[d] = self.bounds_limit[s];
        self.contains_advanced_blends[d] = self.contains_advanced_blends[s];
        self.glyph_atlas[d] = Rc::clone(atlas);

        let source = self.elements[s].clone();
        let mut copied = Vec::with_capacity(source.len());
        for el in source {
            copied.push(match el {
                Element::Entity(entity) => {
                    self.register_text(d, &entity);
                    Element::Entity(entity)
                }
                Element::Subpass(sub) => {
                    Element::Subpass(self.clone_subtree(sub.idx, id.idx, atlas))
                }
            });
        }
        self.elements[d] = copied;
        id
    }

    fn destroy_subtree(&mut self, root: u32) {
        for idx in self.subtree(root) {
            let i = idx as usize;
            self.elements[i].clear();
            self.superpass[i] = INVALID;
            self.transformation[i] = Affine::IDENTITY;
            self.stencil_depth[i] = 0;
            self.blend_mode[i] = BlendMode::SourceOver;
            self.backdrop_filter[i] = None;
            self.bounds_limit[i] = None;
            self.contains_advanced_blends[i] = false;
            // Bump generation so old handles immediately fail validation.
            self.generation[i] += 1;
            self.free_list.push(idx);
        }
    }

    fn visit(&self, idx: u32, f: &mut impl FnMut(&Entity) -> bool) -> bool {
        for el in &self.elements[idx as usize] {
            let keep_going = match el {
                Element::Entity(entity) => f(entity),
                Element::Subpass(sub) => self.visit(sub.idx, f),
            };
            if !keep_going {
                return false;
            }
        }
        true
    }

    fn visit_mut(&mut self, idx: u32, f: &mut impl FnMut(&mut Entity) -> bool) -> bool {
        let mut completed = true;
        for i in 0..self.elements[idx as usize].len() {
            let keep_going = match &mut self.elements[idx as usize][i] {
                Element::Entity(entity) => f(entity),
                Element::Subpass(sub) => {
                    let sub = sub.idx;
                    self.visit_mut(sub, f)
                }
            };
            if !keep_going {
                completed = false;
                break;
            }
        }
        self.refresh_advanced_blends(idx);
        completed
    }

    pub(crate) fn validate(&self, id: PassId) {
        assert!(
            self.is_alive(id),
            "stale PassId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::contents::{MatrixFilter, SolidColorContents, TextContents};
    use crate::glyph_atlas::{GlyphKey, PositionedGlyph, TextFrame};
    use crate::pass::PaintPassDelegate;
    use kurbo::Point;

    fn solid(rect: Rect) -> Entity {
        Entity::new(Rc::new(SolidColorContents::rect(rect, Color::RED)))
    }

    fn text(font: u32) -> Entity {
        let frame = TextFrame::new(vec![PositionedGlyph {
            key: GlyphKey { font, glyph: 1 },
            position: Point::new(0.0, 10.0),
            bounds: Rect::new(0.0, -8.0, 6.0, 2.0),
        }]);
        Entity::new(Rc::new(TextContents::new(frame, Color::BLACK)))
    }

    #[test]
    fn create_and_destroy() {
        let mut store = PassStore::new();
        let id = store.create_pass();
        assert!(store.is_alive(id));
        assert!(store.is_root(id));
        store.destroy_pass(id);
        assert!(!store.is_alive(id));
        assert_eq!(store.pass_count(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut store = PassStore::new();
        let id1 = store.create_pass();
        store.destroy_pass(id1);
        let id2 = store.create_pass();
        assert!(!store.is_alive(id1));
        assert!(store.is_alive(id2));
        assert_eq!(id1.index(), id2.index());
        assert_ne!(id1.generation(), id2.generation());
    }

    #[test]
    fn destroy_is_recursive_and_detaches() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let mid = store.create_pass();
        let leaf = store.create_pass();
        store.add_subpass(mid, leaf);
        store.add_subpass(root, mid);

        store.destroy_pass(mid);
        assert!(!store.is_alive(mid));
        assert!(!store.is_alive(leaf));
        assert!(store.elements(root).is_empty());
    }

    #[test]
    fn add_subpass_sets_superpass() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        assert_eq!(store.add_subpass(root, sub), Some(sub));
        assert_eq!(store.superpass(sub), Some(root));
        assert!(!store.is_root(sub));
        assert!(matches!(store.elements(root), [Element::Subpass(s)] if *s == sub));
    }

    #[test]
    fn add_stale_subpass_is_a_no_op() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.destroy_pass(sub);
        assert_eq!(store.add_subpass(root, sub), None);
        assert!(store.elements(root).is_empty());
    }

    #[test]
    #[should_panic(expected = "subpass already has a superpass")]
    fn subpass_cannot_have_two_owners() {
        let mut store = PassStore::new();
        let a = store.create_pass();
        let b = store.create_pass();
        let sub = store.create_pass();
        store.add_subpass(a, sub);
        store.add_subpass(b, sub);
    }

    #[test]
    #[should_panic(expected = "cannot add an ancestor as a subpass")]
    fn cycles_are_rejected() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_subpass(root, sub);
        store.add_subpass(sub, root);
    }

    #[test]
    #[should_panic(expected = "a pass cannot contain itself")]
    fn self_containment_is_rejected() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_subpass(root, root);
    }

    #[test]
    #[should_panic(expected = "stale PassId")]
    fn stale_handle_panics() {
        let mut store = PassStore::new();
        let id = store.create_pass();
        store.destroy_pass(id);
        let _ = store.elements(id);
    }

    #[test]
    fn advanced_blends_are_tracked() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert!(!store.contains_advanced_blends(root));
        store.add_entity(
            root,
            solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_blend_mode(BlendMode::Multiply),
        );
        assert!(store.contains_advanced_blends(root));

        store.iterate_all_entities_mut(root, |e| {
            e.blend_mode = BlendMode::SourceOver;
            true
        });
        assert!(!store.contains_advanced_blends(root));
    }

    #[test]
    fn subpasses_depth_counts_levels() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        assert_eq!(store.subpasses_depth(root), 1);
        let a = store.create_pass();
        let b = store.create_pass();
        let c = store.create_pass();
        store.add_subpass(b, c);
        store.add_subpass(root, a);
        store.add_subpass(root, b);
        assert_eq!(store.subpasses_depth(root), 3);
        assert_eq!(store.subpasses_depth(a), 1);
    }

    #[test]
    fn iteration_is_depth_first_in_paint_order() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        let nested = store.create_pass();

        store.add_entity(root, solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_stencil_depth(0));
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_stencil_depth(1));
        store.add_entity(nested, solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_stencil_depth(2));
        store.add_subpass(sub, nested);
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_stencil_depth(3));
        store.add_subpass(root, sub);
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_stencil_depth(4));

        let mut seen = Vec::new();
        assert!(store.iterate_all_entities(root, |e| {
            seen.push(e.stencil_depth);
            true
        }));
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        let mut count = 0;
        assert!(!store.iterate_all_entities(root, |_| {
            count += 1;
            count < 2
        }));
        assert_eq!(count, 2);
    }

    #[test]
    fn set_elements_destroys_dropped_subpasses() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let keep = store.create_pass();
        let drop_me = store.create_pass();
        let fresh = store.create_pass();
        store.add_subpass(root, keep);
        store.add_subpass(root, drop_me);

        store.set_elements(
            root,
            vec![
                Element::Subpass(fresh),
                Element::Entity(
                    solid(Rect::new(0.0, 0.0, 1.0, 1.0)).with_blend_mode(BlendMode::Screen),
                ),
                Element::Subpass(keep),
            ],
        );
        assert!(!store.is_alive(drop_me));
        assert_eq!(store.superpass(fresh), Some(root));
        assert_eq!(store.superpass(keep), Some(root));
        assert_eq!(store.elements(root).len(), 3);
        assert!(store.contains_advanced_blends(root));
    }

    #[test]
    #[should_panic(expected = "subpass is owned by another pass")]
    fn set_elements_rejects_foreign_subpass() {
        let mut store = PassStore::new();
        let a = store.create_pass();
        let b = store.create_pass();
        let sub = store.create_pass();
        store.add_subpass(a, sub);
        store.set_elements(b, vec![Element::Subpass(sub)]);
    }

    #[test]
    fn elements_coverage_unions_entities_and_subpasses() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        assert_eq!(store.elements_coverage(root), None);

        store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0)));
        store.set_transformation(sub, Affine::translate((20.0, 0.0)));
        store.add_subpass(root, sub);
        assert_eq!(
            store.elements_coverage(root),
            Some(Rect::new(0.0, 0.0, 30.0, 10.0))
        );

        store.add_entity(
            root,
            Entity::new(Rc::new(SolidColorContents::cover(Color::BLUE))),
        );
        assert_eq!(store.elements_coverage(root), Some(MAXIMUM));
    }

    #[test]
    fn elements_coverage_maps_subpass_through_its_filter() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0)));
        store.set_delegate(
            sub,
            Rc::new(PaintPassDelegate::new(1.0).with_image_filter(Rc::new(MatrixFilter::new(
                Affine::scale(2.0),
            )))),
        );
        store.add_subpass(root, sub);
        assert_eq!(
            store.elements_coverage(root),
            Some(Rect::new(0.0, 0.0, 20.0, 20.0))
        );
    }

    #[test]
    fn subpass_coverage_floods_for_destructive_blend() {
        let mut store = PassStore::new();
        let sub = store.create_pass();
        store.add_entity(sub, solid(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let limit = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            store.subpass_coverage(sub, Some(limit)),
            Some(Rect::new(0.0, 0.0, 10.0, 10.0))
        );
        store.set_blend_mode(sub, BlendMode::Source);
        assert_eq!(store.subpass_coverage(sub, Some(limit)), Some(limit));

        store.set_bounds_limit(sub, Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
        assert_eq!(
            store.subpass_coverage(sub, Some(limit)),
            Some(Rect::new(0.0, 0.0, 5.0, 5.0))
        );
    }

    #[test]
    fn empty_subpass_with_backdrop_floods() {
        let mut store = PassStore::new();
        let sub = store.create_pass();
        let limit = Rect::new(0.0, 0.0, 50.0, 40.0);
        assert_eq!(store.subpass_coverage(sub, Some(limit)), None);
        store.set_backdrop_filter(
            sub,
            Some(crate::contents::backdrop_filter(Rc::new(MatrixFilter::new(
                Affine::IDENTITY,
            )))),
        );
        assert_eq!(store.subpass_coverage(sub, Some(limit)), Some(limit));
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(root, solid(Rect::new(0.0, 0.0, 10.0, 10.0)));
        store.add_entity(sub, solid(Rect::new(5.0, 5.0, 30.0, 30.0)));
        store.add_subpass(root, sub);

        let copy = store.clone_pass(root);
        assert!(store.is_root(copy));
        assert_eq!(store.elements_coverage(copy), store.elements_coverage(root));

        let Element::Subpass(copied_sub) = store.elements(copy)[1] else {
            panic!("clone keeps element order");
        };
        assert_ne!(copied_sub, sub);
        assert_eq!(store.superpass(copied_sub), Some(copy));
        assert_eq!(store.superpass(sub), Some(root));

        store.add_entity(copy, solid(Rect::new(100.0, 100.0, 110.0, 110.0)));
        store.set_transformation(copied_sub, Affine::scale(3.0));
        assert_eq!(store.elements(root).len(), 2);
        assert_eq!(store.transformation(sub), Affine::IDENTITY);
        assert_eq!(
            store.elements_coverage(root),
            Some(Rect::new(0.0, 0.0, 30.0, 30.0))
        );
    }

    #[test]
    fn rebuilding_elements_keeps_the_atlas_bounded() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let label = text(1);
        for _ in 0..100 {
            store.set_elements(root, vec![Element::Entity(label.clone())]);
        }
        assert_eq!(store.glyph_atlas(root).frame_count(), 1);

        store.set_elements(root, vec![Element::Entity(text(2))]);
        let atlas = store.glyph_atlas(root).create_or_get_atlas();
        assert_eq!(atlas.len(), 1);
        assert_eq!(atlas.slot(GlyphKey { font: 1, glyph: 1 }), None);
        assert!(atlas.slot(GlyphKey { font: 2, glyph: 1 }).is_some());
    }

    #[test]
    fn destroyed_subpass_text_leaves_the_atlas() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        store.add_entity(root, text(1));
        store.add_entity(sub, text(2));
        store.add_subpass(root, sub);
        assert_eq!(store.glyph_atlas(root).frame_count(), 2);

        store.destroy_pass(sub);
        assert_eq!(store.glyph_atlas(root).frame_count(), 1);
        assert_eq!(store.glyph_atlas(root).create_or_get_atlas().len(), 1);
    }

    #[test]
    fn subtree_shares_one_glyph_atlas() {
        let mut store = PassStore::new();
        let root = store.create_pass();
        let sub = store.create_pass();
        let nested = store.create_pass();
        store.add_entity(nested, text(1));
        store.add_subpass(sub, nested);
        store.add_entity(sub, text(2));
        store.add_entity(root, text(3));
        store.add_subpass(root, sub);

        let atlas = store.glyph_atlas(root);
        assert!(Rc::ptr_eq(atlas, store.glyph_atlas(sub)));
        assert!(Rc::ptr_eq(atlas, store.glyph_atlas(nested)));
        assert_eq!(atlas.frame_count(), 3);
        assert_eq!(atlas.create_or_get_atlas().len(), 3);

        let copy = store.clone_pass(root);
        assert!(!Rc::ptr_eq(store.glyph_atlas(copy), store.glyph_atlas(root)));
        assert_eq!(store.glyph_atlas(copy).frame_count(), 3);
    }
}
