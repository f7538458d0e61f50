// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity passes and save-layer compositing for 2D rendering.
//!
//! `impasto_core` turns a tree of paint operations into draw commands for a
//! command-buffer renderer. It decides which save layers need an offscreen
//! texture, how large that texture must be, how nested clips map onto a
//! stencil buffer, and when the destination has to be copied so a shader can
//! read it. It is `no_std` compatible (with `alloc`) and stores passes in a
//! struct-of-arrays arena addressed by generational handles.
//!
//! # Architecture
//!
//! ```text
//!   PassStore (tree of passes)
//!       │  add_entity / add_subpass / set_*
//!       ▼
//!   PassStore::render(root, renderer, target)
//!       │
//!       ├─► per sub-pass: elide │ cull │ collapse │ offscreen
//!       │        coverage::compute_save_layer_coverage sizes offscreen targets
//!       │
//!       ├─► per entity: clip-stack update ──► Contents::render
//!       │
//!       ▼
//!   Renderer (command buffers, render passes, draws, blits)
//! ```
//!
//! **[`pass`]**: the pass arena, the per-pass delegate hook, and the render
//! walk.
//!
//! **[`entity`]** and **[`contents`]**: paintable items. Contents cover solid
//! fills, textures, clips, text, and filter graphs.
//!
//! **[`coverage`]**: the save-layer sizing function.
//!
//! **[`blend`]**: the blend-mode set and its per-pixel formulas.
//!
//! **[`renderer`]**: the abstract renderer the walk records into.
//!
//! **[`glyph_atlas`]**: the per-tree glyph atlas shared by nested passes.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and walk events, with a
//! zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod blend;
pub mod color;
pub mod contents;
pub mod coverage;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod glyph_atlas;
pub mod pass;
pub mod renderer;
pub mod trace;
