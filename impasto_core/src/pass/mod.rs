// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity passes: the compositing tree and its render walk.
//!
//! A pass is an ordered list of [`Element`]s, each either an
//! [`Entity`](crate::entity::Entity) or a nested sub-pass. Sub-passes are
//! save layers: they can carry their own transform, blend mode, stencil
//! depth, backdrop filter, and a delegate that supplies group opacity or an
//! image filter.
//!
//! Passes live in a [`PassStore`] arena and are addressed by generational
//! [`PassId`] handles. The store owns the tree structure; a sub-pass's
//! superpass link is an index, never an owning reference.
//!
//! [`PassStore::render`] walks a tree and records it through a
//! [`Renderer`](crate::renderer::Renderer). Each sub-pass is resolved to one
//! of four outcomes (see [`SubpassDecision`](crate::trace::SubpassDecision)):
//!
//! - **elided** when it cannot change any pixel,
//! - **culled** when its coverage is empty or clipped away,
//! - **collapsed** when it can be drawn straight into its parent,
//! - **offscreen** otherwise: it is rendered into a texture sized by
//!   [`compute_save_layer_coverage`](crate::coverage::compute_save_layer_coverage)
//!   and composited back as a single entity.

mod delegate;
mod id;
mod render;
mod store;

pub use delegate::{DefaultPassDelegate, EntityPassDelegate, PaintPassDelegate};
pub use id::PassId;
pub use render::EntityResult;
pub use store::{Element, PassStore};
