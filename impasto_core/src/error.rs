// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render failures.
//!
//! Culling is never an error: empty or disjoint coverage is expressed as
//! `None` or [`EntityResult::Empty`](crate::pass::EntityResult::Empty).
//! Everything here aborts the frame being rendered and is propagated to the
//! outermost [`PassStore::render`](crate::pass::PassStore::render) call
//! without retry.

use thiserror::Error;

/// Result alias for fallible rendering operations.
pub type Result<T, E = RenderError> = core::result::Result<T, E>;

/// A failure reported by the renderer or by contents while rendering a frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A texture could not be allocated.
    #[error("could not allocate {width}x{height} texture for {label}")]
    TextureAllocation {
        /// What the texture was for.
        label: &'static str,
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// A command buffer could not be created.
    #[error("could not create command buffer")]
    CommandBuffer,

    /// A render pass could not be started or ended.
    #[error("render pass failure: {0}")]
    RenderPass(&'static str),

    /// A blit between textures failed.
    #[error("blit failure: {0}")]
    BlitPass(&'static str),

    /// Submitting a command buffer failed.
    #[error("could not submit command buffer")]
    Submit,

    /// A draw could not be encoded with the requested pipeline.
    #[error("pipeline failure: {0}")]
    Pipeline(&'static str),

    /// Contents failed to render for a reason of their own.
    #[error("contents failed to render: {0}")]
    Contents(&'static str),
}
