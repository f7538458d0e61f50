// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderers for [`impasto_core`] entity passes.
//!
//! - [`RecordingRenderer`]: logs every renderer call and can fail a chosen
//!   call. Use it to assert on the command stream a pass tree produces.
//! - [`SoftwareRenderer`]: rasterizes draw commands on the CPU, stencil
//!   included. Use it to check what a frame actually looks like.
//!
//! Neither is meant for production output; a GPU backend implements
//! [`Renderer`](impasto_core::renderer::Renderer) the same way.

mod recording;
mod software;

pub use recording::{Operation, RecordedEvent, RecordingRenderer};
pub use software::{SoftwareRenderer, Surface};
