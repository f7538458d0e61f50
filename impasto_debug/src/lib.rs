// Copyright 2026 the Impasto Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for impasto
//! diagnostics.
//!
//! This crate provides [`TraceSink`](impasto_core::trace::TraceSink)
//! implementations for inspecting how a pass tree was walked:
//!
//! - [`pretty::PrettyPrintSink`]: one indented line per event.
//! - [`recorder::RecorderSink`]: compact binary recording, read back with
//!   [`recorder::decode`].
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from
//!   recorded bytes, with nested passes shown as nested slices.

pub mod chrome;
pub mod pretty;
pub mod recorder;
