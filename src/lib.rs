// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]

//! GPU-accelerated virtual-globe scene rendering engine built on wgpu.
//!
//! Orbis renders dynamic collections of camera-facing sprites (billboards)
//! over a 3D globe with a single draw call per collection, uploading only
//! the per-sprite attribute slots that changed since the previous frame.
//!
//! # Key entry points
//!
//! - [`scene::billboard::BillboardCollection`] - batched billboard renderer
//! - [`scene::billboard::Billboard`] - one sprite record
//! - [`scene::FrameState`] - per-frame camera/viewport state fed to `render`
//! - [`gpu::render_context::RenderContext`] - wgpu device/queue/surface owner
//! - [`options::Options`] - runtime configuration (display toggles)
//!
//! # Architecture
//!
//! Client code mutates sprite records or collection membership; the
//! collection tracks structural vs. content dirtiness. At render time it
//! reconciles GPU storage with sprite state (a full rewrite after any
//! membership change, or coalesced partial writes of just the dirty slots),
//! then binds the fixed alpha-blend pipeline and issues one instanced draw
//! covering every live sprite.

pub mod error;
pub mod gpu;
pub mod options;
pub mod scene;
