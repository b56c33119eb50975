//! Scene-layer renderables.
//!
//! Contains the billboard batching engine and the per-frame state object
//! the owning scene feeds to every renderable.

pub mod billboard;
pub mod frame_state;

pub use frame_state::FrameState;

use crate::error::OrbisError;
use crate::gpu::render_context::RenderContext;

/// Trait shared by all scene renderables.
///
/// Every renderable splits its per-frame work into a mutable `update`
/// (GPU storage reconciliation, uniform writes) followed by an immutable
/// `draw` into an open render pass. The trait serves as documentation and
/// enables future refactoring (e.g. iterating a renderable list). No
/// dynamic dispatch is used today.
pub trait Renderable {
    /// Reconcile GPU-resident state and upload per-frame uniforms.
    ///
    /// # Errors
    ///
    /// Implementations report unmet render preconditions here.
    fn update(
        &mut self,
        context: &RenderContext,
        frame: &FrameState,
    ) -> Result<(), OrbisError>;

    /// Record draw commands into the pass. Must not touch GPU storage.
    fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>);
}
