use glam::Mat4;

/// Per-frame camera and viewport state handed to scene renderables.
///
/// The owning scene builds one of these each frame from its camera system
/// and passes it to every [`super::Renderable::update`] call.
#[derive(Debug, Clone, Copy)]
pub struct FrameState {
    /// Combined view-projection matrix ([0,1] depth range, wgpu
    /// convention).
    pub view_proj: Mat4,
    /// Viewport width in physical pixels.
    pub viewport_width: u32,
    /// Viewport height in physical pixels.
    pub viewport_height: u32,
}

impl FrameState {
    /// Frame state from a prebuilt view-projection matrix and viewport
    /// size.
    #[must_use]
    pub fn new(
        view_proj: Mat4,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        Self {
            view_proj,
            viewport_width,
            viewport_height,
        }
    }

    /// Viewport dimensions as floats, for uniform upload.
    pub(crate) fn viewport_size(&self) -> [f32; 2] {
        [self.viewport_width as f32, self.viewport_height as f32]
    }
}
