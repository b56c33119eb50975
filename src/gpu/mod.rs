//! GPU resource management: device context, textures, and shared
//! bind-group-layout boilerplate.

pub mod pipeline_helpers;
pub mod render_context;
pub mod texture;
