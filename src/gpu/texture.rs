//! Sampled-texture abstraction for billboard atlases.

use crate::error::OrbisError;

/// A sampled 2D RGBA8 texture with its default view.
///
/// Billboard collections bind one of these as their sprite atlas; each
/// sprite's texture rect selects a sub-region of it.
pub struct Texture2D {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view.
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl Texture2D {
    /// Upload a texture from tightly-packed RGBA8 pixel rows (top row
    /// first).
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::InvalidArgument`] if `pixels` is not exactly
    /// `width * height * 4` bytes or either dimension is zero.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, OrbisError> {
        if width == 0 || height == 0 {
            return Err(OrbisError::InvalidArgument(
                "texture dimensions must be non-zero",
            ));
        }
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(OrbisError::InvalidArgument(
                "pixel data length does not match texture dimensions",
            ));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width,
            height,
        })
    }

    /// Texture width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Texture height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// A depth attachment matching [`super::render_context::DEPTH_FORMAT`].
pub struct DepthTarget {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// A default full-texture view, ready to use as a depth attachment.
    pub view: wgpu::TextureView,
}

impl DepthTarget {
    /// Create a depth target with the given dimensions.
    #[must_use]
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: super::render_context::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}
