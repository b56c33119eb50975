//! GPU-resident parallel attribute buffers for one billboard collection.

use wgpu::util::DeviceExt;

use super::attributes::{
    run_bytes, AttributeArrays, DirtyRun, COLOR_STRIDE, PIXEL_OFFSET_STRIDE,
    POSITION_STRIDE, TEXTURE_RECT_STRIDE,
};
use crate::gpu::pipeline_helpers;

const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_DST);

/// Five parallel storage buffers, one slot per live sprite, plus the bind
/// group over them. All buffers share one element count and are created
/// and dropped together; a structural rewrite replaces the whole set.
pub(crate) struct AttributeBufferSet {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    origins: wgpu::Buffer,
    pixel_offsets: wgpu::Buffer,
    texture_rects: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    count: usize,
}

impl AttributeBufferSet {
    /// Bind group layout shared by every attribute buffer set (vertex-stage
    /// storage reads).
    pub(crate) fn bind_group_layout(
        device: &wgpu::Device,
    ) -> wgpu::BindGroupLayout {
        let vertex = wgpu::ShaderStages::VERTEX;
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Billboard Attribute Layout"),
            entries: &[
                pipeline_helpers::readonly_storage(0, vertex),
                pipeline_helpers::readonly_storage(1, vertex),
                pipeline_helpers::readonly_storage(2, vertex),
                pipeline_helpers::readonly_storage(3, vertex),
                pipeline_helpers::readonly_storage(4, vertex),
            ],
        })
    }

    /// Allocate buffers sized exactly to the staging arrays and upload
    /// their full contents. The staging arrays must be non-empty.
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        staging: &AttributeArrays,
    ) -> Self {
        let create = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: USAGE,
            })
        };
        let positions =
            create("Billboard Position Buffer", staging.positions());
        let colors = create("Billboard Color Buffer", staging.colors());
        let origins = create("Billboard Origin Buffer", staging.origins());
        let pixel_offsets =
            create("Billboard Pixel Offset Buffer", staging.pixel_offsets());
        let texture_rects =
            create("Billboard Texture Rect Buffer", staging.texture_rects());

        let bind_group =
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Billboard Attribute Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: colors.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: origins.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: pixel_offsets.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: texture_rects.as_entire_binding(),
                    },
                ],
            });

        Self {
            positions,
            colors,
            origins,
            pixel_offsets,
            texture_rects,
            bind_group,
            count: staging.count(),
        }
    }

    /// Rewrite one contiguous slot run in every attribute buffer from the
    /// staging arrays. The origin write widens to the enclosing 4-byte
    /// aligned window to satisfy `wgpu::COPY_BUFFER_ALIGNMENT`.
    pub(crate) fn write_run(
        &self,
        queue: &wgpu::Queue,
        staging: &AttributeArrays,
        run: DirtyRun,
    ) {
        let (offset, bytes) =
            run_bytes(staging.positions(), POSITION_STRIDE, run);
        queue.write_buffer(&self.positions, offset, bytes);

        let (offset, bytes) = run_bytes(staging.colors(), COLOR_STRIDE, run);
        queue.write_buffer(&self.colors, offset, bytes);

        let (offset, bytes) = staging.origin_window(run);
        queue.write_buffer(&self.origins, offset, bytes);

        let (offset, bytes) =
            run_bytes(staging.pixel_offsets(), PIXEL_OFFSET_STRIDE, run);
        queue.write_buffer(&self.pixel_offsets, offset, bytes);

        let (offset, bytes) =
            run_bytes(staging.texture_rects(), TEXTURE_RECT_STRIDE, run);
        queue.write_buffer(&self.texture_rects, offset, bytes);
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Number of sprite slots (one point-sprite primitive each).
    pub(crate) fn count(&self) -> usize {
        self.count
    }
}
