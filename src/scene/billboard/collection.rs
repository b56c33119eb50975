//! Billboard collection: GPU storage reconciliation and batched drawing.

use super::buffer_set::AttributeBufferSet;
use super::list::{BillboardList, SyncPlan};
use super::record::Billboard;
use crate::error::OrbisError;
use crate::gpu::pipeline_helpers;
use crate::gpu::render_context::{RenderContext, DEPTH_FORMAT};
use crate::gpu::texture::Texture2D;
use crate::options::DisplayOptions;
use crate::scene::{FrameState, Renderable};

/// Per-frame uniform data. Must match the WGSL FrameUniforms struct
/// layout.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    viewport: [f32; 2],
    texture_size: [f32; 2],
    z_offset: f32,
    _pad: [f32; 3],
}

/// Pipeline specialization state; a change forces re-creation at the next
/// update.
#[derive(Clone, Copy, PartialEq, Eq)]
struct PipelineKey {
    wireframe: bool,
    depth_test: bool,
}

struct AtlasBinding {
    bind_group: wgpu::BindGroup,
    size: [f32; 2],
}

/// An ordered collection of [`Billboard`]s drawn with a single instanced
/// draw call.
///
/// Membership changes (add/insert/replace/remove/clear) invalidate every
/// buffer slot and trigger a full storage rewrite at the next render;
/// content changes on live records are uploaded as coalesced partial
/// writes. Per-sprite attributes live in five GPU-resident parallel
/// buffers indexed by each record's buffer offset, which after every
/// render equals the record's position in the list.
///
/// All mutation and rendering must happen on the frame thread; record and
/// membership mutation must not be interleaved with an in-progress
/// `render` call on the same collection.
pub struct BillboardCollection {
    list: BillboardList,
    buffers: Option<AttributeBufferSet>,
    texture: Option<AtlasBinding>,

    shader: wgpu::ShaderModule,
    attribute_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,

    pipeline: wgpu::RenderPipeline,
    pipeline_key: PipelineKey,
    target_format: wgpu::TextureFormat,
    line_mode_supported: bool,

    wireframe: bool,
    depth_test: bool,
    z_offset: f32,
}

impl BillboardCollection {
    /// An empty collection rendering into the context's surface format.
    #[must_use]
    pub fn new(context: &RenderContext) -> Self {
        Self::with_capacity(context, 0)
    }

    /// An empty collection with list capacity reserved for `capacity`
    /// records.
    #[must_use]
    pub fn with_capacity(context: &RenderContext, capacity: usize) -> Self {
        let device = &context.device;
        let shader = device.create_shader_module(wgpu::include_wgsl!(
            "../../../assets/shaders/billboard.wgsl"
        ));

        let uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Billboard Uniform Layout"),
                entries: &[pipeline_helpers::uniform_buffer(
                    0,
                    wgpu::ShaderStages::VERTEX,
                )],
            });
        let attribute_layout = AttributeBufferSet::bind_group_layout(device);
        let texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Billboard Texture Layout"),
                entries: &[
                    pipeline_helpers::texture_2d(0),
                    pipeline_helpers::filtering_sampler(1),
                ],
            });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Billboard Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group =
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Billboard Uniform Bind Group"),
                layout: &uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let sampler =
            pipeline_helpers::linear_sampler(device, "Billboard Atlas Sampler");

        let pipeline_key = PipelineKey {
            wireframe: false,
            depth_test: true,
        };
        let target_format = context.format();
        let pipeline = Self::create_pipeline(
            device,
            &shader,
            target_format,
            &[&uniform_layout, &attribute_layout, &texture_layout],
            pipeline_key,
        );

        Self {
            list: BillboardList::with_capacity(capacity),
            buffers: None,
            texture: None,
            shader,
            attribute_layout,
            texture_layout,
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            sampler,
            pipeline,
            pipeline_key,
            target_format,
            line_mode_supported: context
                .device
                .features()
                .contains(wgpu::Features::POLYGON_MODE_LINE),
            wireframe: false,
            depth_test: true,
            z_offset: 0.0,
        }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        key: PipelineKey,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Billboard Pipeline Layout"),
                bind_group_layouts,
                push_constant_ranges: &[],
            });

        // Fixed blend: src-alpha / one-minus-src-alpha on both channels,
        // no face culling.
        let blend_component = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Billboard Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState {
                        color: blend_component,
                        alpha: blend_component,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                polygon_mode: if key.wireframe {
                    wgpu::PolygonMode::Line
                } else {
                    wgpu::PolygonMode::Fill
                },
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: key.depth_test,
                depth_compare: if key.depth_test {
                    wgpu::CompareFunction::LessEqual
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Bind the sprite atlas texture. Replaces any previous binding.
    pub fn set_texture(
        &mut self,
        context: &RenderContext,
        texture: &Texture2D,
    ) {
        let bind_group =
            context
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Billboard Texture Bind Group"),
                    layout: &self.texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(
                                &texture.view,
                            ),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(
                                &self.sampler,
                            ),
                        },
                    ],
                });
        self.texture = Some(AtlasBinding {
            bind_group,
            size: [texture.width() as f32, texture.height() as f32],
        });
    }

    /// Whether an atlas texture is currently bound.
    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Depth bias in NDC units; positive values pull billboards toward the
    /// viewer.
    pub fn z_offset(&self) -> f32 {
        self.z_offset
    }

    /// Set the depth bias.
    pub fn set_z_offset(&mut self, z_offset: f32) {
        self.z_offset = z_offset;
    }

    /// Whether quads are drawn as wireframe outlines.
    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    /// Toggle wireframe drawing. Takes effect at the next render.
    pub fn set_wireframe(&mut self, wireframe: bool) {
        if wireframe && !self.line_mode_supported {
            log::warn!(
                "wireframe billboards requested but POLYGON_MODE_LINE is \
                 unavailable; drawing filled"
            );
        }
        self.wireframe = wireframe;
    }

    /// Whether billboards are depth-tested against scene geometry.
    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    /// Toggle depth testing. Takes effect at the next render.
    pub fn set_depth_test(&mut self, depth_test: bool) {
        self.depth_test = depth_test;
    }

    /// Apply client display options in one call.
    pub fn apply_display(&mut self, display: &DisplayOptions) {
        self.set_wireframe(display.wireframe);
        self.set_depth_test(display.depth_test);
        self.set_z_offset(display.z_offset);
    }

    /// Append a detached billboard.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::AlreadyOwned`] if the record already belongs
    /// to this or another collection.
    pub fn add(&mut self, billboard: &Billboard) -> Result<(), OrbisError> {
        self.list.add(billboard)
    }

    /// Insert a detached billboard at `index`, shifting later records.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::AlreadyOwned`] for an owned record and
    /// [`OrbisError::InvalidArgument`] if `index > len`.
    pub fn insert(
        &mut self,
        index: usize,
        billboard: &Billboard,
    ) -> Result<(), OrbisError> {
        self.list.insert(index, billboard)
    }

    /// Remove and return the billboard at `index`, detaching it.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::InvalidArgument`] if `index >= len`.
    pub fn remove_at(
        &mut self,
        index: usize,
    ) -> Result<Billboard, OrbisError> {
        self.list.remove_at(index)
    }

    /// Replace the billboard at `index` with a detached record, returning
    /// the displaced (now detached) one.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::AlreadyOwned`] for an owned record and
    /// [`OrbisError::InvalidArgument`] if `index >= len`.
    pub fn replace(
        &mut self,
        index: usize,
        billboard: &Billboard,
    ) -> Result<Billboard, OrbisError> {
        self.list.replace(index, billboard)
    }

    /// Detach and remove the billboard if it is a member; returns whether
    /// it was found.
    pub fn remove(&mut self, billboard: &Billboard) -> bool {
        self.list.remove(billboard)
    }

    /// Detach every member and empty the list. GPU storage is released
    /// lazily at the next render if the collection stays empty.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Number of member billboards.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Whether the record is a member of this collection.
    pub fn contains(&self, billboard: &Billboard) -> bool {
        self.list.contains(billboard)
    }

    /// The billboard at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Billboard> {
        self.list.get(index)
    }

    /// Iterate members in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Billboard> {
        self.list.iter()
    }

    /// Reconcile GPU storage with record state and upload per-frame
    /// uniforms.
    ///
    /// A pending structural change drops the old buffer set and, for a
    /// non-empty list, allocates and fills a fresh one sized exactly to
    /// the member count. Otherwise dirty slots are patched with one write
    /// per contiguous run. Empty collections leave storage unallocated.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::MissingTexture`] if no atlas texture is
    /// bound.
    pub fn update(
        &mut self,
        context: &RenderContext,
        frame: &FrameState,
    ) -> Result<(), OrbisError> {
        match self.list.reconcile() {
            SyncPlan::Clean => {}
            SyncPlan::Rebuild { count } => {
                // Old storage is released before the new set is created.
                self.buffers = None;
                if count > 0 {
                    log::debug!("billboard storage rebuild: {count} slots");
                    self.buffers = Some(AttributeBufferSet::new(
                        &context.device,
                        &self.attribute_layout,
                        self.list.staging(),
                    ));
                }
            }
            SyncPlan::Patch(runs) => {
                if let Some(buffers) = &self.buffers {
                    log::debug!(
                        "billboard storage patch: {} run(s)",
                        runs.len()
                    );
                    for run in runs {
                        buffers.write_run(
                            &context.queue,
                            self.list.staging(),
                            run,
                        );
                    }
                }
            }
        }

        let Some(texture) = &self.texture else {
            return Err(OrbisError::MissingTexture);
        };

        let uniforms = FrameUniforms {
            view_proj: frame.view_proj.to_cols_array_2d(),
            viewport: frame.viewport_size(),
            texture_size: texture.size,
            z_offset: self.z_offset,
            _pad: [0.0; 3],
        };
        context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&uniforms),
        );

        self.ensure_pipeline(context);
        Ok(())
    }

    /// Re-specialize the pipeline when the wireframe/depth-test key
    /// changed since it was built.
    fn ensure_pipeline(&mut self, context: &RenderContext) {
        let wireframe = self.wireframe && self.line_mode_supported;
        let key = PipelineKey {
            wireframe,
            depth_test: self.depth_test,
        };
        if key != self.pipeline_key {
            self.pipeline = Self::create_pipeline(
                &context.device,
                &self.shader,
                self.target_format,
                &[
                    &self.uniform_layout,
                    &self.attribute_layout,
                    &self.texture_layout,
                ],
                key,
            );
            self.pipeline_key = key;
        }
    }

    /// Record the single batched draw call into the pass.
    ///
    /// No-op when the collection is empty (no storage) or no texture is
    /// bound. Each buffer slot is drawn as one quad instance; the vertex
    /// stage expands it to a screen-aligned sprite.
    pub fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>) {
        let (Some(buffers), Some(texture)) =
            (self.buffers.as_ref(), self.texture.as_ref())
        else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, buffers.bind_group(), &[]);
        render_pass.set_bind_group(2, &texture.bind_group, &[]);
        render_pass.draw(0..6, 0..buffers.count() as u32);
    }

    /// Reconcile storage and draw in one call; the once-per-frame entry
    /// point invoked by the owning scene.
    ///
    /// # Errors
    ///
    /// Returns [`OrbisError::MissingTexture`] if no atlas texture is
    /// bound; no draw call is issued.
    pub fn render<'a>(
        &'a mut self,
        context: &RenderContext,
        frame: &FrameState,
        render_pass: &mut wgpu::RenderPass<'a>,
    ) -> Result<(), OrbisError> {
        self.update(context, frame)?;
        self.draw(render_pass);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a BillboardCollection {
    type Item = &'a Billboard;
    type IntoIter = std::slice::Iter<'a, Billboard>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::ops::Index<usize> for BillboardCollection {
    type Output = Billboard;

    // Out-of-range panic is the std::ops::Index contract.
    #[allow(clippy::panic)]
    fn index(&self, index: usize) -> &Billboard {
        match self.list.get(index) {
            Some(billboard) => billboard,
            None => panic!("billboard index {index} out of range"),
        }
    }
}

impl Renderable for BillboardCollection {
    fn update(
        &mut self,
        context: &RenderContext,
        frame: &FrameState,
    ) -> Result<(), OrbisError> {
        self.update(context, frame)
    }

    fn draw<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>) {
        self.draw(render_pass);
    }
}
