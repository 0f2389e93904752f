use anyhow::Result;
use glam::Mat4;

use super::batch::{PrimitiveMode, Vertex};
use super::ctx::RenderCtx;

// ── uniform slots ─────────────────────────────────────────────────────────

/// Value kind a uniform slot accepts.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UniformKind {
    Int,
    Float,
    Mat4,
}

impl UniformKind {
    /// Size of one value of this kind in the uniform buffer.
    pub fn byte_size(self) -> u64 {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Mat4 => 64,
        }
    }

    /// WGSL alignment requirement for this kind.
    fn alignment(self) -> u64 {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Mat4 => 16,
        }
    }
}

/// A typed uniform value, staged CPU-side until upload.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// One named uniform: a byte offset into the owning program's uniform buffer
/// plus the staged-value dirty state.
///
/// `staged` doubles as the dirty flag: `Some` means "dirty with these bytes",
/// and the upload pass takes it atomically, clearing the flag in the same
/// step.
#[derive(Debug)]
pub struct UniformSlot {
    name: String,
    offset: u64,
    kind: UniformKind,
    staged: Option<UniformValue>,
}

impl UniformSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UniformKind {
        self.kind
    }

    /// Byte offset within the owning program's uniform buffer.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_dirty(&self) -> bool {
        self.staged.is_some()
    }

    /// Stages a value and marks the slot dirty. No GPU call happens here.
    ///
    /// Panics when the value kind does not match the slot: that is a caller
    /// bug, not a runtime condition.
    pub fn set(&mut self, value: UniformValue) {
        assert_eq!(
            value.kind(),
            self.kind,
            "uniform `{}` expects {:?}",
            self.name,
            self.kind
        );
        self.staged = Some(value);
    }

    pub fn set_i32(&mut self, value: i32) {
        self.set(UniformValue::Int(value));
    }

    pub fn set_f32(&mut self, value: f32) {
        self.set(UniformValue::Float(value));
    }

    pub fn set_mat4(&mut self, value: Mat4) {
        self.set(UniformValue::Mat4(value));
    }

    fn take_staged(&mut self) -> Option<UniformValue> {
        self.staged.take()
    }
}

/// The uniform slots of one shader program, laid out in declaration order
/// with WGSL alignment.
///
/// Lookup by a name that was never declared returns `None`; it is not an
/// error (callers set what they know, programs declare what they have).
#[derive(Debug)]
pub struct UniformBlock {
    slots: Vec<UniformSlot>,
    byte_size: u64,
}

impl UniformBlock {
    pub fn new(decls: &[(&str, UniformKind)]) -> Self {
        let mut slots = Vec::with_capacity(decls.len());
        let mut offset = 0u64;

        for &(name, kind) in decls {
            offset = offset.next_multiple_of(kind.alignment());
            slots.push(UniformSlot {
                name: name.to_string(),
                offset,
                kind,
                staged: None,
            });
            offset += kind.byte_size();
        }

        Self {
            slots,
            // WGSL rounds a uniform struct's size up to its alignment.
            byte_size: offset.next_multiple_of(16),
        }
    }

    /// Total buffer size covering every slot, in bytes.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn get(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut UniformSlot> {
        self.slots.iter_mut().find(|slot| slot.name == name)
    }

    /// Takes every staged value, handing `(offset, bytes)` to `write`.
    ///
    /// Each dirty slot produces exactly one write and comes out clean; clean
    /// slots produce nothing.
    pub fn drain_dirty(&mut self, mut write: impl FnMut(u64, &[u8])) {
        for slot in &mut self.slots {
            if let Some(value) = slot.take_staged() {
                match value {
                    UniformValue::Int(v) => write(slot.offset, bytemuck::bytes_of(&v)),
                    UniformValue::Float(v) => write(slot.offset, bytemuck::bytes_of(&v)),
                    UniformValue::Mat4(m) => write(slot.offset, bytemuck::bytes_of(&m)),
                }
            }
        }
    }
}

// ── shader program ────────────────────────────────────────────────────────

/// Everything needed to build a [`ShaderProgram`].
pub struct ShaderDesc<'a> {
    /// Program name, used in labels and diagnostics.
    pub name: &'a str,
    pub vertex_src: &'a str,
    pub fragment_src: &'a str,
    /// Uniforms this program's WGSL block declares, in declaration order.
    pub uniforms: &'a [(&'a str, UniformKind)],
    /// Whether the fragment stage samples a texture (bind group 1).
    pub samples_texture: bool,
}

/// A linked vertex+fragment pair with its uniform state.
///
/// wgpu bakes primitive topology into pipelines, so "linking" produces one
/// pipeline per [`PrimitiveMode`]; the pair shares the uniform buffer and
/// bind group. Stage modules are dropped once the pipelines exist.
pub struct ShaderProgram {
    name: String,
    uniforms: UniformBlock,
    ubo: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture_layout: Option<wgpu::BindGroupLayout>,
    triangles: wgpu::RenderPipeline,
    line_strip: wgpu::RenderPipeline,
}

impl ShaderProgram {
    /// Compiles both stages and links the per-mode pipelines.
    ///
    /// Compile and link failures are fatal: they carry the stage or program
    /// name plus the wgpu diagnostic, and no partially-built program is ever
    /// returned.
    pub fn new(ctx: &RenderCtx<'_>, desc: &ShaderDesc<'_>) -> Result<Self> {
        let device = ctx.device;

        let vertex = compile_stage(device, desc.name, "vertex", desc.vertex_src)?;
        let fragment = compile_stage(device, desc.name, "fragment", desc.fragment_src)?;

        let uniforms = UniformBlock::new(desc.uniforms);

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("quadfall {} ubo", desc.name)),
            size: uniforms.byte_size().max(16),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("quadfall {} uniform bgl", desc.name)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(uniforms.byte_size()),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("quadfall {} bind group", desc.name)),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        let texture_layout = desc.samples_texture.then(|| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("quadfall {} texture bgl", desc.name)),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            })
        });

        let mut layouts: Vec<&wgpu::BindGroupLayout> = vec![&uniform_layout];
        if let Some(texture_layout) = texture_layout.as_ref() {
            layouts.push(texture_layout);
        }

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("quadfall {} pipeline layout", desc.name)),
            bind_group_layouts: &layouts,
            immediate_size: 0,
        });

        // "Link": build one pipeline per primitive mode from the compiled
        // stages, then let the stage modules drop.
        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let triangles = create_pipeline(
            device,
            desc.name,
            &pipeline_layout,
            &vertex,
            &fragment,
            ctx.surface_format,
            PrimitiveMode::Triangles,
        );
        let line_strip = create_pipeline(
            device,
            desc.name,
            &pipeline_layout,
            &vertex,
            &fragment,
            ctx.surface_format,
            PrimitiveMode::LineStrip,
        );
        if let Some(err) = pollster::block_on(error_scope.pop()) {
            anyhow::bail!("failed to link the `{}` program: {err}", desc.name);
        }

        Ok(Self {
            name: desc.name.to_string(),
            uniforms,
            ubo,
            bind_group,
            texture_layout,
            triangles,
            line_strip,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a uniform slot; `None` for names this program never declared.
    pub fn get_uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.get(name)
    }

    pub fn uniform_mut(&mut self, name: &str) -> Option<&mut UniformSlot> {
        self.uniforms.get_mut(name)
    }

    /// Uploads every dirty uniform and clears its dirty state.
    ///
    /// Multiple `set` calls per frame collapse into at most one GPU write per
    /// uniform; calling this twice without an intervening `set` writes
    /// nothing the second time.
    pub fn upload_uniforms(&mut self, queue: &wgpu::Queue) {
        let ubo = &self.ubo;
        self.uniforms
            .drain_dirty(|offset, bytes| queue.write_buffer(ubo, offset, bytes));
    }

    /// Whether the fragment stage samples a texture (bind group 1).
    pub fn samples_texture(&self) -> bool {
        self.texture_layout.is_some()
    }

    /// Layout for the texture bind group, when this program samples one.
    pub fn texture_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.texture_layout.as_ref()
    }

    pub(crate) fn pipeline(&self, mode: PrimitiveMode) -> &wgpu::RenderPipeline {
        match mode {
            PrimitiveMode::Triangles => &self.triangles,
            PrimitiveMode::LineStrip => &self.line_strip,
        }
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Compiles one WGSL stage inside a validation error scope, so a failure
/// reports the stage name and the compiler diagnostic instead of panicking
/// deep inside wgpu.
fn compile_stage(
    device: &wgpu::Device,
    program: &str,
    stage: &str,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("quadfall {program} {stage} shader")),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(error_scope.pop()) {
        anyhow::bail!("failed to compile the {stage} shader of `{program}`: {err}");
    }
    Ok(module)
}

fn create_pipeline(
    device: &wgpu::Device,
    name: &str,
    layout: &wgpu::PipelineLayout,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    mode: PrimitiveMode,
) -> wgpu::RenderPipeline {
    let (topology, strip_index_format) = match mode {
        PrimitiveMode::Triangles => (wgpu::PrimitiveTopology::TriangleList, None),
        PrimitiveMode::LineStrip => (
            wgpu::PrimitiveTopology::LineStrip,
            Some(wgpu::IndexFormat::Uint32),
        ),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("quadfall {name} {mode:?} pipeline")),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrices_block() -> UniformBlock {
        UniformBlock::new(&[
            ("projection", UniformKind::Mat4),
            ("model_view", UniformKind::Mat4),
        ])
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn mat4_slots_pack_back_to_back() {
        let block = matrices_block();
        assert_eq!(block.get("projection").map(UniformSlot::offset), Some(0));
        assert_eq!(block.get("model_view").map(UniformSlot::offset), Some(64));
        assert_eq!(block.byte_size(), 128);
    }

    #[test]
    fn scalar_after_mat4_is_padded_into_the_tail() {
        let block = UniformBlock::new(&[
            ("transform", UniformKind::Mat4),
            ("tint", UniformKind::Float),
        ]);
        assert_eq!(block.get("tint").map(UniformSlot::offset), Some(64));
        // Struct size rounds up to the 16-byte alignment.
        assert_eq!(block.byte_size(), 80);
    }

    #[test]
    fn undeclared_uniform_is_not_found() {
        let block = matrices_block();
        assert!(block.get("sampler").is_none());
    }

    // ── dirty tracking ────────────────────────────────────────────────────

    #[test]
    fn set_marks_dirty_and_drain_clears_once() {
        let mut block = matrices_block();
        block
            .get_mut("projection")
            .expect("declared above")
            .set_mat4(Mat4::IDENTITY);

        assert!(block.get("projection").is_some_and(UniformSlot::is_dirty));
        assert!(!block.get("model_view").is_some_and(UniformSlot::is_dirty));

        let mut writes = Vec::new();
        block.drain_dirty(|offset, bytes| writes.push((offset, bytes.len())));
        assert_eq!(writes, vec![(0, 64)]);

        // No intervening set: a second drain writes nothing.
        let mut writes = Vec::new();
        block.drain_dirty(|offset, _| writes.push(offset));
        assert!(writes.is_empty());
    }

    #[test]
    fn repeated_sets_collapse_into_one_write() {
        let mut block = UniformBlock::new(&[("tick", UniformKind::Int)]);
        let slot = block.get_mut("tick").expect("declared above");
        slot.set_i32(1);
        slot.set_i32(2);

        let mut writes = Vec::new();
        block.drain_dirty(|offset, bytes| writes.push((offset, bytes.to_vec())));
        assert_eq!(writes, vec![(0, 2i32.to_le_bytes().to_vec())]);
    }

    #[test]
    fn float_values_round_trip_through_staging() {
        let mut block = UniformBlock::new(&[("alpha", UniformKind::Float)]);
        block.get_mut("alpha").expect("declared above").set_f32(0.5);

        let mut bytes = Vec::new();
        block.drain_dirty(|_, staged| bytes.extend_from_slice(staged));
        assert_eq!(bytes, 0.5f32.to_le_bytes());
    }

    #[test]
    #[should_panic(expected = "expects Mat4")]
    fn kind_mismatch_panics() {
        let mut block = matrices_block();
        block
            .get_mut("projection")
            .expect("declared above")
            .set_i32(0);
    }
}
