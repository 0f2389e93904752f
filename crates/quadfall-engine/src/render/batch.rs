use bytemuck::{Pod, Zeroable};

use super::buffer::GrowableBuffer;
use super::ctx::{RenderCtx, RenderTarget};
use super::shader::ShaderProgram;
use super::texture::Texture2d;

/// Initial CPU-side capacity of each geometry buffer.
///
/// Large enough that a full board never grows it; growth is still handled.
const INITIAL_BUFFER_CAPACITY: usize = 256 * 1024;

/// One packed vertex: position, texture coordinate, color.
///
/// `color` is RGBA bytes with alpha fixed at 0xff by the builder; the fourth
/// byte keeps the 20-byte stride 4-aligned as wgpu requires.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [u8; 4],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Self>();

    /// Starts a vertex at `(x, y)` with zero texture coordinates and a white
    /// color.
    #[inline]
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            uv: [0.0, 0.0],
            color: [0xff, 0xff, 0xff, 0xff],
        }
    }

    /// Sets the texture coordinate.
    #[inline]
    pub fn uv(mut self, u: f32, v: f32) -> Self {
        self.uv = [u, v];
        self
    }

    /// Sets the color from a packed `0xRRGGBB` value.
    #[inline]
    pub fn rgb(mut self, rgb: u32) -> Self {
        self.color = [
            (rgb >> 16) as u8,
            (rgb >> 8) as u8,
            rgb as u8,
            0xff,
        ];
        self
    }

    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // uv
        2 => Unorm8x4   // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Primitive mode for a flush.
///
/// Closed outlines are drawn as a line strip whose index list repeats the
/// first index (wgpu has no line-loop topology).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PrimitiveMode {
    #[default]
    Triangles,
    LineStrip,
}

/// Append-only quad/line builder flushed as a single indexed draw call.
///
/// Vertices and indices accumulate in two [`GrowableBuffer`]s between
/// `begin()` and `flush()`. Indices are written relative to the running
/// vertex count, so a primitive's index list may be emitted before its
/// vertices as long as the vertices exist by flush time.
///
/// GPU buffers are created lazily at the first flush. A flush re-creates a
/// GPU buffer (full respecification at the new capacity) only when its CPU
/// side grew during the pass; steady-state frames issue a sub-range update
/// covering exactly the bytes written.
pub struct QuadBatch {
    vertices: GrowableBuffer,
    indices: GrowableBuffer,
    vertex_count: u32,
    in_batch: bool,

    vbo: Option<wgpu::Buffer>,
    ibo: Option<wgpu::Buffer>,
}

impl QuadBatch {
    pub fn new() -> Self {
        Self {
            vertices: GrowableBuffer::new(INITIAL_BUFFER_CAPACITY),
            indices: GrowableBuffer::new(INITIAL_BUFFER_CAPACITY),
            vertex_count: 0,
            in_batch: false,
            vbo: None,
            ibo: None,
        }
    }

    /// Starts a batch: clears both buffers and the running vertex counter.
    ///
    /// Must be called before any `emit` or `indices`.
    pub fn begin(&mut self) {
        self.vertices.begin();
        self.indices.begin();
        self.vertex_count = 0;
        self.in_batch = true;
    }

    /// Appends one vertex record.
    pub fn emit(&mut self, vertex: Vertex) {
        assert!(self.in_batch, "emit() without a preceding begin()");
        self.vertices.put_f32(vertex.position[0]);
        self.vertices.put_f32(vertex.position[1]);
        self.vertices.put_f32(vertex.uv[0]);
        self.vertices.put_f32(vertex.uv[1]);
        for byte in vertex.color {
            self.vertices.put_u8(byte);
        }
        self.vertex_count += 1;
    }

    /// Appends indices given relative to the vertices of the *next* `emit`.
    ///
    /// Each local index is offset by the running vertex count, so callers
    /// describe a primitive with 0-based indices before emitting its
    /// vertices.
    pub fn indices(&mut self, local: &[u32]) {
        assert!(self.in_batch, "indices() without a preceding begin()");
        for &index in local {
            self.indices.put_u32(index + self.vertex_count);
        }
    }

    /// Number of vertices emitted since `begin()`.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices appended since `begin()`.
    pub fn index_count(&self) -> u32 {
        self.indices.count() as u32
    }

    /// Raw vertex bytes accumulated since `begin()`.
    pub fn vertex_bytes(&self) -> &[u8] {
        self.vertices.written()
    }

    /// Accumulated absolute indices, decoded from the index buffer.
    pub fn index_data(&self) -> Vec<u32> {
        self.indices
            .written()
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<u32>)
            .collect()
    }

    /// Uploads the accumulated geometry and issues one indexed draw call,
    /// then clears the batch for reuse.
    ///
    /// A flush with zero emitted vertices is a strict no-op: no buffer
    /// upload, no draw. `texture` must be `Some` exactly when `shader`
    /// samples one.
    pub fn flush(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        shader: &ShaderProgram,
        texture: Option<&Texture2d>,
        mode: PrimitiveMode,
    ) {
        assert!(self.in_batch, "flush() without a preceding begin()");
        assert_eq!(
            shader.samples_texture(),
            texture.is_some(),
            "texture binding does not match shader `{}`",
            shader.name()
        );

        if self.vertex_count == 0 {
            return;
        }

        let vertices_grew = self.vertices.end();
        let indices_grew = self.indices.end();
        let index_count = self.indices.count() as u32;

        // Re-specify a GPU buffer only on first use or growth; otherwise
        // update the written sub-range in place.
        if self.vbo.is_none() || vertices_grew {
            self.vbo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quadfall batch vbo"),
                size: self.vertices.capacity() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if self.ibo.is_none() || indices_grew {
            self.ibo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quadfall batch ibo"),
                size: self.indices.capacity() as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }

        let Some(vbo) = self.vbo.as_ref() else { return };
        let Some(ibo) = self.ibo.as_ref() else { return };

        ctx.queue.write_buffer(vbo, 0, self.vertices.written());
        ctx.queue.write_buffer(ibo, 0, self.indices.written());

        {
            let mut rpass = target
                .encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("quadfall batch pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target.color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });

            rpass.set_pipeline(shader.pipeline(mode));
            rpass.set_bind_group(0, shader.bind_group(), &[]);
            if let Some(texture) = texture {
                rpass.set_bind_group(1, texture.bind_group(), &[]);
            }
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..index_count, 0, 0..1);
        }

        // Ready for the next batch without a caller-side begin().
        self.vertices.begin();
        self.indices.begin();
        self.vertex_count = 0;
    }
}

impl Default for QuadBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── vertex packing ────────────────────────────────────────────────────

    #[test]
    fn vertex_stride_is_packed() {
        assert_eq!(Vertex::STRIDE, 20);
    }

    #[test]
    fn emitted_vertex_bytes_match_field_order() {
        let mut batch = QuadBatch::new();
        batch.begin();
        batch.emit(Vertex::at(1.0, 2.0).uv(0.5, 0.25).rgb(0x0094ff));

        let bytes = batch.vertex_bytes();
        assert_eq!(bytes.len(), Vertex::STRIDE);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &[0x00, 0x94, 0xff, 0xff]);
    }

    #[test]
    fn vertex_count_tracks_emits() {
        let mut batch = QuadBatch::new();
        batch.begin();
        for i in 0..7 {
            batch.emit(Vertex::at(i as f32, 0.0));
        }
        assert_eq!(batch.vertex_count(), 7);
        assert_eq!(batch.vertex_bytes().len(), 7 * Vertex::STRIDE);
    }

    // ── index offsetting ──────────────────────────────────────────────────

    #[test]
    fn local_indices_are_offset_by_prior_emits() {
        let mut batch = QuadBatch::new();
        batch.begin();
        batch.emit(Vertex::at(0.0, 0.0));
        batch.emit(Vertex::at(1.0, 0.0));
        batch.emit(Vertex::at(2.0, 0.0));

        // Issued after 3 emits: locals {0,1,2,2,3,0} become {3,4,5,5,6,3}.
        batch.indices(&[0, 1, 2, 2, 3, 0]);
        assert_eq!(batch.index_data(), &[3, 4, 5, 5, 6, 3]);
    }

    #[test]
    fn indices_may_reference_vertices_not_yet_emitted() {
        let mut batch = QuadBatch::new();
        batch.begin();
        batch.indices(&[0, 1, 2]);
        batch.emit(Vertex::at(0.0, 0.0));
        batch.emit(Vertex::at(1.0, 0.0));
        batch.emit(Vertex::at(0.0, 1.0));

        assert_eq!(batch.index_data(), &[0, 1, 2]);
        assert_eq!(batch.vertex_count(), 3);
    }

    #[test]
    fn two_quads_chain_their_index_ranges() {
        let mut batch = QuadBatch::new();
        batch.begin();
        for _ in 0..2 {
            batch.indices(&[0, 1, 2, 2, 3, 0]);
            for i in 0..4 {
                batch.emit(Vertex::at(i as f32, 0.0));
            }
        }
        assert_eq!(
            batch.index_data(),
            &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]
        );
    }

    // ── contract violations ───────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "without a preceding begin()")]
    fn emit_without_begin_panics() {
        let mut batch = QuadBatch::new();
        batch.emit(Vertex::at(0.0, 0.0));
    }

    #[test]
    #[should_panic(expected = "without a preceding begin()")]
    fn indices_without_begin_panics() {
        let mut batch = QuadBatch::new();
        batch.indices(&[0]);
    }

    #[test]
    fn begin_resets_the_running_counter() {
        let mut batch = QuadBatch::new();
        batch.begin();
        batch.emit(Vertex::at(0.0, 0.0));
        batch.begin();
        batch.indices(&[0]);
        assert_eq!(batch.index_data(), &[0]);
    }
}
