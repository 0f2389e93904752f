use anyhow::{Context, Result};

use super::batch::{PrimitiveMode, QuadBatch};
use super::ctx::{RenderCtx, RenderTarget};
use super::matrix::MatrixStack;
use super::shader::{ShaderDesc, ShaderProgram, UniformKind};
use super::texture::Texture2d;

/// Handle to one of the renderer's built-in programs.
///
/// The nullable "current shader" reference is `Option<ShaderId>` on the
/// renderer; `use_shader(None)` is the unbind.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderId {
    /// Flat-colored geometry (the border pass).
    PosColor,
    /// Textured, tinted geometry (the cell pass).
    PosColorTex,
}

/// The render orchestrator.
///
/// Owns the two shader programs, the shared [`QuadBatch`], the projection
/// matrix and the model-view matrix stack. Constructed explicitly and passed
/// by reference to whoever owns the frame loop; there is no global instance.
///
/// Within a frame the caller contract is: bind a shader, set up matrices,
/// upload uniforms, emit geometry, flush, in that order. The orchestrator
/// panics on sequencing bugs (no shader bound, unbalanced stack) rather than
/// recovering.
pub struct Renderer {
    pos_color: ShaderProgram,
    pos_color_tex: ShaderProgram,
    current: Option<ShaderId>,
    batch: QuadBatch,
    pub projection: MatrixStack,
    pub model_view: MatrixStack,
}

const MATRIX_UNIFORMS: &[(&str, UniformKind)] = &[
    ("projection", UniformKind::Mat4),
    ("model_view", UniformKind::Mat4),
];

impl Renderer {
    /// Compiles and links both programs. Fatal on any compile/link failure.
    pub fn new(ctx: &RenderCtx<'_>) -> Result<Self> {
        let pos_color = ShaderProgram::new(
            ctx,
            &ShaderDesc {
                name: "pos_color",
                vertex_src: include_str!("shaders/pos_color.vert.wgsl"),
                fragment_src: include_str!("shaders/pos_color.frag.wgsl"),
                uniforms: MATRIX_UNIFORMS,
                samples_texture: false,
            },
        )
        .context("failed to build the pos_color program")?;

        let pos_color_tex = ShaderProgram::new(
            ctx,
            &ShaderDesc {
                name: "pos_color_tex",
                vertex_src: include_str!("shaders/pos_color_tex.vert.wgsl"),
                fragment_src: include_str!("shaders/pos_color_tex.frag.wgsl"),
                uniforms: MATRIX_UNIFORMS,
                samples_texture: true,
            },
        )
        .context("failed to build the pos_color_tex program")?;

        Ok(Self {
            pos_color,
            pos_color_tex,
            current: None,
            batch: QuadBatch::new(),
            projection: MatrixStack::new(2),
            model_view: MatrixStack::new(8),
        })
    }

    /// Selects the shader used by subsequent uniform and flush calls, or
    /// unbinds with `None`.
    ///
    /// Switching programs migrates no uniform state: each program keeps its
    /// own slots.
    pub fn use_shader(&mut self, shader: Option<ShaderId>) {
        self.current = shader;
    }

    pub fn current_shader_id(&self) -> Option<ShaderId> {
        self.current
    }

    pub fn shader(&self, id: ShaderId) -> &ShaderProgram {
        match id {
            ShaderId::PosColor => &self.pos_color,
            ShaderId::PosColorTex => &self.pos_color_tex,
        }
    }

    pub fn shader_mut(&mut self, id: ShaderId) -> &mut ShaderProgram {
        match id {
            ShaderId::PosColor => &mut self.pos_color,
            ShaderId::PosColorTex => &mut self.pos_color_tex,
        }
    }

    pub fn current_shader(&self) -> Option<&ShaderProgram> {
        self.current.map(|id| self.shader(id))
    }

    /// Stages the current projection and model-view matrices into the bound
    /// shader's matching uniform slots, marking them dirty.
    ///
    /// A program that lacks one of the slots is left alone. Panics when no
    /// shader is bound.
    pub fn setup_matrices(&mut self) {
        let projection = self.projection.current();
        let model_view = self.model_view.current();

        let current = self
            .current
            .expect("setup_matrices() with no shader bound");
        let shader = self.shader_mut(current);

        if let Some(slot) = shader.uniform_mut("projection") {
            slot.set_mat4(projection);
        }
        if let Some(slot) = shader.uniform_mut("model_view") {
            slot.set_mat4(model_view);
        }
    }

    /// Uploads the bound shader's dirty uniforms. Panics when no shader is
    /// bound.
    pub fn upload_uniforms(&mut self, ctx: &RenderCtx<'_>) {
        let current = self
            .current
            .expect("upload_uniforms() with no shader bound");
        self.shader_mut(current).upload_uniforms(ctx.queue);
    }

    /// The shared drawing surface. One batch is in flight at a time; batches
    /// do not nest.
    pub fn batch(&mut self) -> &mut QuadBatch {
        &mut self.batch
    }

    /// Flushes the batch through the bound shader.
    ///
    /// `texture` must be `Some` exactly when the bound shader samples one.
    /// Panics when no shader is bound.
    pub fn flush(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        texture: Option<&Texture2d>,
        mode: PrimitiveMode,
    ) {
        let current = self.current.expect("flush() with no shader bound");
        let shader = match current {
            ShaderId::PosColor => &self.pos_color,
            ShaderId::PosColorTex => &self.pos_color_tex,
        };
        self.batch.flush(ctx, target, shader, texture, mode);
    }
}
