//! GPU rendering subsystem.
//!
//! The core is a batched quad renderer: geometry accumulates CPU-side in
//! growable buffers, uploads amortize across frames (a GPU buffer is only
//! re-specified when its CPU side grew), and uniforms stage dirty values that
//! upload at most once per frame.
//!
//! Convention:
//! - CPU geometry is in board pixels (bottom-left origin, +Y up, like the
//!   orthographic projection the game installs).
//! - The vertex shader transforms by projection × model-view.

mod batch;
mod buffer;
mod ctx;
mod matrix;
mod renderer;
mod shader;
mod texture;

pub use batch::{PrimitiveMode, QuadBatch, Vertex};
pub use buffer::GrowableBuffer;
pub use ctx::{RenderCtx, RenderTarget, Viewport};
pub use matrix::MatrixStack;
pub use renderer::{Renderer, ShaderId};
pub use shader::{ShaderDesc, ShaderProgram, UniformBlock, UniformKind, UniformSlot, UniformValue};
pub use texture::Texture2d;
