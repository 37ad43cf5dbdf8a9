//! OpenGL ES 3.0 rendering infrastructure.
//!
//! # Module overview
//!
//! - [`target`] -- [`TextureFrameBuffer`], a lazily sized texture + FBO pair.
//! - [`texture`] -- texture storage formats.
//! - [`shader`] -- shader compilation, linking and error formatting.
//! - [`fullscreen`] -- the vertex shader and draw call shared by all passes.
//! - [`ping_pong`] -- read/write slot tracking for double buffering.
//! - [`context`] -- [`GpuContext`], the `glow` implementation of
//!   [`GlBackend`](crate::gl::GlBackend).

#[cfg(not(target_arch = "wasm32"))]
pub mod context;
pub mod fullscreen;
pub mod ping_pong;
pub mod shader;
pub mod target;
pub mod texture;

#[cfg(not(target_arch = "wasm32"))]
pub use context::GpuContext;
pub use fullscreen::{draw_fullscreen_triangle, TEXTURE_VERTEX_SHADER, TEX_MATRIX_UNIFORM};
pub use ping_pong::PingPong;
pub use shader::{format_shader_error, ShaderError, ShaderStage};
pub use target::TextureFrameBuffer;
pub use texture::TextureFormat;
