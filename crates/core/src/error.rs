//! Error types for segfx.

use crate::render::shader::ShaderError;
use thiserror::Error;

/// Errors produced by render targets, drawers and effect passes.
#[derive(Debug, Error)]
pub enum EffectError {
    /// A requested size was zero or did not fit a GL size (`i32`).
    #[error("invalid size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// The framebuffer failed its completeness check after the color
    /// attachment was (re)specified.
    #[error("framebuffer not complete, status: 0x{status:04X}")]
    IncompleteFramebuffer { status: u32 },

    /// A render target was bound before it was ever sized.
    #[error("render target has no GPU resources; call set_size first")]
    NotAllocated,

    /// The GL context failed to create an object.
    #[error("GL object creation failed: {0}")]
    Gl(String),

    /// A shader failed to compile or link.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// `glGetError` reported an error after the labelled operation.
    #[error("{label}: GL error 0x{code:04X}")]
    Driver { label: String, code: u32 },

    /// A segmentation mask's buffer did not match its dimensions.
    #[error("invalid mask: expected {expected} values for {width}x{height}, got {got}")]
    InvalidMask {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    /// A background image's pixel buffer did not match its dimensions.
    #[error("invalid background image: expected {expected} bytes for {width}x{height}, got {got}")]
    InvalidImage {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    /// An effect configuration value was out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
