#![deny(unsafe_code)]
//! GPU building blocks for real-time camera effects on OpenGL ES 3.0.
//!
//! Provides the [`GlBackend`] seam with [`GpuContext`] over `glow`,
//! [`TextureFrameBuffer`] render targets, the [`GenericDrawer`]
//! fullscreen-pass drawer, and the [`VirtualBackground`] effect with its
//! blur, mask and composite passes.
//!
//! The `mock` feature exposes `MockGl`, a recording backend for tests.

pub mod config;
pub mod drawer;
pub mod effects;
pub mod error;
pub mod gl;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod params;
pub mod render;

pub use config::EffectConfig;
pub use drawer::{
    EmptyCallbacks, Frame, GenericDrawer, PrepareParams, ShaderCallbacks, ShaderPass, ShaderType,
    Viewport, EMPTY_CALLBACKS,
};
pub use effects::{
    BackgroundImage, BlurKind, MaskSender, PassKind, SegmentationMask, VirtualBackground,
};
pub use error::EffectError;
pub use gl::{FramebufferId, GlBackend, ProgramId, TextureId, UniformLocation};
#[cfg(any(test, feature = "mock"))]
pub use mock::{GlCall, MockGl};
#[cfg(not(target_arch = "wasm32"))]
pub use render::GpuContext;
pub use render::{PingPong, TextureFormat, TextureFrameBuffer};
