//! The OpenGL ES 3.0 surface segfx renders through.
//!
//! [`GlBackend`] is object-safe so render targets, drawers and effect passes
//! all take `&dyn GlBackend`. [`crate::render::GpuContext`] implements it on
//! top of `glow`; `MockGl` (feature `mock`) records calls for tests.
//!
//! Every method must be called on the thread that has the GL context
//! current. Nothing here checks that.

use std::num::NonZeroU32;

use crate::error::EffectError;
use crate::render::shader::ShaderError;
use crate::render::texture::TextureFormat;

/// `GL_TEXTURE_EXTERNAL_OES`, the target camera frames arrive on.
pub const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw GL name. Returns `None` for 0, which GL reserves.
            pub fn new(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// The raw GL name.
            pub fn get(self) -> u32 {
                self.0.get()
            }

            pub(crate) fn from_non_zero(raw: NonZeroU32) -> Self {
                Self(raw)
            }

            pub(crate) fn non_zero(self) -> NonZeroU32 {
                self.0
            }
        }
    };
}

gl_handle!(
    /// A texture object name.
    TextureId
);
gl_handle!(
    /// A framebuffer object name.
    FramebufferId
);
gl_handle!(
    /// A linked shader program name.
    ProgramId
);

/// A uniform location inside a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// The GL calls segfx needs.
///
/// Method names and argument order follow `glow::HasContext` so the glow
/// implementation is a thin forwarder.
pub trait GlBackend {
    fn create_texture(&self) -> Result<TextureId, String>;
    fn delete_texture(&self, texture: TextureId);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<TextureId>);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);

    /// (Re)specifies level-0 storage of the bound texture without uploading data.
    fn tex_image_2d(&self, target: u32, format: TextureFormat, width: i32, height: i32);

    /// Uploads `pixels` into level 0 of the bound texture, starting at the origin.
    fn tex_sub_image_2d(
        &self,
        target: u32,
        width: i32,
        height: i32,
        pixel_format: u32,
        pixel_type: u32,
        pixels: &[u8],
    );

    fn create_framebuffer(&self) -> Result<FramebufferId, String>;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<FramebufferId>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<TextureId>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&self, mask: u32);

    /// Compiles and links a vertex/fragment pair.
    fn create_program(&self, vertex_src: &str, fragment_src: &str)
        -> Result<ProgramId, ShaderError>;
    fn delete_program(&self, program: ProgramId);
    fn use_program(&self, program: Option<ProgramId>);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn uniform_1_i32(&self, location: Option<&UniformLocation>, x: i32);
    fn uniform_1_f32(&self, location: Option<&UniformLocation>, x: f32);
    fn uniform_2_f32(&self, location: Option<&UniformLocation>, x: f32, y: f32);
    fn uniform_matrix_4_f32(&self, location: Option<&UniformLocation>, matrix: &glam::Mat4);

    fn draw_arrays(&self, mode: u32, first: i32, count: i32);
    fn get_error(&self) -> u32;
}

/// Drains the GL error queue and reports the first error found.
///
/// `label` names the operation that just ran so the error can be traced
/// back to a pass.
pub fn check_no_error(gl: &dyn GlBackend, label: &str) -> Result<(), EffectError> {
    let first = gl.get_error();
    if first == glow::NO_ERROR {
        return Ok(());
    }
    // GL may queue several flags; clear them so the next check starts clean.
    while gl.get_error() != glow::NO_ERROR {}
    Err(EffectError::Driver {
        label: label.to_string(),
        code: first,
    })
}

/// Converts a pixel dimension to a GL size, rejecting zero and overflow.
pub(crate) fn gl_size(width: u32, height: u32) -> Result<(i32, i32), EffectError> {
    let invalid = || EffectError::InvalidSize { width, height };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let w = i32::try_from(width).map_err(|_| invalid())?;
    let h = i32::try_from(height).map_err(|_| invalid())?;
    Ok((w, h))
}
