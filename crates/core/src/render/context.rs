//! [`GlBackend`] over a live `glow::Context`.
//!
//! The caller creates and makes current the platform context (EGL, WGL,
//! GLX...) and hands the loaded `glow::Context` over. `GpuContext` never
//! switches or destroys the platform context itself.

use glow::HasContext;
use tracing::debug;

use super::shader::{compile_program, ShaderError};
use super::texture::TextureFormat;
use crate::gl::{FramebufferId, GlBackend, ProgramId, TextureId, UniformLocation};

/// A loaded GL context plus the empty vertex array every fullscreen draw
/// runs with.
pub struct GpuContext {
    gl: glow::Context,
    vertex_array: glow::VertexArray,
    supports_color_buffer_float: bool,
}

impl GpuContext {
    /// Wraps `gl`, creates and binds an empty vertex array, and probes
    /// `EXT_color_buffer_float`.
    ///
    /// # Errors
    ///
    /// Returns the driver message if the vertex array cannot be created.
    #[allow(unsafe_code)]
    pub fn new(gl: glow::Context) -> Result<Self, String> {
        let supports_color_buffer_float =
            gl.supported_extensions().contains("EXT_color_buffer_float");

        // SAFETY: glow marks raw GL calls unsafe. The caller guarantees the
        // context is current on this thread.
        let vertex_array = unsafe {
            let vao = gl.create_vertex_array()?;
            gl.bind_vertex_array(Some(vao));
            vao
        };

        debug!(supports_color_buffer_float, "GPU context ready");
        Ok(Self {
            gl,
            vertex_array,
            supports_color_buffer_float,
        })
    }

    /// The underlying `glow::Context`.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Whether half/full float textures can be rendered into.
    pub fn supports_color_buffer_float(&self) -> bool {
        self.supports_color_buffer_float
    }

    /// Deletes the vertex array and hands the raw context back.
    #[allow(unsafe_code)]
    pub fn destroy(self) -> glow::Context {
        // SAFETY: vertex_array was created on this context in new().
        unsafe {
            self.gl.bind_vertex_array(None);
            self.gl.delete_vertex_array(self.vertex_array);
        }
        self.gl
    }
}

fn native_texture(texture: TextureId) -> glow::Texture {
    glow::NativeTexture(texture.non_zero())
}

fn native_framebuffer(framebuffer: FramebufferId) -> glow::Framebuffer {
    glow::NativeFramebuffer(framebuffer.non_zero())
}

fn native_program(program: ProgramId) -> glow::Program {
    glow::NativeProgram(program.non_zero())
}

fn native_location(location: Option<&UniformLocation>) -> Option<glow::UniformLocation> {
    location.map(|loc| glow::NativeUniformLocation(loc.0))
}

// SAFETY (whole impl): glow marks every raw GL call unsafe. Handles passed
// in were produced by this context, and GlBackend's contract requires the
// context to be current on the calling thread.
#[allow(unsafe_code)]
impl GlBackend for GpuContext {
    fn create_texture(&self) -> Result<TextureId, String> {
        let texture = unsafe { self.gl.create_texture()? };
        Ok(TextureId::from_non_zero(texture.0))
    }

    fn delete_texture(&self, texture: TextureId) {
        unsafe { self.gl.delete_texture(native_texture(texture)) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(unit) }
    }

    fn bind_texture(&self, target: u32, texture: Option<TextureId>) {
        unsafe { self.gl.bind_texture(target, texture.map(native_texture)) }
    }

    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, parameter, value) }
    }

    fn tex_image_2d(&self, target: u32, format: TextureFormat, width: i32, height: i32) {
        unsafe {
            self.gl.tex_image_2d(
                target,
                0,
                format.internal_format as i32,
                width,
                height,
                0,
                format.pixel_format,
                format.pixel_type,
                glow::PixelUnpackData::Slice(None),
            )
        }
    }

    fn tex_sub_image_2d(
        &self,
        target: u32,
        width: i32,
        height: i32,
        pixel_format: u32,
        pixel_type: u32,
        pixels: &[u8],
    ) {
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                0,
                0,
                0,
                width,
                height,
                pixel_format,
                pixel_type,
                glow::PixelUnpackData::Slice(Some(pixels)),
            )
        }
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        let framebuffer = unsafe { self.gl.create_framebuffer()? };
        Ok(FramebufferId::from_non_zero(framebuffer.0))
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        unsafe { self.gl.delete_framebuffer(native_framebuffer(framebuffer)) }
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: Option<FramebufferId>) {
        unsafe {
            self.gl
                .bind_framebuffer(target, framebuffer.map(native_framebuffer))
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<TextureId>,
        level: i32,
    ) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                target,
                attachment,
                texture_target,
                texture.map(native_texture),
                level,
            )
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { self.gl.clear_color(red, green, blue, alpha) }
    }

    fn clear(&self, mask: u32) {
        unsafe { self.gl.clear(mask) }
    }

    fn create_program(
        &self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, ShaderError> {
        let program = compile_program(&self.gl, vertex_src, fragment_src)?;
        Ok(ProgramId::from_non_zero(program.0))
    }

    fn delete_program(&self, program: ProgramId) {
        unsafe { self.gl.delete_program(native_program(program)) }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        unsafe { self.gl.use_program(program.map(native_program)) }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        unsafe {
            self.gl
                .get_uniform_location(native_program(program), name)
                .map(|loc| UniformLocation(loc.0))
        }
    }

    fn uniform_1_i32(&self, location: Option<&UniformLocation>, x: i32) {
        unsafe { self.gl.uniform_1_i32(native_location(location).as_ref(), x) }
    }

    fn uniform_1_f32(&self, location: Option<&UniformLocation>, x: f32) {
        unsafe { self.gl.uniform_1_f32(native_location(location).as_ref(), x) }
    }

    fn uniform_2_f32(&self, location: Option<&UniformLocation>, x: f32, y: f32) {
        unsafe {
            self.gl
                .uniform_2_f32(native_location(location).as_ref(), x, y)
        }
    }

    fn uniform_matrix_4_f32(&self, location: Option<&UniformLocation>, matrix: &glam::Mat4) {
        unsafe {
            self.gl.uniform_matrix_4_f32_slice(
                native_location(location).as_ref(),
                false,
                &matrix.to_cols_array(),
            )
        }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(mode, first, count) }
    }

    fn get_error(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }
}
