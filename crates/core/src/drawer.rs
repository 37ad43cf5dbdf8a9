//! Generic fullscreen drawer configured by a fragment shader and callbacks.
//!
//! A pass is a [`ShaderPass`]: a generic fragment source plus a
//! [`ShaderCallbacks`] value. [`GenericDrawer`] turns a pass into draw
//! calls. It compiles the program for the input texture's [`ShaderType`],
//! uploads the texture matrix, and lets the callbacks set their own
//! uniforms.
//!
//! Generic fragment sources see:
//!
//! - `in vec2 v_uv` -- texture coordinate after the texture matrix,
//! - `vec4 sampleFrame(vec2)` -- reads the input texture,
//! - `out vec4 fragColor`.
//!
//! and must define `void main()`.

use glam::Mat4;
use tracing::{debug, trace};

use crate::error::EffectError;
use crate::gl::{gl_size, GlBackend, ProgramId, TextureId, UniformLocation, TEXTURE_EXTERNAL_OES};
use crate::render::fullscreen::{draw_fullscreen_triangle, TEXTURE_VERTEX_SHADER, TEX_MATRIX_UNIFORM};

/// Name of the input sampler uniform declared by the drawer.
pub const INPUT_TEXTURE_UNIFORM: &str = "tex";

/// Kind of texture the drawer samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    /// An external (camera / SurfaceTexture) image.
    Oes,
    /// A regular 2D texture.
    Rgb,
}

impl ShaderType {
    /// The bind target for textures of this type.
    pub fn texture_target(self) -> u32 {
        match self {
            ShaderType::Oes => TEXTURE_EXTERNAL_OES,
            ShaderType::Rgb => glow::TEXTURE_2D,
        }
    }
}

/// Prepends the header for `shader_type` to a generic fragment source.
pub fn assemble_fragment_shader(shader_type: ShaderType, generic_source: &str) -> String {
    let mut source = String::from("#version 300 es\n");
    let sampler = match shader_type {
        ShaderType::Oes => {
            source.push_str("#extension GL_OES_EGL_image_external_essl3 : require\n");
            "samplerExternalOES"
        }
        ShaderType::Rgb => "sampler2D",
    };
    source.push_str("precision mediump float;\n");
    source.push_str(&format!("uniform {sampler} {INPUT_TEXTURE_UNIFORM};\n"));
    source.push_str("in vec2 v_uv;\nout vec4 fragColor;\n\n");
    source.push_str(&format!(
        "vec4 sampleFrame(vec2 p) {{\n    return texture({INPUT_TEXTURE_UNIFORM}, p);\n}}\n\n"
    ));
    source.push_str(generic_source);
    source
}

/// What a draw is about to do, as passed to
/// [`ShaderCallbacks::on_prepare_shader`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareParams {
    pub tex_matrix: Mat4,
    pub frame_width: u32,
    pub frame_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// Hooks run by [`GenericDrawer`] around program creation and each draw.
pub trait ShaderCallbacks {
    /// Runs once after a program is compiled and made current. Look up
    /// uniform locations here.
    fn on_new_shader(&mut self, gl: &dyn GlBackend, program: ProgramId);

    /// Runs before every draw, with the program current and the texture
    /// matrix uploaded.
    fn on_prepare_shader(&mut self, gl: &dyn GlBackend, program: ProgramId, params: &PrepareParams);
}

/// Callbacks that do nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyCallbacks;

/// The reusable no-op callbacks value.
pub const EMPTY_CALLBACKS: EmptyCallbacks = EmptyCallbacks;

impl ShaderCallbacks for EmptyCallbacks {
    fn on_new_shader(&mut self, _gl: &dyn GlBackend, _program: ProgramId) {}

    fn on_prepare_shader(
        &mut self,
        _gl: &dyn GlBackend,
        _program: ProgramId,
        _params: &PrepareParams,
    ) {
    }
}

/// A texture to draw, with its sampling transform and pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub texture: TextureId,
    pub tex_matrix: Mat4,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// A frame sampled without any transform.
    pub fn identity(texture: TextureId, width: u32, height: u32) -> Self {
        Self {
            texture,
            tex_matrix: Mat4::IDENTITY,
            width,
            height,
        }
    }
}

/// Destination rectangle in the bound framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A viewport covering `width` x `height` from the origin.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Configuration of one render pass: a generic fragment source and the
/// callbacks that feed its uniforms.
#[derive(Debug, Clone)]
pub struct ShaderPass<C> {
    fragment_source: String,
    callbacks: C,
}

impl<C: ShaderCallbacks> ShaderPass<C> {
    pub fn new(fragment_source: impl Into<String>, callbacks: C) -> Self {
        Self {
            fragment_source: fragment_source.into(),
            callbacks,
        }
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }
}

#[derive(Debug, Clone, Copy)]
struct CompiledShader {
    shader_type: ShaderType,
    program: ProgramId,
    tex_matrix: Option<UniformLocation>,
}

/// Draws a [`ShaderPass`] as a fullscreen triangle into the bound
/// framebuffer.
///
/// One program is kept at a time; drawing with a different
/// [`ShaderType`] than the last draw recompiles. Call
/// [`release`](Self::release) with the context current before dropping.
#[derive(Debug)]
pub struct GenericDrawer<C: ShaderCallbacks = EmptyCallbacks> {
    pass: ShaderPass<C>,
    shader: Option<CompiledShader>,
}

impl<C: ShaderCallbacks> GenericDrawer<C> {
    /// Creates a drawer for `fragment_source`. Nothing is compiled until the
    /// first draw.
    pub fn new(fragment_source: impl Into<String>, callbacks: C) -> Self {
        Self::from_pass(ShaderPass::new(fragment_source, callbacks))
    }

    /// Creates a drawer from a prepared pass.
    pub fn from_pass(pass: ShaderPass<C>) -> Self {
        Self { pass, shader: None }
    }

    pub fn pass(&self) -> &ShaderPass<C> {
        &self.pass
    }

    pub fn callbacks(&self) -> &C {
        &self.pass.callbacks
    }

    /// Mutable access so per-draw parameters can be changed between draws.
    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.pass.callbacks
    }

    /// Draws an external (camera) texture.
    pub fn draw_oes(
        &mut self,
        gl: &dyn GlBackend,
        frame: &Frame,
        viewport: Viewport,
    ) -> Result<(), EffectError> {
        self.draw(gl, ShaderType::Oes, frame, viewport)
    }

    /// Draws a regular 2D texture.
    pub fn draw_rgb(
        &mut self,
        gl: &dyn GlBackend,
        frame: &Frame,
        viewport: Viewport,
    ) -> Result<(), EffectError> {
        self.draw(gl, ShaderType::Rgb, frame, viewport)
    }

    /// Draws `frame` sampled as `shader_type` into `viewport`.
    ///
    /// # Errors
    ///
    /// [`EffectError::InvalidSize`] for an empty viewport, or
    /// [`EffectError::Shader`] if the program fails to build.
    pub fn draw(
        &mut self,
        gl: &dyn GlBackend,
        shader_type: ShaderType,
        frame: &Frame,
        viewport: Viewport,
    ) -> Result<(), EffectError> {
        let (width, height) = gl_size(viewport.width, viewport.height)?;

        self.prepare(
            gl,
            shader_type,
            &PrepareParams {
                tex_matrix: frame.tex_matrix,
                frame_width: frame.width,
                frame_height: frame.height,
                viewport_width: viewport.width,
                viewport_height: viewport.height,
            },
        )?;

        let target = shader_type.texture_target();
        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(target, Some(frame.texture));
        gl.viewport(viewport.x, viewport.y, width, height);
        draw_fullscreen_triangle(gl);
        gl.bind_texture(target, None);

        trace!(
            texture = frame.texture.get(),
            ?shader_type,
            width,
            height,
            "drew generic pass"
        );
        Ok(())
    }

    fn prepare(
        &mut self,
        gl: &dyn GlBackend,
        shader_type: ShaderType,
        params: &PrepareParams,
    ) -> Result<(), EffectError> {
        let shader = match self.shader {
            Some(shader) if shader.shader_type == shader_type => shader,
            _ => self.compile(gl, shader_type)?,
        };

        gl.use_program(Some(shader.program));
        gl.uniform_matrix_4_f32(shader.tex_matrix.as_ref(), &params.tex_matrix);
        self.pass
            .callbacks
            .on_prepare_shader(gl, shader.program, params);
        Ok(())
    }

    fn compile(
        &mut self,
        gl: &dyn GlBackend,
        shader_type: ShaderType,
    ) -> Result<CompiledShader, EffectError> {
        self.release(gl);

        let fragment = assemble_fragment_shader(shader_type, &self.pass.fragment_source);
        let program = gl.create_program(TEXTURE_VERTEX_SHADER, &fragment)?;
        let tex_matrix = gl.uniform_location(program, TEX_MATRIX_UNIFORM);
        let input = gl.uniform_location(program, INPUT_TEXTURE_UNIFORM);

        gl.use_program(Some(program));
        gl.uniform_1_i32(input.as_ref(), 0);
        self.pass.callbacks.on_new_shader(gl, program);

        debug!(program = program.get(), ?shader_type, "compiled generic drawer program");
        let shader = CompiledShader {
            shader_type,
            program,
            tex_matrix,
        };
        self.shader = Some(shader);
        Ok(shader)
    }

    /// Deletes the compiled program, if any. The drawer recompiles on its
    /// next draw.
    pub fn release(&mut self, gl: &dyn GlBackend) {
        if let Some(shader) = self.shader.take() {
            gl.delete_program(shader.program);
        }
    }
}
