//! Recording [`GlBackend`] for tests.
//!
//! `MockGl` hands out sequential object names, remembers every call in
//! order and lets a test script framebuffer status, creation failures,
//! compile failures and queued `glGetError` codes. It performs no rendering.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::gl::{FramebufferId, GlBackend, ProgramId, TextureId, UniformLocation};
use crate::render::shader::ShaderError;
use crate::render::texture::TextureFormat;

/// One recorded GL call. Object names are raw `u32`s.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateTexture(u32),
    DeleteTexture(u32),
    ActiveTexture(u32),
    BindTexture {
        target: u32,
        texture: Option<u32>,
    },
    TexParameter {
        parameter: u32,
        value: i32,
    },
    TexImage2d {
        format: TextureFormat,
        width: i32,
        height: i32,
    },
    TexSubImage2d {
        width: i32,
        height: i32,
        pixel_format: u32,
        pixel_type: u32,
        len: usize,
    },
    CreateFramebuffer(u32),
    DeleteFramebuffer(u32),
    BindFramebuffer(Option<u32>),
    FramebufferTexture2d(Option<u32>),
    CheckFramebufferStatus,
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ClearColor([f32; 4]),
    Clear(u32),
    CreateProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    Uniform1i {
        name: String,
        value: i32,
    },
    Uniform1f {
        name: String,
        value: f32,
    },
    Uniform2f {
        name: String,
        value: [f32; 2],
    },
    UniformMatrix4 {
        name: String,
        value: [f32; 16],
    },
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
    },
}

/// A fake GL context that records calls instead of executing them.
pub struct MockGl {
    calls: RefCell<Vec<GlCall>>,
    next_name: Cell<u32>,
    framebuffer_status: Cell<u32>,
    fail_texture_creation: Cell<bool>,
    fail_framebuffer_creation: Cell<bool>,
    compile_failure: RefCell<Option<ShaderError>>,
    errors: RefCell<VecDeque<u32>>,
    programs: RefCell<HashMap<u32, (String, String)>>,
    uniforms: RefCell<HashMap<u32, String>>,
}

impl MockGl {
    /// A context whose framebuffers are always complete.
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_name: Cell::new(1),
            framebuffer_status: Cell::new(glow::FRAMEBUFFER_COMPLETE),
            fail_texture_creation: Cell::new(false),
            fail_framebuffer_creation: Cell::new(false),
            compile_failure: RefCell::new(None),
            errors: RefCell::new(VecDeque::new()),
            programs: RefCell::new(HashMap::new()),
            uniforms: RefCell::new(HashMap::new()),
        }
    }

    /// Snapshot of every call made so far.
    pub fn calls(&self) -> Vec<GlCall> {
        self.calls.borrow().clone()
    }

    /// Forgets the recorded calls. Object names keep counting up.
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    /// Status returned by subsequent `check_framebuffer_status` calls.
    pub fn set_framebuffer_status(&self, status: u32) {
        self.framebuffer_status.set(status);
    }

    /// Makes subsequent `create_texture` calls fail.
    pub fn fail_texture_creation(&self, fail: bool) {
        self.fail_texture_creation.set(fail);
    }

    /// Makes subsequent `create_framebuffer` calls fail.
    pub fn fail_framebuffer_creation(&self, fail: bool) {
        self.fail_framebuffer_creation.set(fail);
    }

    /// Makes the next `create_program` call fail with `error`.
    pub fn fail_next_compile(&self, error: ShaderError) {
        *self.compile_failure.borrow_mut() = Some(error);
    }

    /// Queues a code for `get_error` to report.
    pub fn push_error(&self, code: u32) {
        self.errors.borrow_mut().push_back(code);
    }

    /// Vertex and fragment source a program was created from.
    pub fn program_sources(&self, program: ProgramId) -> Option<(String, String)> {
        self.programs.borrow().get(&program.get()).cloned()
    }

    fn record(&self, call: GlCall) {
        self.calls.borrow_mut().push(call);
    }

    fn next(&self) -> u32 {
        let name = self.next_name.get();
        self.next_name.set(name + 1);
        name
    }

    fn uniform_name(&self, location: Option<&UniformLocation>) -> String {
        location
            .and_then(|loc| self.uniforms.borrow().get(&loc.0).cloned())
            .unwrap_or_default()
    }
}

impl Default for MockGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GlBackend for MockGl {
    fn create_texture(&self) -> Result<TextureId, String> {
        if self.fail_texture_creation.get() {
            return Err("out of texture names".into());
        }
        let name = self.next();
        self.record(GlCall::CreateTexture(name));
        TextureId::new(name).ok_or_else(|| "zero texture name".to_string())
    }

    fn delete_texture(&self, texture: TextureId) {
        self.record(GlCall::DeleteTexture(texture.get()));
    }

    fn active_texture(&self, unit: u32) {
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, target: u32, texture: Option<TextureId>) {
        self.record(GlCall::BindTexture {
            target,
            texture: texture.map(TextureId::get),
        });
    }

    fn tex_parameter_i32(&self, _target: u32, parameter: u32, value: i32) {
        self.record(GlCall::TexParameter { parameter, value });
    }

    fn tex_image_2d(&self, _target: u32, format: TextureFormat, width: i32, height: i32) {
        self.record(GlCall::TexImage2d {
            format,
            width,
            height,
        });
    }

    fn tex_sub_image_2d(
        &self,
        _target: u32,
        width: i32,
        height: i32,
        pixel_format: u32,
        pixel_type: u32,
        pixels: &[u8],
    ) {
        self.record(GlCall::TexSubImage2d {
            width,
            height,
            pixel_format,
            pixel_type,
            len: pixels.len(),
        });
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        if self.fail_framebuffer_creation.get() {
            return Err("out of framebuffer names".into());
        }
        let name = self.next();
        self.record(GlCall::CreateFramebuffer(name));
        FramebufferId::new(name).ok_or_else(|| "zero framebuffer name".to_string())
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.record(GlCall::DeleteFramebuffer(framebuffer.get()));
    }

    fn bind_framebuffer(&self, _target: u32, framebuffer: Option<FramebufferId>) {
        self.record(GlCall::BindFramebuffer(framebuffer.map(FramebufferId::get)));
    }

    fn framebuffer_texture_2d(
        &self,
        _target: u32,
        _attachment: u32,
        _texture_target: u32,
        texture: Option<TextureId>,
        _level: i32,
    ) {
        self.record(GlCall::FramebufferTexture2d(texture.map(TextureId::get)));
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        self.record(GlCall::CheckFramebufferStatus);
        self.framebuffer_status.get()
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(GlCall::ClearColor([red, green, blue, alpha]));
    }

    fn clear(&self, mask: u32) {
        self.record(GlCall::Clear(mask));
    }

    fn create_program(
        &self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<ProgramId, ShaderError> {
        if let Some(err) = self.compile_failure.borrow_mut().take() {
            return Err(err);
        }
        let name = self.next();
        self.programs
            .borrow_mut()
            .insert(name, (vertex_src.to_string(), fragment_src.to_string()));
        self.record(GlCall::CreateProgram(name));
        ProgramId::new(name).ok_or_else(|| ShaderError::LinkError("zero program name".into()))
    }

    fn delete_program(&self, program: ProgramId) {
        self.record(GlCall::DeleteProgram(program.get()));
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.record(GlCall::UseProgram(program.map(ProgramId::get)));
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        let mut uniforms = self.uniforms.borrow_mut();
        if let Some((&loc, _)) = uniforms.iter().find(|(_, n)| n.as_str() == name) {
            return Some(UniformLocation(loc));
        }
        let loc = uniforms.len() as u32;
        uniforms.insert(loc, name.to_string());
        Some(UniformLocation(loc))
    }

    fn uniform_1_i32(&self, location: Option<&UniformLocation>, x: i32) {
        self.record(GlCall::Uniform1i {
            name: self.uniform_name(location),
            value: x,
        });
    }

    fn uniform_1_f32(&self, location: Option<&UniformLocation>, x: f32) {
        self.record(GlCall::Uniform1f {
            name: self.uniform_name(location),
            value: x,
        });
    }

    fn uniform_2_f32(&self, location: Option<&UniformLocation>, x: f32, y: f32) {
        self.record(GlCall::Uniform2f {
            name: self.uniform_name(location),
            value: [x, y],
        });
    }

    fn uniform_matrix_4_f32(&self, location: Option<&UniformLocation>, matrix: &glam::Mat4) {
        self.record(GlCall::UniformMatrix4 {
            name: self.uniform_name(location),
            value: matrix.to_cols_array(),
        });
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.record(GlCall::DrawArrays { mode, first, count });
    }

    fn get_error(&self) -> u32 {
        self.errors
            .borrow_mut()
            .pop_front()
            .unwrap_or(glow::NO_ERROR)
    }
}
