//! GLSL compilation and linking on a `glow` context.
//!
//! [`compile_program`] is what [`super::GpuContext`] uses to implement
//! `GlBackend::create_program`. [`format_shader_error`] is pure string
//! processing and is also used to make mock failures readable.

use std::fmt::{self, Write as _};

use thiserror::Error;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// The GL enum passed to `glCreateShader`.
    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors from shader compilation or program linking.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A stage failed to compile. `log` holds the numbered source and the
    /// driver's info log.
    #[error("{stage} shader failed to compile:\n{log}")]
    CompileError { stage: ShaderStage, log: String },
    /// The program failed to link.
    #[error("program failed to link:\n{0}")]
    LinkError(String),
}

/// Numbers each source line (right-aligned) and appends the driver log.
///
/// Driver logs cite line numbers; this puts the matching GLSL next to them.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let line_count = source.lines().count();
    let width = line_count.max(1).to_string().len();

    let mut out = String::new();
    for (i, line) in source.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:>width$}: {line}", i + 1);
    }

    if !log.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(log);
    }
    out
}

/// Compiles one stage. The shader object is deleted on failure.
#[allow(unsafe_code)]
pub fn compile_shader(
    gl: &glow::Context,
    stage: ShaderStage,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    use glow::HasContext;

    // SAFETY: glow marks raw GL calls unsafe. The stage enum is valid and
    // the shader handle is only used after a successful create.
    let shader = unsafe {
        gl.create_shader(stage.gl_enum())
            .map_err(|log| ShaderError::CompileError { stage, log })?
    };

    let compiled = unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        gl.get_shader_compile_status(shader)
    };
    if compiled {
        return Ok(shader);
    }

    let info_log = unsafe { gl.get_shader_info_log(shader) };
    unsafe { gl.delete_shader(shader) };
    Err(ShaderError::CompileError {
        stage,
        log: format_shader_error(source, &info_log),
    })
}

/// Links two compiled stages. The stages are detached afterwards; the
/// program is deleted on failure.
#[allow(unsafe_code)]
pub fn link_program(
    gl: &glow::Context,
    vertex: glow::Shader,
    fragment: glow::Shader,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    // SAFETY: both shader handles come from compile_shader on this context.
    let program = unsafe { gl.create_program().map_err(ShaderError::LinkError)? };

    let linked = unsafe {
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        gl.detach_shader(program, vertex);
        gl.detach_shader(program, fragment);
        gl.get_program_link_status(program)
    };
    if linked {
        return Ok(program);
    }

    let info_log = unsafe { gl.get_program_info_log(program) };
    unsafe { gl.delete_program(program) };
    Err(ShaderError::LinkError(info_log))
}

/// Compiles both stages and links them. Stage objects never outlive the call.
#[allow(unsafe_code)]
pub fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    let vertex = compile_shader(gl, ShaderStage::Vertex, vertex_src)?;
    let fragment = match compile_shader(gl, ShaderStage::Fragment, fragment_src) {
        Ok(shader) => shader,
        Err(e) => {
            // SAFETY: vertex was created by compile_shader above.
            unsafe { gl.delete_shader(vertex) };
            return Err(e);
        }
    };

    let program = link_program(gl, vertex, fragment);

    // SAFETY: both handles are valid; a linked program keeps its own copy.
    unsafe {
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);
    }

    program
}
