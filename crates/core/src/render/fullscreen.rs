//! Fullscreen triangle used by every pass.
//!
//! One oversized triangle covers the viewport; positions and texture
//! coordinates come from `gl_VertexID`, so no vertex buffer is bound.
//! Texture coordinates go through `tex_mat` so camera frames can carry their
//! own transform (rotation, mirroring, crop).

use crate::gl::GlBackend;

/// Name of the texture-matrix uniform in [`TEXTURE_VERTEX_SHADER`].
pub const TEX_MATRIX_UNIFORM: &str = "tex_mat";

/// GLSL ES 3.0 vertex shader producing `v_uv` from `gl_VertexID` and `tex_mat`.
pub const TEXTURE_VERTEX_SHADER: &str = r#"#version 300 es
uniform mat4 tex_mat;
out vec2 v_uv;
void main() {
    vec2 uv = vec2((gl_VertexID << 1) & 2, gl_VertexID & 2);
    v_uv = (tex_mat * vec4(uv, 0.0, 1.0)).xy;
    gl_Position = vec4(uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

/// Issues the three-vertex draw. The caller has bound program and inputs.
pub fn draw_fullscreen_triangle(gl: &dyn GlBackend) {
    gl.draw_arrays(glow::TRIANGLES, 0, 3);
}
