//! Separable two-pass blur between a pair of render targets.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shaders::{
    BOX_BLUR_FRAGMENT, DIRECTION_UNIFORM, GAUSSIAN_BLUR_FRAGMENT, RADIUS_UNIFORM,
    TEXEL_SIZE_UNIFORM,
};
use crate::drawer::{Frame, GenericDrawer, PrepareParams, ShaderCallbacks, Viewport};
use crate::error::EffectError;
use crate::gl::{check_no_error, GlBackend, ProgramId, TextureId, UniformLocation};
use crate::render::target::TextureFrameBuffer;

/// Blur kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurKind {
    #[default]
    Gaussian,
    Box,
}

impl BlurKind {
    pub fn name(self) -> &'static str {
        match self {
            BlurKind::Gaussian => "gaussian",
            BlurKind::Box => "box",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gaussian" => Some(BlurKind::Gaussian),
            "box" => Some(BlurKind::Box),
            _ => None,
        }
    }

    fn fragment_source(self) -> &'static str {
        match self {
            BlurKind::Gaussian => GAUSSIAN_BLUR_FRAGMENT,
            BlurKind::Box => BOX_BLUR_FRAGMENT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BlurLocations {
    texel_size: Option<UniformLocation>,
    direction: Option<UniformLocation>,
    radius: Option<UniformLocation>,
}

/// Uniform values for one blur direction.
#[derive(Debug, Clone, Default)]
pub struct BlurUniforms {
    pub direction: Vec2,
    pub texel_size: Vec2,
    pub radius: f32,
    locations: Option<BlurLocations>,
}

impl ShaderCallbacks for BlurUniforms {
    fn on_new_shader(&mut self, gl: &dyn GlBackend, program: ProgramId) {
        self.locations = Some(BlurLocations {
            texel_size: gl.uniform_location(program, TEXEL_SIZE_UNIFORM),
            direction: gl.uniform_location(program, DIRECTION_UNIFORM),
            radius: gl.uniform_location(program, RADIUS_UNIFORM),
        });
    }

    fn on_prepare_shader(
        &mut self,
        gl: &dyn GlBackend,
        _program: ProgramId,
        _params: &PrepareParams,
    ) {
        let Some(loc) = self.locations else {
            return;
        };
        gl.uniform_2_f32(loc.texel_size.as_ref(), self.texel_size.x, self.texel_size.y);
        gl.uniform_2_f32(loc.direction.as_ref(), self.direction.x, self.direction.y);
        gl.uniform_1_f32(loc.radius.as_ref(), self.radius);
    }
}

/// Horizontal pass into `first`, vertical pass into `second`.
#[derive(Debug)]
pub struct BlurPass {
    kind: BlurKind,
    drawer: GenericDrawer<BlurUniforms>,
}

impl BlurPass {
    pub fn new(kind: BlurKind) -> Self {
        Self {
            kind,
            drawer: GenericDrawer::new(kind.fragment_source(), BlurUniforms::default()),
        }
    }

    pub fn kind(&self) -> BlurKind {
        self.kind
    }

    /// Blurs `input` at its own size and returns the texture of `second`.
    ///
    /// Both targets are resized to the input size. The default framebuffer
    /// is bound again on success.
    pub fn apply(
        &mut self,
        gl: &dyn GlBackend,
        input: &Frame,
        radius: f32,
        first: &mut TextureFrameBuffer,
        second: &mut TextureFrameBuffer,
    ) -> Result<TextureId, EffectError> {
        let (width, height) = (input.width, input.height);
        first.set_size(gl, width, height)?;
        second.set_size(gl, width, height)?;

        let viewport = Viewport::full(width, height);
        let uniforms = self.drawer.callbacks_mut();
        uniforms.texel_size = Vec2::new(1.0 / width as f32, 1.0 / height as f32);
        uniforms.radius = radius;
        uniforms.direction = Vec2::X;

        first.bind(gl)?;
        self.drawer.draw_rgb(gl, input, viewport)?;

        let intermediate = first.texture().ok_or(EffectError::NotAllocated)?;
        self.drawer.callbacks_mut().direction = Vec2::Y;
        second.bind(gl)?;
        self.drawer
            .draw_rgb(gl, &Frame::identity(intermediate, width, height), viewport)?;

        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        check_no_error(gl, "BlurPass.apply")?;
        second.texture().ok_or(EffectError::NotAllocated)
    }

    pub fn release(&mut self, gl: &dyn GlBackend) {
        self.drawer.release(gl);
    }
}
