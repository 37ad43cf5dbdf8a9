//! Copies a frame into an owned RGBA8 target at an arbitrary size.

use super::shaders::PASS_THROUGH_FRAGMENT;
use crate::drawer::{EmptyCallbacks, Frame, GenericDrawer, ShaderType, Viewport, EMPTY_CALLBACKS};
use crate::error::EffectError;
use crate::gl::{check_no_error, GlBackend, TextureId};
use crate::render::target::TextureFrameBuffer;
use crate::render::texture::TextureFormat;

#[derive(Debug)]
pub struct Resampler {
    drawer: GenericDrawer<EmptyCallbacks>,
    target: TextureFrameBuffer,
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler {
    pub fn new() -> Self {
        Self {
            drawer: GenericDrawer::new(PASS_THROUGH_FRAGMENT, EMPTY_CALLBACKS),
            target: TextureFrameBuffer::new(TextureFormat::rgba8()),
        }
    }

    /// Draws `input` into the owned target at `width` x `height` and returns
    /// its texture. Linear filtering does the scaling.
    pub fn resample(
        &mut self,
        gl: &dyn GlBackend,
        shader_type: ShaderType,
        input: &Frame,
        width: u32,
        height: u32,
    ) -> Result<TextureId, EffectError> {
        self.target.set_size(gl, width, height)?;
        self.target.bind(gl)?;
        self.drawer
            .draw(gl, shader_type, input, Viewport::full(width, height))?;
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        check_no_error(gl, "Resampler.resample")?;
        self.target.texture().ok_or(EffectError::NotAllocated)
    }

    pub fn target(&self) -> &TextureFrameBuffer {
        &self.target
    }

    pub fn release(&mut self, gl: &dyn GlBackend) {
        self.drawer.release(gl);
        self.target.release(gl);
    }
}
