//! Final pass: frame over background, weighted by the mask.

use super::shaders::{BACKGROUND_UNIFORM, COMPOSITE_FRAGMENT, MASK_UNIFORM};
use crate::drawer::{Frame, GenericDrawer, PrepareParams, ShaderCallbacks, ShaderType, Viewport};
use crate::error::EffectError;
use crate::gl::{check_no_error, GlBackend, ProgramId, TextureId};

const BACKGROUND_UNIT: u32 = 1;
const MASK_UNIT: u32 = 2;

/// Binds the background and mask textures to units 1 and 2.
#[derive(Debug, Clone, Default)]
pub struct CompositeTextures {
    pub background: Option<TextureId>,
    pub mask: Option<TextureId>,
}

impl ShaderCallbacks for CompositeTextures {
    fn on_new_shader(&mut self, gl: &dyn GlBackend, program: ProgramId) {
        let background = gl.uniform_location(program, BACKGROUND_UNIFORM);
        let mask = gl.uniform_location(program, MASK_UNIFORM);
        gl.uniform_1_i32(background.as_ref(), BACKGROUND_UNIT as i32);
        gl.uniform_1_i32(mask.as_ref(), MASK_UNIT as i32);
    }

    fn on_prepare_shader(
        &mut self,
        gl: &dyn GlBackend,
        _program: ProgramId,
        _params: &PrepareParams,
    ) {
        gl.active_texture(glow::TEXTURE0 + BACKGROUND_UNIT);
        gl.bind_texture(glow::TEXTURE_2D, self.background);
        gl.active_texture(glow::TEXTURE0 + MASK_UNIT);
        gl.bind_texture(glow::TEXTURE_2D, self.mask);
    }
}

#[derive(Debug)]
pub struct CompositePass {
    drawer: GenericDrawer<CompositeTextures>,
}

impl Default for CompositePass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositePass {
    pub fn new() -> Self {
        Self {
            drawer: GenericDrawer::new(COMPOSITE_FRAGMENT, CompositeTextures::default()),
        }
    }

    /// Clears to white, then draws the composite into the currently bound
    /// framebuffer at `viewport`.
    pub fn render(
        &mut self,
        gl: &dyn GlBackend,
        shader_type: ShaderType,
        frame: &Frame,
        background: TextureId,
        mask: TextureId,
        viewport: Viewport,
    ) -> Result<(), EffectError> {
        let textures = self.drawer.callbacks_mut();
        textures.background = Some(background);
        textures.mask = Some(mask);

        gl.clear_color(1.0, 1.0, 1.0, 1.0);
        gl.clear(glow::COLOR_BUFFER_BIT);
        self.drawer.draw(gl, shader_type, frame, viewport)?;

        for unit in [MASK_UNIT, BACKGROUND_UNIT] {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        gl.active_texture(glow::TEXTURE0);
        check_no_error(gl, "CompositePass.render")
    }

    pub fn release(&mut self, gl: &dyn GlBackend) {
        self.drawer.release(gl);
    }
}
