//! Segmentation masks and their GPU upload/smoothing chain.

use tracing::debug;

use super::blur::{BlurKind, BlurPass};
use crate::drawer::Frame;
use crate::error::EffectError;
use crate::gl::{check_no_error, gl_size, GlBackend, TextureId};
use crate::render::ping_pong::PingPong;
use crate::render::target::TextureFrameBuffer;
use crate::render::texture::TextureFormat;

/// Per-pixel foreground confidence in `[0, 1]`, row-major, one `f32` per
/// pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    width: u32,
    height: u32,
    confidence: Vec<f32>,
}

impl SegmentationMask {
    /// # Errors
    ///
    /// [`EffectError::InvalidSize`] for a zero dimension and
    /// [`EffectError::InvalidMask`] when `confidence.len() != width * height`.
    pub fn new(width: u32, height: u32, confidence: Vec<f32>) -> Result<Self, EffectError> {
        gl_size(width, height)?;
        let expected = width as usize * height as usize;
        if confidence.len() != expected {
            return Err(EffectError::InvalidMask {
                width,
                height,
                expected,
                got: confidence.len(),
            });
        }
        Ok(Self {
            width,
            height,
            confidence,
        })
    }

    /// Builds a mask from native-endian `f32` bytes, as segmentation
    /// runtimes usually hand them out.
    pub fn from_ne_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, EffectError> {
        if bytes.len() % 4 != 0 {
            let expected = width as usize * height as usize;
            return Err(EffectError::InvalidMask {
                width,
                height,
                expected,
                got: bytes.len() / 4,
            });
        }
        let confidence = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(width, height, confidence)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn confidence(&self) -> &[f32] {
        &self.confidence
    }

    fn to_ne_bytes(&self) -> Vec<u8> {
        self.confidence
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect()
    }
}

/// Uploads masks into an `R32F` texture, box-blurs them into one of two
/// RGBA8 slots, and exposes the most recent result.
#[derive(Debug)]
pub struct MaskChain {
    upload: TextureFrameBuffer,
    scratch: TextureFrameBuffer,
    slots: [TextureFrameBuffer; 2],
    ping_pong: PingPong,
    blur: BlurPass,
    has_mask: bool,
}

impl Default for MaskChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskChain {
    pub fn new() -> Self {
        Self {
            upload: TextureFrameBuffer::new(TextureFormat::r32f()),
            scratch: TextureFrameBuffer::new(TextureFormat::rgba8()),
            slots: [
                TextureFrameBuffer::new(TextureFormat::rgba8()),
                TextureFrameBuffer::new(TextureFormat::rgba8()),
            ],
            ping_pong: PingPong::new(),
            blur: BlurPass::new(BlurKind::Box),
            has_mask: false,
        }
    }

    /// Uploads `mask`, smooths it with `blur_radius` into the write slot and
    /// makes that slot current.
    pub fn update(
        &mut self,
        gl: &dyn GlBackend,
        mask: &SegmentationMask,
        blur_radius: f32,
    ) -> Result<(), EffectError> {
        let (width, height) = (mask.width, mask.height);
        let (gl_width, gl_height) = gl_size(width, height)?;
        self.upload.set_size(gl, width, height)?;
        let raw = self.upload.texture().ok_or(EffectError::NotAllocated)?;

        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(raw));
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            gl_width,
            gl_height,
            glow::RED,
            glow::FLOAT,
            &mask.to_ne_bytes(),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        check_no_error(gl, "MaskChain.upload")?;

        // Only the write slot is resized; the read slot stays valid until swap.
        let write = self.ping_pong.write(&mut self.slots);
        self.blur.apply(
            gl,
            &Frame::identity(raw, width, height),
            blur_radius,
            &mut self.scratch,
            write,
        )?;
        self.ping_pong.swap();
        self.has_mask = true;
        debug!(width, height, slot = self.ping_pong.read_index(), "mask updated");
        Ok(())
    }

    /// The smoothed mask from the latest successful update.
    pub fn current(&self) -> Option<TextureId> {
        if !self.has_mask {
            return None;
        }
        self.ping_pong.read(&self.slots).texture()
    }

    pub fn has_mask(&self) -> bool {
        self.has_mask
    }

    pub fn release(&mut self, gl: &dyn GlBackend) {
        self.blur.release(gl);
        self.upload.release(gl);
        self.scratch.release(gl);
        for slot in &mut self.slots {
            slot.release(gl);
        }
        self.ping_pong = PingPong::new();
        self.has_mask = false;
    }
}
