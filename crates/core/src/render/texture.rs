//! Texture storage formats.
//!
//! A [`TextureFormat`] is the (internal format, pixel format, pixel type)
//! triple handed to `glTexImage2D`. The three values must be a valid
//! combination for the context; GL reports a mismatch, this type does not
//! check it.

/// Storage layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFormat {
    /// Sized internal format (e.g. `glow::RGBA8`).
    pub internal_format: u32,
    /// Pixel layout of uploads (e.g. `glow::RGBA`).
    pub pixel_format: u32,
    /// Component type of uploads (e.g. `glow::UNSIGNED_BYTE`).
    pub pixel_type: u32,
}

impl TextureFormat {
    /// Creates a format from an explicit triple.
    pub const fn new(internal_format: u32, pixel_format: u32, pixel_type: u32) -> Self {
        Self {
            internal_format,
            pixel_format,
            pixel_type,
        }
    }

    /// 8-bit RGBA. Used for intermediate color buffers and background images.
    pub const fn rgba8() -> Self {
        Self::new(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE)
    }

    /// Single-channel 32-bit float. Used for raw segmentation confidences.
    pub const fn r32f() -> Self {
        Self::new(glow::R32F, glow::RED, glow::FLOAT)
    }
}
