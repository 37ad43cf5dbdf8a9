//! Off-screen render target: one texture attached as the only color
//! attachment of one framebuffer.
//!
//! Intended for simple passes such as texture copy, downscaling, blurring
//! and mask processing. No depth or stencil. Not thread safe; every method
//! that takes a `gl` must run on the thread with the GL context current.

use tracing::{debug, warn};

use super::texture::TextureFormat;
use crate::error::EffectError;
use crate::gl::{check_no_error, gl_size, FramebufferId, GlBackend, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Unallocated,
    Allocated {
        texture: TextureId,
        framebuffer: FramebufferId,
    },
}

/// A texture plus framebuffer pair, allocated lazily on the first
/// [`set_size`](Self::set_size) and resized in place afterwards.
///
/// GPU objects are freed by [`release`](Self::release), never by `Drop`,
/// because dropping has no GL context to call into.
#[derive(Debug)]
pub struct TextureFrameBuffer {
    format: TextureFormat,
    storage: Storage,
    width: u32,
    height: u32,
}

impl TextureFrameBuffer {
    /// Records the storage format. Touches no GL state.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            storage: Storage::Unallocated,
            width: 0,
            height: 0,
        }
    }

    /// (Re)allocates texture storage at `width` x `height`.
    ///
    /// Does nothing if the size is unchanged. The texture and framebuffer
    /// names are created on first use and reused for every later size.
    /// Must be called at least once before the target is drawn into.
    ///
    /// # Errors
    ///
    /// - [`EffectError::InvalidSize`] for a zero dimension or one that does
    ///   not fit a GL size. Nothing is changed.
    /// - [`EffectError::Gl`] if a GL object cannot be created.
    /// - [`EffectError::Driver`] if GL rejects the storage, e.g. a format
    ///   triple the context does not support. The previous size is kept.
    /// - [`EffectError::IncompleteFramebuffer`] if the attachment fails the
    ///   completeness check. The objects stay allocated and the previous
    ///   size is kept; release the target rather than retrying.
    pub fn set_size(
        &mut self,
        gl: &dyn GlBackend,
        width: u32,
        height: u32,
    ) -> Result<(), EffectError> {
        let (w, h) = gl_size(width, height)?;
        if width == self.width && height == self.height {
            return Ok(());
        }

        let (texture, framebuffer) = self.ensure_allocated(gl)?;

        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_image_2d(glow::TEXTURE_2D, self.format, w, h);
        gl.bind_texture(glow::TEXTURE_2D, None);
        check_no_error(gl, "TextureFrameBuffer.set_size")?;

        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0,
            glow::TEXTURE_2D,
            Some(texture),
            0,
        );
        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);

        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(EffectError::IncompleteFramebuffer { status });
        }

        debug!(
            texture = texture.get(),
            framebuffer = framebuffer.get(),
            from_width = self.width,
            from_height = self.height,
            width,
            height,
            "resized texture frame buffer"
        );
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn ensure_allocated(
        &mut self,
        gl: &dyn GlBackend,
    ) -> Result<(TextureId, FramebufferId), EffectError> {
        if let Storage::Allocated {
            texture,
            framebuffer,
        } = self.storage
        {
            return Ok((texture, framebuffer));
        }

        let texture = gl.create_texture().map_err(EffectError::Gl)?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        for (parameter, value) in [
            (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
            (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
            (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
            (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
        ] {
            gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value as i32);
        }
        gl.bind_texture(glow::TEXTURE_2D, None);

        let framebuffer = match gl.create_framebuffer() {
            Ok(fb) => fb,
            Err(e) => {
                gl.delete_texture(texture);
                return Err(EffectError::Gl(e));
            }
        };

        debug!(
            texture = texture.get(),
            framebuffer = framebuffer.get(),
            "allocated texture frame buffer"
        );
        self.storage = Storage::Allocated {
            texture,
            framebuffer,
        };
        Ok((texture, framebuffer))
    }

    /// Binds the framebuffer as the draw target and sets the viewport to
    /// cover it.
    ///
    /// # Errors
    ///
    /// [`EffectError::NotAllocated`] before the first allocation.
    pub fn bind(&self, gl: &dyn GlBackend) -> Result<(), EffectError> {
        let framebuffer = self.framebuffer().ok_or(EffectError::NotAllocated)?;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
        gl.viewport(0, 0, self.width as i32, self.height as i32);
        Ok(())
    }

    /// Deletes the texture and framebuffer and returns to the unsized state.
    ///
    /// Safe to call repeatedly; the target may be sized again afterwards.
    pub fn release(&mut self, gl: &dyn GlBackend) {
        if let Storage::Allocated {
            texture,
            framebuffer,
        } = self.storage
        {
            gl.delete_texture(texture);
            gl.delete_framebuffer(framebuffer);
            debug!(
                texture = texture.get(),
                framebuffer = framebuffer.get(),
                "released texture frame buffer"
            );
        }
        self.storage = Storage::Unallocated;
        self.width = 0;
        self.height = 0;
    }

    /// Current width, 0 before the first successful `set_size`.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height, 0 before the first successful `set_size`.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// The color texture, for sampling the rendered result.
    pub fn texture(&self) -> Option<TextureId> {
        match self.storage {
            Storage::Allocated { texture, .. } => Some(texture),
            Storage::Unallocated => None,
        }
    }

    /// The framebuffer, for use as a draw target.
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        match self.storage {
            Storage::Allocated { framebuffer, .. } => Some(framebuffer),
            Storage::Unallocated => None,
        }
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self.storage, Storage::Allocated { .. })
    }
}

impl Drop for TextureFrameBuffer {
    fn drop(&mut self) {
        if let Storage::Allocated {
            texture,
            framebuffer,
        } = self.storage
        {
            warn!(
                texture = texture.get(),
                framebuffer = framebuffer.get(),
                "texture frame buffer dropped without release; GPU objects leaked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{GlCall, MockGl};

    fn is_create(call: &GlCall) -> bool {
        matches!(
            call,
            GlCall::CreateTexture(_) | GlCall::CreateFramebuffer(_)
        )
    }

    #[test]
    fn new_touches_no_gl_state() {
        let fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        assert_eq!(fb.width(), 0);
        assert_eq!(fb.height(), 0);
        assert!(fb.texture().is_none());
        assert!(fb.framebuffer().is_none());
        assert!(!fb.is_allocated());
    }

    #[test]
    fn set_size_allocates_and_reports_dimensions() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 100, 100).unwrap();

        assert_eq!(fb.width(), 100);
        assert_eq!(fb.height(), 100);
        assert!(fb.texture().is_some());
        assert!(fb.framebuffer().is_some());
        fb.release(&gl);
    }

    #[test]
    fn set_size_specifies_storage_with_format_triple() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::r32f());
        fb.set_size(&gl, 256, 144).unwrap();

        assert!(gl.calls().contains(&GlCall::TexImage2d {
            format: TextureFormat::r32f(),
            width: 256,
            height: 144,
        }));
        fb.release(&gl);
    }

    #[test]
    fn set_size_attaches_texture_and_restores_default_framebuffer() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 8, 8).unwrap();

        let tex = fb.texture().unwrap().get();
        let fbo = fb.framebuffer().unwrap().get();
        let calls = gl.calls();
        let bind = calls
            .iter()
            .position(|c| *c == GlCall::BindFramebuffer(Some(fbo)))
            .unwrap();
        assert_eq!(calls[bind + 1], GlCall::FramebufferTexture2d(Some(tex)));
        assert_eq!(calls[bind + 2], GlCall::CheckFramebufferStatus);
        assert_eq!(calls[bind + 3], GlCall::BindFramebuffer(None));
        fb.release(&gl);
    }

    #[test]
    fn same_size_twice_is_a_no_op() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 100, 100).unwrap();
        let tex = fb.texture();
        gl.clear_calls();

        fb.set_size(&gl, 100, 100).unwrap();

        assert!(gl.calls().is_empty(), "second call issued {:?}", gl.calls());
        assert_eq!(fb.texture(), tex);
        fb.release(&gl);
    }

    #[test]
    fn resize_reuses_handles() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 100, 100).unwrap();
        let tex = fb.texture();
        let fbo = fb.framebuffer();

        fb.set_size(&gl, 200, 50).unwrap();

        assert_eq!(fb.texture(), tex);
        assert_eq!(fb.framebuffer(), fbo);
        assert_eq!((fb.width(), fb.height()), (200, 50));
        assert_eq!(gl.count(is_create), 2, "handles must be created once");
        fb.release(&gl);
    }

    #[test]
    fn zero_size_is_rejected_without_side_effects() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 64, 32).unwrap();
        let tex = fb.texture();
        gl.clear_calls();

        for (w, h) in [(0, 10), (10, 0), (0, 0)] {
            let err = fb.set_size(&gl, w, h).unwrap_err();
            assert!(matches!(err, EffectError::InvalidSize { .. }), "got {err:?}");
        }

        assert!(gl.calls().is_empty());
        assert_eq!((fb.width(), fb.height()), (64, 32));
        assert_eq!(fb.texture(), tex);
        fb.release(&gl);
    }

    #[test]
    fn oversized_dimension_is_rejected() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        let err = fb.set_size(&gl, u32::MAX, 1).unwrap_err();
        assert!(matches!(err, EffectError::InvalidSize { .. }));
        assert!(!fb.is_allocated());
    }

    #[test]
    fn incomplete_framebuffer_keeps_handles_and_old_size() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 100, 100).unwrap();

        gl.set_framebuffer_status(glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT);
        let err = fb.set_size(&gl, 300, 300).unwrap_err();

        assert!(matches!(
            err,
            EffectError::IncompleteFramebuffer {
                status: glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT
            }
        ));
        assert!(fb.is_allocated());
        assert_eq!((fb.width(), fb.height()), (100, 100));
        assert_eq!(gl.calls().last(), Some(&GlCall::BindFramebuffer(None)));
        fb.release(&gl);
    }

    #[test]
    fn rejected_storage_reports_driver_error_and_keeps_old_size() {
        let gl = MockGl::new();
        let format = TextureFormat::new(glow::RGBA8, glow::RED, glow::FLOAT);
        let mut fb = TextureFrameBuffer::new(format);
        fb.set_size(&gl, 32, 32).unwrap();

        gl.push_error(glow::INVALID_OPERATION);
        let err = fb.set_size(&gl, 64, 64).unwrap_err();

        match err {
            EffectError::Driver { label, code } => {
                assert_eq!(label, "TextureFrameBuffer.set_size");
                assert_eq!(code, glow::INVALID_OPERATION);
            }
            other => panic!("expected driver error, got {other:?}"),
        }
        assert_eq!((fb.width(), fb.height()), (32, 32));
        assert!(check_no_error(&gl, "next pass").is_ok());
        fb.release(&gl);
    }

    #[test]
    fn failed_texture_creation_leaves_unallocated() {
        let gl = MockGl::new();
        gl.fail_texture_creation(true);
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());

        let err = fb.set_size(&gl, 16, 16).unwrap_err();

        assert!(matches!(err, EffectError::Gl(_)));
        assert!(!fb.is_allocated());
        assert_eq!((fb.width(), fb.height()), (0, 0));
        assert_eq!(gl.count(|c| matches!(c, GlCall::CreateFramebuffer(_))), 0);

        gl.fail_texture_creation(false);
        fb.set_size(&gl, 16, 16).unwrap();
        assert!(fb.is_allocated());
        fb.release(&gl);
    }

    #[test]
    fn incomplete_on_first_size_leaves_allocated_but_unsized() {
        let gl = MockGl::new();
        gl.set_framebuffer_status(glow::FRAMEBUFFER_UNSUPPORTED);
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());

        assert!(fb.set_size(&gl, 16, 16).is_err());
        assert!(fb.is_allocated());
        assert_eq!((fb.width(), fb.height()), (0, 0));
        fb.release(&gl);
    }

    #[test]
    fn failed_framebuffer_creation_frees_texture() {
        let gl = MockGl::new();
        gl.fail_framebuffer_creation(true);
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());

        let err = fb.set_size(&gl, 16, 16).unwrap_err();

        assert!(matches!(err, EffectError::Gl(_)));
        assert!(!fb.is_allocated());
        let created = gl
            .calls()
            .iter()
            .find_map(|c| match c {
                GlCall::CreateTexture(t) => Some(*t),
                _ => None,
            })
            .unwrap();
        assert!(gl.calls().contains(&GlCall::DeleteTexture(created)));
    }

    #[test]
    fn release_resets_to_initial_state_and_allows_reuse() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 100, 100).unwrap();
        let tex = fb.texture().unwrap().get();
        let fbo = fb.framebuffer().unwrap().get();

        fb.release(&gl);

        assert!(gl.calls().contains(&GlCall::DeleteTexture(tex)));
        assert!(gl.calls().contains(&GlCall::DeleteFramebuffer(fbo)));
        assert_eq!((fb.width(), fb.height()), (0, 0));
        assert!(fb.texture().is_none());
        assert!(fb.framebuffer().is_none());

        fb.set_size(&gl, 100, 100).unwrap();
        assert!(fb.is_allocated());
        assert_eq!(fb.width(), 100);
        fb.release(&gl);
    }

    #[test]
    fn double_release_is_harmless() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 10, 10).unwrap();
        fb.release(&gl);
        gl.clear_calls();

        fb.release(&gl);

        assert!(gl.calls().is_empty());
        assert!(!fb.is_allocated());
    }

    #[test]
    fn release_before_any_size_is_harmless() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.release(&gl);
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn bind_before_size_is_not_allocated() {
        let gl = MockGl::new();
        let fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        assert!(matches!(fb.bind(&gl), Err(EffectError::NotAllocated)));
    }

    #[test]
    fn bind_sets_framebuffer_and_viewport() {
        let gl = MockGl::new();
        let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
        fb.set_size(&gl, 320, 180).unwrap();
        gl.clear_calls();

        fb.bind(&gl).unwrap();

        assert_eq!(
            gl.calls(),
            vec![
                GlCall::BindFramebuffer(fb.framebuffer().map(FramebufferId::get)),
                GlCall::Viewport {
                    x: 0,
                    y: 0,
                    width: 320,
                    height: 180
                },
            ]
        );
        fb.release(&gl);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn dimension() -> impl Strategy<Value = u32> {
            1_u32..=4096
        }

        proptest! {
            #[test]
            fn repeated_size_allocates_once(w in dimension(), h in dimension()) {
                let gl = MockGl::new();
                let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
                fb.set_size(&gl, w, h).unwrap();
                let after_first = gl.calls().len();
                fb.set_size(&gl, w, h).unwrap();
                prop_assert_eq!(gl.calls().len(), after_first);
                prop_assert_eq!((fb.width(), fb.height()), (w, h));
                fb.release(&gl);
            }

            #[test]
            fn zero_dimension_never_changes_state(
                w in dimension(),
                h in dimension(),
                zero_width in any::<bool>(),
            ) {
                let gl = MockGl::new();
                let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
                fb.set_size(&gl, w, h).unwrap();
                let tex = fb.texture();
                let (bw, bh) = if zero_width { (0, h) } else { (w, 0) };
                prop_assert!(fb.set_size(&gl, bw, bh).is_err());
                prop_assert_eq!((fb.width(), fb.height()), (w, h));
                prop_assert_eq!(fb.texture(), tex);
                fb.release(&gl);
            }

            #[test]
            fn size_sequence_keeps_handles(
                sizes in prop::collection::vec((dimension(), dimension()), 1..8)
            ) {
                let gl = MockGl::new();
                let mut fb = TextureFrameBuffer::new(TextureFormat::rgba8());
                let (w0, h0) = sizes[0];
                fb.set_size(&gl, w0, h0).unwrap();
                let tex = fb.texture();
                let fbo = fb.framebuffer();
                for &(w, h) in &sizes {
                    fb.set_size(&gl, w, h).unwrap();
                    prop_assert_eq!(fb.texture(), tex);
                    prop_assert_eq!(fb.framebuffer(), fbo);
                    prop_assert_eq!((fb.width(), fb.height()), (w, h));
                }
                fb.release(&gl);
            }
        }
    }
}
