//! The virtual-background effect: segmentation-driven compositing of each
//! camera frame over either a blurred copy of itself or a still image.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use super::blur::BlurPass;
use super::composite::CompositePass;
use super::mask::{MaskChain, SegmentationMask};
use super::resample::Resampler;
use super::shaders::PASS_THROUGH_FRAGMENT;
use crate::config::EffectConfig;
use crate::drawer::{EmptyCallbacks, Frame, GenericDrawer, ShaderType, Viewport, EMPTY_CALLBACKS};
use crate::error::EffectError;
use crate::gl::{check_no_error, gl_size, GlBackend, TextureId};
use crate::render::target::TextureFrameBuffer;
use crate::render::texture::TextureFormat;

/// Tightly packed RGBA8 pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl BackgroundImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, EffectError> {
        gl_size(width, height)?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(EffectError::InvalidImage {
                width,
                height,
                expected,
                got: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// Copies out `rect`, which must lie inside the image.
    pub fn crop(&self, rect: CropRect) -> Result<Self, EffectError> {
        let inside = rect.x.checked_add(rect.width).is_some_and(|r| r <= self.width)
            && rect.y.checked_add(rect.height).is_some_and(|b| b <= self.height);
        if !inside {
            return Err(EffectError::InvalidSize {
                width: rect.width,
                height: rect.height,
            });
        }
        let stride = self.width as usize * 4;
        let row_bytes = rect.width as usize * 4;
        let mut rgba = Vec::with_capacity(row_bytes * rect.height as usize);
        for row in rect.y..rect.y + rect.height {
            let start = row as usize * stride + rect.x as usize * 4;
            rgba.extend_from_slice(&self.rgba[start..start + row_bytes]);
        }
        Self::new(rect.width, rect.height, rgba)
    }
}

/// A sub-rectangle of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The largest centered rectangle of the image with the target's aspect
/// ratio. The image's full extent is kept along the axis it is relatively
/// shorter on.
pub fn fit_background(
    image_width: u32,
    image_height: u32,
    target_width: u32,
    target_height: u32,
) -> Result<CropRect, EffectError> {
    gl_size(image_width, image_height)?;
    gl_size(target_width, target_height)?;

    let (iw, ih) = (f64::from(image_width), f64::from(image_height));
    let target_aspect = f64::from(target_width) / f64::from(target_height);

    if iw / ih > target_aspect {
        let width = ((ih * target_aspect).round() as u32).clamp(1, image_width);
        Ok(CropRect {
            x: (image_width - width) / 2,
            y: 0,
            width,
            height: image_height,
        })
    } else {
        let height = ((iw / target_aspect).round() as u32).clamp(1, image_height);
        Ok(CropRect {
            x: 0,
            y: (image_height - height) / 2,
            width: image_width,
            height,
        })
    }
}

type MaskSlot = Arc<Mutex<Option<SegmentationMask>>>;

/// Hands masks from a segmentation thread to the render thread. Only the
/// newest undelivered mask is kept.
#[derive(Debug, Clone)]
pub struct MaskSender {
    slot: MaskSlot,
}

impl MaskSender {
    pub fn send(&self, mask: SegmentationMask) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(mask);
    }
}

fn take_mask(slot: &MaskSlot) -> Option<SegmentationMask> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// GPU passes and targets, created on the first draw.
#[derive(Debug)]
struct Passes {
    pass_through: GenericDrawer<EmptyCallbacks>,
    resampler: Resampler,
    background_blur: BlurPass,
    blur_targets: [TextureFrameBuffer; 2],
    masks: MaskChain,
    composite: CompositePass,
}

impl Passes {
    fn new(config: &EffectConfig) -> Self {
        Self {
            pass_through: GenericDrawer::new(PASS_THROUGH_FRAGMENT, EMPTY_CALLBACKS),
            resampler: Resampler::new(),
            background_blur: BlurPass::new(config.background_blur),
            blur_targets: [
                TextureFrameBuffer::new(TextureFormat::rgba8()),
                TextureFrameBuffer::new(TextureFormat::rgba8()),
            ],
            masks: MaskChain::new(),
            composite: CompositePass::new(),
        }
    }

    fn release(&mut self, gl: &dyn GlBackend) {
        self.pass_through.release(gl);
        self.resampler.release(gl);
        self.background_blur.release(gl);
        for target in &mut self.blur_targets {
            target.release(gl);
        }
        self.masks.release(gl);
        self.composite.release(gl);
    }

    /// Uploads `image` into the first blur target and returns its texture.
    fn upload_background(
        &mut self,
        gl: &dyn GlBackend,
        image: &BackgroundImage,
    ) -> Result<TextureId, EffectError> {
        let (width, height) = gl_size(image.width, image.height)?;
        let target = &mut self.blur_targets[0];
        target.set_size(gl, image.width, image.height)?;
        let texture = target.texture().ok_or(EffectError::NotAllocated)?;

        gl.active_texture(glow::TEXTURE0);
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_sub_image_2d(
            glow::TEXTURE_2D,
            width,
            height,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            &image.rgba,
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        check_no_error(gl, "VirtualBackground.upload_background")?;
        debug!(width, height, "background image uploaded");
        Ok(texture)
    }

    /// Downsamples `frame` and blurs it; returns the blurred texture.
    fn blur_frame(
        &mut self,
        gl: &dyn GlBackend,
        config: &EffectConfig,
        frame: &Frame,
    ) -> Result<TextureId, EffectError> {
        let (width, height) = config.downsampled_size(frame.width, frame.height);
        // Sampled in frame space; the composite applies the frame transform.
        let untransformed = Frame::identity(frame.texture, frame.width, frame.height);
        let small = self
            .resampler
            .resample(gl, ShaderType::Oes, &untransformed, width, height)?;
        let [first, second] = &mut self.blur_targets;
        self.background_blur.apply(
            gl,
            &Frame::identity(small, width, height),
            config.blur_radius,
            first,
            second,
        )
    }
}

/// Replaces or blurs everything behind the person in a camera frame.
///
/// Draw calls must come from the thread that owns the GL context. Masks may
/// arrive from any thread through a [`MaskSender`].
#[derive(Debug)]
pub struct VirtualBackground {
    config: EffectConfig,
    passes: Option<Passes>,
    pending_mask: MaskSlot,
    background: Option<BackgroundImage>,
    background_dirty: bool,
}

impl Default for VirtualBackground {
    fn default() -> Self {
        Self::new(EffectConfig::default())
    }
}

impl VirtualBackground {
    pub fn new(config: EffectConfig) -> Self {
        Self {
            config,
            passes: None,
            pending_mask: Arc::new(Mutex::new(None)),
            background: None,
            background_dirty: false,
        }
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    /// Validates and applies `config`. A changed blur kind takes effect on
    /// the next draw.
    pub fn set_config(&mut self, gl: &dyn GlBackend, config: EffectConfig) -> Result<(), EffectError> {
        config.validate()?;
        if let Some(passes) = &mut self.passes {
            if passes.background_blur.kind() != config.background_blur {
                passes.background_blur.release(gl);
                passes.background_blur = BlurPass::new(config.background_blur);
            }
        }
        self.config = config;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// A handle for delivering masks from another thread.
    pub fn mask_sender(&self) -> MaskSender {
        MaskSender {
            slot: Arc::clone(&self.pending_mask),
        }
    }

    /// Queues `mask` for the next draw, replacing any undelivered mask.
    pub fn update_mask(&self, mask: SegmentationMask) {
        self.mask_sender().send(mask);
    }

    /// Sets or clears the replacement image. `None` switches back to
    /// blurring the frame.
    pub fn set_background_image(&mut self, image: Option<BackgroundImage>) {
        if self.background == image {
            return;
        }
        self.background_dirty = image.is_some();
        self.background = image;
        info!(image = self.background.is_some(), "background source changed");
    }

    pub fn background_image(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }

    /// Renders `frame` (an external OES texture) into the default
    /// framebuffer at `viewport`. Intermediate passes use their own targets.
    ///
    /// The frame is passed through unchanged while the effect is disabled or
    /// before the first mask arrives.
    pub fn draw(
        &mut self,
        gl: &dyn GlBackend,
        frame: &Frame,
        viewport: Viewport,
    ) -> Result<(), EffectError> {
        let config = self.config;
        let passes = self
            .passes
            .get_or_insert_with(|| Passes::new(&config));

        if !config.enabled {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            return passes.pass_through.draw_oes(gl, frame, viewport);
        }

        if let Some(mask) = take_mask(&self.pending_mask) {
            passes.masks.update(gl, &mask, config.mask_blur_radius)?;
        }
        let Some(mask) = passes.masks.current() else {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            return passes.pass_through.draw_oes(gl, frame, viewport);
        };

        let background = match &self.background {
            Some(image) if self.background_dirty => {
                let texture = passes.upload_background(gl, image)?;
                self.background_dirty = false;
                texture
            }
            Some(_) => passes.blur_targets[0]
                .texture()
                .ok_or(EffectError::NotAllocated)?,
            None => passes.blur_frame(gl, &config, frame)?,
        };

        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        passes
            .composite
            .render(gl, ShaderType::Oes, frame, background, mask, viewport)
    }

    /// Frees every GPU object. The next draw recreates them; a set background
    /// image is uploaded again.
    pub fn release(&mut self, gl: &dyn GlBackend) {
        if let Some(mut passes) = self.passes.take() {
            passes.release(gl);
            debug!("virtual background released");
        }
        self.background_dirty = self.background.is_some();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::TEXTURE_EXTERNAL_OES;
    use crate::mock::{GlCall, MockGl};
    use crate::effects::shaders::{BACKGROUND_UNIFORM, COMPOSITE_FRAGMENT};
    use glam::Mat4;
    use proptest::prelude::*;

    fn camera_frame(gl: &MockGl) -> Frame {
        Frame {
            texture: gl.create_texture().unwrap(),
            tex_matrix: Mat4::from_scale(glam::Vec3::new(1.0, -1.0, 1.0)),
            width: 64,
            height: 48,
        }
    }

    fn mask() -> SegmentationMask {
        SegmentationMask::new(16, 12, vec![1.0; 16 * 12]).unwrap()
    }

    fn image(width: u32, height: u32) -> BackgroundImage {
        BackgroundImage::new(width, height, vec![7; (width * height * 4) as usize]).unwrap()
    }

    fn compiled_composite(gl: &MockGl) -> bool {
        gl.calls().iter().any(|c| match c {
            GlCall::CreateProgram(id) => gl
                .program_sources(crate::gl::ProgramId::new(*id).unwrap())
                .is_some_and(|(_, fs)| fs.ends_with(COMPOSITE_FRAGMENT)),
            _ => false,
        })
    }

    fn draws(gl: &MockGl) -> usize {
        gl.count(|c| matches!(c, GlCall::DrawArrays { .. }))
    }

    #[test]
    fn image_rejects_wrong_buffer_length() {
        let err = BackgroundImage::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            EffectError::InvalidImage {
                expected: 16,
                got: 15,
                ..
            }
        ));
    }

    #[test]
    fn fit_crops_wide_image_horizontally() {
        let rect = fit_background(1920, 1080, 720, 1280).unwrap();
        assert_eq!(rect.height, 1080);
        assert_eq!(rect.width, 608);
        assert_eq!(rect.x, (1920 - 608) / 2);
        assert_eq!(rect.y, 0);
    }

    #[test]
    fn fit_crops_tall_image_vertically() {
        let rect = fit_background(1000, 2000, 4, 3).unwrap();
        assert_eq!(rect.width, 1000);
        assert_eq!(rect.height, 750);
        assert_eq!(rect.y, 625);
    }

    #[test]
    fn fit_matching_aspect_keeps_whole_image() {
        let rect = fit_background(640, 480, 320, 240).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 0,
                y: 0,
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn fit_rejects_zero_sizes() {
        assert!(fit_background(0, 10, 10, 10).is_err());
        assert!(fit_background(10, 10, 10, 0).is_err());
    }

    #[test]
    fn crop_copies_the_selected_rows() {
        let pixels: Vec<u8> = (0..4 * 3 * 4).map(|i| i as u8).collect();
        let img = BackgroundImage::new(4, 3, pixels).unwrap();
        let cropped = img
            .crop(CropRect {
                x: 1,
                y: 1,
                width: 2,
                height: 2,
            })
            .unwrap();
        assert_eq!(
            cropped.pixels(),
            &[20, 21, 22, 23, 24, 25, 26, 27, 36, 37, 38, 39, 40, 41, 42, 43]
        );
    }

    #[test]
    fn crop_outside_image_is_rejected() {
        let img = image(4, 4);
        let rect = CropRect {
            x: 3,
            y: 0,
            width: 2,
            height: 1,
        };
        assert!(img.crop(rect).is_err());
    }

    #[test]
    fn passes_frame_through_before_first_mask() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        assert_eq!(draws(&gl), 1);
        assert!(!compiled_composite(&gl));
        assert!(gl.calls().contains(&GlCall::BindTexture {
            target: TEXTURE_EXTERNAL_OES,
            texture: Some(frame.texture.get())
        }));
        vb.release(&gl);
    }

    #[test]
    fn disabled_effect_ignores_masks() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.set_enabled(false);
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        assert_eq!(draws(&gl), 1);
        assert_eq!(gl.count(|c| matches!(c, GlCall::TexSubImage2d { .. })), 0);
        vb.release(&gl);
    }

    #[test]
    fn blur_mode_runs_mask_background_and_composite() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.mask_sender().send(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        // mask blur (2) + resample (1) + background blur (2) + composite (1)
        assert_eq!(draws(&gl), 6);
        assert!(compiled_composite(&gl));
        assert!(gl.calls().contains(&GlCall::Viewport {
            x: 0,
            y: 0,
            width: 32,
            height: 24
        }));
        vb.release(&gl);
    }

    #[test]
    fn mask_is_consumed_once() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();
        gl.clear_calls();
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        assert_eq!(gl.count(|c| matches!(c, GlCall::TexSubImage2d { .. })), 0);
        // resample + background blur + composite, reusing the last mask
        assert_eq!(draws(&gl), 4);
        vb.release(&gl);
    }

    #[test]
    fn only_latest_pending_mask_is_uploaded() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        let sender = vb.mask_sender();
        sender.send(SegmentationMask::new(2, 2, vec![0.0; 4]).unwrap());
        sender.send(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        let uploads: Vec<_> = gl
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GlCall::TexSubImage2d { .. }))
            .collect();
        assert_eq!(
            uploads,
            vec![GlCall::TexSubImage2d {
                width: 16,
                height: 12,
                pixel_format: glow::RED,
                pixel_type: glow::FLOAT,
                len: 16 * 12 * 4,
            }]
        );
        vb.release(&gl);
    }

    #[test]
    fn background_image_is_uploaded_only_when_changed() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.set_background_image(Some(image(8, 8)));
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();
        vb.set_background_image(Some(image(8, 8)));
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        let image_uploads = gl.count(|c| {
            matches!(
                c,
                GlCall::TexSubImage2d {
                    pixel_format: glow::RGBA,
                    ..
                }
            )
        });
        assert_eq!(image_uploads, 1);
        vb.release(&gl);
    }

    #[test]
    fn image_mode_skips_frame_blur() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.set_background_image(Some(image(8, 8)));
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        // mask blur (2) + composite (1)
        assert_eq!(draws(&gl), 3);
        vb.release(&gl);
    }

    #[test]
    fn clearing_image_returns_to_blur() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.set_background_image(Some(image(8, 8)));
        vb.update_mask(mask());
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        vb.set_background_image(None);
        gl.clear_calls();
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        assert_eq!(draws(&gl), 4);
        vb.release(&gl);
    }

    #[test]
    fn composite_samples_background_on_unit_one() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        assert!(gl.calls().contains(&GlCall::Uniform1i {
            name: BACKGROUND_UNIFORM.into(),
            value: 1
        }));
        vb.release(&gl);
    }

    #[test]
    fn composite_uses_frame_transform() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.update_mask(mask());

        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        let last_matrix = gl
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GlCall::UniformMatrix4 { value, .. } => Some(value),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_matrix, frame.tex_matrix.to_cols_array());
        vb.release(&gl);
    }

    #[test]
    fn set_config_validates_and_swaps_blur_kind() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.update_mask(mask());
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        let bad = EffectConfig {
            downsample_factor: 0,
            ..EffectConfig::default()
        };
        assert!(vb.set_config(&gl, bad).is_err());
        assert_eq!(vb.config().downsample_factor, 2);

        let boxed = EffectConfig {
            background_blur: crate::effects::blur::BlurKind::Box,
            ..EffectConfig::default()
        };
        vb.set_config(&gl, boxed).unwrap();
        assert_eq!(vb.config().background_blur, crate::effects::blur::BlurKind::Box);
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();
        vb.release(&gl);
    }

    #[test]
    fn release_then_draw_recreates_and_reuploads() {
        let gl = MockGl::new();
        let frame = camera_frame(&gl);
        let mut vb = VirtualBackground::default();
        vb.set_background_image(Some(image(4, 4)));
        vb.update_mask(mask());
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        vb.release(&gl);
        gl.clear_calls();
        vb.update_mask(mask());
        vb.draw(&gl, &frame, Viewport::full(64, 48)).unwrap();

        let image_uploads = gl.count(|c| {
            matches!(
                c,
                GlCall::TexSubImage2d {
                    pixel_format: glow::RGBA,
                    ..
                }
            )
        });
        assert_eq!(image_uploads, 1);
        vb.release(&gl);
    }

    proptest! {
        #[test]
        fn fit_rect_stays_inside_and_centered(
            iw in 1u32..4000, ih in 1u32..4000, tw in 1u32..4000, th in 1u32..4000,
        ) {
            let rect = fit_background(iw, ih, tw, th).unwrap();
            prop_assert!(rect.width >= 1 && rect.height >= 1);
            prop_assert!(rect.x + rect.width <= iw);
            prop_assert!(rect.y + rect.height <= ih);
            prop_assert!(rect.width == iw || rect.height == ih);
            prop_assert!(rect.x <= iw - rect.x - rect.width + 1);
        }
    }
}
