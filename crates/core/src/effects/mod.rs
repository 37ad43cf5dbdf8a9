//! Camera-frame effects built on [`GenericDrawer`](crate::drawer::GenericDrawer).
//!
//! - [`shaders`] -- generic fragment sources and uniform names.
//! - [`blur`] -- separable Gaussian/box blur between two targets.
//! - [`resample`] -- scale a frame into an owned target.
//! - [`mask`] -- segmentation masks and the upload/smoothing chain.
//! - [`composite`] -- frame over background, weighted by the mask.
//! - [`background`] -- [`VirtualBackground`], which wires all of the above.

pub mod background;
pub mod blur;
pub mod composite;
pub mod mask;
pub mod resample;
pub mod shaders;

pub use background::{fit_background, BackgroundImage, CropRect, MaskSender, VirtualBackground};
pub use blur::{BlurKind, BlurPass};
pub use composite::CompositePass;
pub use mask::{MaskChain, SegmentationMask};
pub use resample::Resampler;
pub use shaders::PassKind;
