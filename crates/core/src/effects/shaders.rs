//! Generic fragment sources for the background-effect passes.
//!
//! Each source is completed by [`assemble_fragment_shader`], which supplies
//! `v_uv`, `sampleFrame` and `fragColor`.

use crate::drawer::{assemble_fragment_shader, ShaderType};
use crate::render::fullscreen::TEXTURE_VERTEX_SHADER;

pub const TEXEL_SIZE_UNIFORM: &str = "u_texelSize";
pub const DIRECTION_UNIFORM: &str = "u_direction";
pub const RADIUS_UNIFORM: &str = "u_radius";
pub const BACKGROUND_UNIFORM: &str = "u_background";
pub const MASK_UNIFORM: &str = "u_mask";

/// Copies the input unchanged. Used for resampling and disabled effects.
pub const PASS_THROUGH_FRAGMENT: &str = r#"void main() {
    fragColor = sampleFrame(v_uv);
}
"#;

/// One direction of a separable Gaussian blur. `sigma = u_radius`, at most
/// 16 taps each side of the centre.
pub const GAUSSIAN_BLUR_FRAGMENT: &str = r#"uniform vec2 u_texelSize;
uniform vec2 u_direction;
uniform float u_radius;

const int MAX_SAMPLES = 16;

void main() {
    float sigma = max(u_radius, 0.0001);
    float twoSigmaSq = 2.0 * sigma * sigma;
    int radius = int(min(float(MAX_SAMPLES), ceil(u_radius)));
    float totalWeight = 0.0;
    vec3 result = vec3(0.0);

    for (int i = -MAX_SAMPLES; i <= MAX_SAMPLES; ++i) {
        if (abs(i) > radius) continue;
        float offset = float(i);
        float weight = exp(-(offset * offset) / twoSigmaSq);
        result += sampleFrame(v_uv + u_direction * u_texelSize * offset).rgb * weight;
        totalWeight += weight;
    }

    fragColor = vec4(result / totalWeight, 1.0);
}
"#;

/// One direction of a separable box blur, at most 16 taps each side.
pub const BOX_BLUR_FRAGMENT: &str = r#"uniform vec2 u_texelSize;
uniform vec2 u_direction;
uniform float u_radius;

const int MAX_RADIUS = 16;

void main() {
    int radius = int(min(float(MAX_RADIUS), u_radius));
    vec3 sum = vec3(0.0);
    float count = 0.0;

    for (int i = -MAX_RADIUS; i <= MAX_RADIUS; ++i) {
        if (abs(i) > radius) continue;
        sum += sampleFrame(v_uv + u_direction * u_texelSize * float(i)).rgb;
        count += 1.0;
    }

    fragColor = vec4(sum / count, 1.0);
}
"#;

/// Mixes background and frame by the segmentation mask. The mask edge is
/// widened by its screen-space gradient so hard mask steps do not alias.
pub const COMPOSITE_FRAGMENT: &str = r#"uniform sampler2D u_background;
uniform sampler2D u_mask;

const float EDGE_SOFTNESS = 6.0;

void main() {
    vec4 frameColor = sampleFrame(v_uv);
    vec4 background = texture(u_background, v_uv);
    float maskValue = texture(u_mask, v_uv).r;

    float gradient = length(vec2(dFdx(maskValue), dFdy(maskValue)));
    float alpha = smoothstep(
        0.5 - gradient * EDGE_SOFTNESS,
        0.5 + gradient * EDGE_SOFTNESS,
        maskValue
    );

    fragColor = mix(background, vec4(frameColor.rgb, 1.0), alpha);
}
"#;

/// The named passes, for tooling that wants to list or print them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    PassThrough,
    GaussianBlur,
    BoxBlur,
    Composite,
}

const PASS_KINDS: &[PassKind] = &[
    PassKind::PassThrough,
    PassKind::GaussianBlur,
    PassKind::BoxBlur,
    PassKind::Composite,
];

impl PassKind {
    pub fn all() -> &'static [PassKind] {
        PASS_KINDS
    }

    pub fn name(self) -> &'static str {
        match self {
            PassKind::PassThrough => "pass-through",
            PassKind::GaussianBlur => "gaussian-blur",
            PassKind::BoxBlur => "box-blur",
            PassKind::Composite => "composite",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PASS_KINDS.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn fragment_source(self) -> &'static str {
        match self {
            PassKind::PassThrough => PASS_THROUGH_FRAGMENT,
            PassKind::GaussianBlur => GAUSSIAN_BLUR_FRAGMENT,
            PassKind::BoxBlur => BOX_BLUR_FRAGMENT,
            PassKind::Composite => COMPOSITE_FRAGMENT,
        }
    }

    /// The complete (vertex, fragment) pair the drawer would compile.
    pub fn program_sources(self, shader_type: ShaderType) -> (&'static str, String) {
        (
            TEXTURE_VERTEX_SHADER,
            assemble_fragment_shader(shader_type, self.fragment_source()),
        )
    }
}
