//! CPU reference for the gradient-map fragment shader.
//!
//! Kept in lock-step with `compile::GRADIENT_FRAGMENT` so the mapping law can
//! be exercised without a GPU.

use crate::color::ColorRamp;

/// Rec. 601 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_WEIGHTS[0] + rgb[1] * LUMA_WEIGHTS[1] + rgb[2] * LUMA_WEIGHTS[2]
}

/// Maps one RGBA texel through the ramp. Alpha is always preserved.
pub fn map_texel(texel: [f32; 4], ramp: &ColorRamp) -> [f32; 4] {
    let count = ramp.active_count();
    if count < 2 {
        return texel;
    }
    let stops = ramp.stops();
    let last = (count - 1) as f32;
    let scaled = luminance([texel[0], texel[1], texel[2]]) * last;
    let index0 = scaled.floor().clamp(0.0, last) as usize;
    let index1 = scaled.ceil().clamp(0.0, last) as usize;
    let t = scaled.fract();
    let mixed = stops[index0].lerp(stops[index1], t);
    [mixed.r, mixed.g, mixed.b, texel[3]]
}
