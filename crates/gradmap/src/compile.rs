use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::color::MAX_RAMP;
use crate::gpu::MaterialMode;

/// Compiles the quad vertex shader shared by both materials.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("gradmap quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles the fragment stage for the requested material.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    mode: MaterialMode,
) -> wgpu::ShaderModule {
    let (label, source) = match mode {
        MaterialMode::PassThrough => (
            "gradmap pass-through fragment",
            Cow::Borrowed(PASS_THROUGH_FRAGMENT),
        ),
        MaterialMode::GradientMapped => (
            "gradmap gradient fragment",
            Cow::Owned(gradient_fragment_source()),
        ),
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: source,
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Builds the gradient-map fragment shader with the ramp size baked in.
///
/// The uniform block layout must match `GradientUniforms` in `gpu/material.rs`,
/// and the body must stay in step with `gradient::map_texel`.
pub(crate) fn gradient_fragment_source() -> String {
    format!(
        "{SAMPLER_HEADER}
layout(std140, set = 1, binding = 2) uniform GradientParams {{
    vec4 colors[{MAX_RAMP}];
    int count;
}} ramp;

void main() {{
    vec4 texel = texture(sampler2D(source_texture, source_sampler), v_uv);
    if (ramp.count < 2) {{
        outColor = texel;
        return;
    }}
    float luma = dot(texel.rgb, vec3(0.299, 0.587, 0.114));
    float last = float(ramp.count - 1);
    float scaled = luma * last;
    int index0 = int(clamp(floor(scaled), 0.0, last));
    int index1 = int(clamp(ceil(scaled), 0.0, last));
    vec3 mapped = mix(ramp.colors[index0].rgb, ramp.colors[index1].rgb, fract(scaled));
    outColor = vec4(mapped, texel.a);
}}
"
    )
}

const SAMPLER_HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;";

const PASS_THROUGH_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

void main() {
    outColor = texture(sampler2D(source_texture, source_sampler), v_uv);
}
";

/// Transforms the indexed quad through the orthographic camera.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform Camera {
    mat4 view_proj;
} camera;

void main() {
    v_uv = a_uv;
    gl_Position = camera.view_proj * vec4(a_position, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_shader_declares_full_ramp() {
        let source = gradient_fragment_source();
        assert!(source.contains(&format!("vec4 colors[{MAX_RAMP}];")));
        assert!(source.contains("int count;"));
        assert!(source.contains("dot(texel.rgb, vec3(0.299, 0.587, 0.114))"));
        assert!(source.contains("texel.a"));
    }

    #[test]
    fn gradient_shader_parses_with_naga() {
        let mut frontend = wgpu::naga::front::glsl::Frontend::default();
        let options = wgpu::naga::front::glsl::Options::from(ShaderStage::Fragment);
        frontend
            .parse(&options, &gradient_fragment_source())
            .expect("gradient shader parses");
        frontend
            .parse(&options, PASS_THROUGH_FRAGMENT)
            .expect("pass-through shader parses");
        let vertex = wgpu::naga::front::glsl::Options::from(ShaderStage::Vertex);
        frontend
            .parse(&vertex, VERTEX_SHADER_GLSL)
            .expect("vertex shader parses");
    }
}
