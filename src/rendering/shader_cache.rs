use std::collections::HashMap;
use std::fmt::Write;

use crate::error::RenderError;
use crate::light::LightKind;
use crate::rendering::backend::{GraphicsBackend, ProgramId, ShaderSource};
use crate::rendering::material::MaterialFeatures;

const STANDARD_TEMPLATE: &str = include_str!("shaders/standard.wgsl");

/// Optional standard material textures, in binding order, with the code that
/// folds each one into the surface.
const SURFACE_TEXTURES: &[(MaterialFeatures, &str, &str)] = &[
    (
        MaterialFeatures::ALBEDO_MAP,
        "albedo_map",
        "    let albedo_sample = textureSample(albedo_map, albedo_map_sampler, in.tex_coords);\n    \
         surface.albedo *= albedo_sample.rgb;\n    \
         surface.alpha *= albedo_sample.a;\n",
    ),
    (
        MaterialFeatures::NORMAL_MAP,
        "normal_map",
        "    let normal_sample = textureSample(normal_map, normal_map_sampler, in.tex_coords).xyz * 2.0 - 1.0;\n    \
         surface.normal = perturb_normal(surface.normal, in.world_position, in.tex_coords, normal_sample);\n",
    ),
    (
        MaterialFeatures::METALLIC_ROUGHNESS_MAP,
        "metallic_roughness_map",
        "    let metallic_roughness = textureSample(metallic_roughness_map, metallic_roughness_map_sampler, in.tex_coords);\n    \
         surface.roughness *= metallic_roughness.g;\n    \
         surface.metallic *= metallic_roughness.b;\n",
    ),
    (
        MaterialFeatures::EMISSIVE_MAP,
        "emissive_map",
        "    surface.emissive *= textureSample(emissive_map, emissive_map_sampler, in.tex_coords).rgb;\n",
    ),
    (
        MaterialFeatures::OCCLUSION_MAP,
        "occlusion_map",
        "    surface.occlusion = textureSample(occlusion_map, occlusion_map_sampler, in.tex_coords).r;\n",
    ),
];

/// Compiled standard shader variants keyed by feature set.
#[derive(Debug, Default)]
pub struct ShaderCache {
    programs: HashMap<MaterialFeatures, ProgramId>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &mut self,
        features: MaterialFeatures,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<ProgramId, RenderError> {
        if let Some(program) = self.programs.get(&features) {
            return Ok(*program);
        }

        let name = format!("Standard material {features:?}");
        let source = generate_standard_shader(features);
        let program = backend.compile_program(ShaderSource {
            name: &name,
            wgsl: &source,
        })?;

        log::debug!("Compiled standard shader variant {features:?}");
        self.programs.insert(features, program);
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Forgets every variant, needed when switching to a different backend.
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}

fn light_kinds(features: MaterialFeatures) -> Vec<LightKind> {
    let mut kinds = vec![LightKind::Point];
    if features.contains(MaterialFeatures::ENVIRONMENT_MAP) {
        kinds.push(LightKind::Environment);
    }
    kinds
}

/// Expands the standard shader template for one feature set.
///
/// Texture `k` goes to `@binding(2k)` of group 1 and its sampler to
/// `@binding(2k + 1)`. All sampling happens before any lighting loop so
/// derivatives stay in uniform control flow.
pub fn generate_standard_shader(features: MaterialFeatures) -> String {
    let fragments: Vec<_> = light_kinds(features)
        .into_iter()
        .map(LightKind::shader_fragment)
        .collect();

    let mut textures: Vec<&str> = Vec::new();
    let mut surface = String::new();

    for (feature, texture, code) in SURFACE_TEXTURES {
        if features.contains(*feature) {
            textures.push(texture);
            surface.push_str(code);
        }
    }

    for fragment in &fragments {
        textures.extend_from_slice(fragment.textures);
    }

    let mut declarations = String::new();
    for (index, texture) in textures.iter().enumerate() {
        let binding = index * 2;
        // Writing to a String cannot fail.
        let _ = writeln!(
            declarations,
            "@group(1) @binding({binding}) var {texture}: texture_2d<f32>;\n\
             @group(1) @binding({}) var {texture}_sampler: sampler;",
            binding + 1
        );
    }

    let uniforms: String = fragments.iter().map(|f| f.uniforms.as_str()).collect();
    let functions: String = fragments
        .iter()
        .map(|f| format!("\n{}", f.code))
        .collect();

    let mut lighting = String::new();
    for kind in light_kinds(features) {
        let call = match kind {
            LightKind::Point => "point_lights(surface)",
            LightKind::Environment => "environment_light(surface)",
        };
        let _ = writeln!(lighting, "    color += {call};");
    }

    STANDARD_TEMPLATE
        .replace("{{LIGHT_UNIFORMS}}", &uniforms)
        .replace("{{TEXTURES}}", &declarations)
        .replace("{{LIGHT_FUNCTIONS}}", &functions)
        .replace("{{SURFACE}}", &surface)
        .replace("{{LIGHTING}}", &lighting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::backend::recording::RecordingBackend;

    #[test]
    fn base_variant_has_no_textures() {
        let source = generate_standard_shader(MaterialFeatures::empty());

        assert!(!source.contains("texture_2d"));
        assert!(!source.contains("{{"));
        assert!(source.contains("color += point_lights(surface);"));
        assert!(!source.contains("environment_light"));
    }

    #[test]
    fn textures_get_consecutive_bindings() {
        let source = generate_standard_shader(
            MaterialFeatures::ALBEDO_MAP | MaterialFeatures::EMISSIVE_MAP,
        );

        assert!(source.contains("@group(1) @binding(0) var albedo_map: texture_2d<f32>;"));
        assert!(source.contains("@group(1) @binding(1) var albedo_map_sampler: sampler;"));
        assert!(source.contains("@group(1) @binding(2) var emissive_map: texture_2d<f32>;"));
        assert!(!source.contains("normal_map"));
    }

    #[test]
    fn environment_variant_declares_maps_after_material_textures() {
        let source = generate_standard_shader(
            MaterialFeatures::NORMAL_MAP | MaterialFeatures::ENVIRONMENT_MAP,
        );

        assert!(source.contains("@group(1) @binding(2) var irradiance_map: texture_2d<f32>;"));
        assert!(source.contains("@group(1) @binding(6) var brdf_lut: texture_2d<f32>;"));
        assert!(source.contains("environment_intensity: f32,"));
        assert!(source.contains("color += environment_light(surface);"));
    }

    #[test]
    fn sampling_precedes_lighting() {
        let source = generate_standard_shader(MaterialFeatures::all());
        let sample = source.find("let normal_sample").unwrap();
        let lighting = source.find("color += point_lights").unwrap();
        assert!(sample < lighting);
    }

    #[test]
    fn variants_compile_once() {
        let mut backend = RecordingBackend::new();
        let mut cache = ShaderCache::new();

        let first = cache
            .get_or_compile(MaterialFeatures::ALBEDO_MAP, &mut backend)
            .unwrap();
        let second = cache
            .get_or_compile(MaterialFeatures::ALBEDO_MAP, &mut backend)
            .unwrap();
        cache
            .get_or_compile(MaterialFeatures::empty(), &mut backend)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.compile_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn generated_variants_parse() {
        for bits in 0..=MaterialFeatures::all().bits() {
            let features = MaterialFeatures::from_bits_truncate(bits);
            let source = generate_standard_shader(features);
            if let Err(error) = naga::front::wgsl::parse_str(&source) {
                panic!("{features:?}: {}", error.emit_to_string(&source));
            }
        }
    }
}
