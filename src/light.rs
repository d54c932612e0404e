use glam::Vec3;
use hecs::{Entity, World};

use crate::error::RenderError;
use crate::rendering::texture::Texture;
use crate::rendering::uniforms::{UniformBinder, UniformValue};
use crate::scene_graph::Transform;

/// Point lights beyond this count are dropped when binding uniforms.
pub const MAX_POINT_LIGHTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub power: f32,
    /// Size of the emitter, softens the falloff close to the light.
    pub radius: f32,
    /// Distance at which the contribution reaches zero.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            power: 10.0,
            radius: 0.1,
            range: 20.0,
        }
    }
}

/// Pre-baked image based lighting. All three maps are equirectangular 2D
/// textures; the specular map is sampled with roughness as the mip bias.
#[derive(Debug, Clone)]
pub struct EnvironmentLight {
    pub irradiance: Texture,
    pub specular: Texture,
    pub brdf_lut: Texture,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub enum Light {
    Point(PointLight),
    Environment(EnvironmentLight),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Point,
    Environment,
}

impl Light {
    pub fn kind(&self) -> LightKind {
        match self {
            Light::Point(_) => LightKind::Point,
            Light::Environment(_) => LightKind::Environment,
        }
    }

    pub fn color(&self) -> Vec3 {
        match self {
            Light::Point(light) => light.color,
            Light::Environment(light) => Vec3::splat(light.intensity),
        }
    }

    /// Packed (range, power, radius).
    pub fn params(&self) -> Vec3 {
        match self {
            Light::Point(light) => Vec3::new(light.range, light.power, light.radius),
            Light::Environment(_) => Vec3::ZERO,
        }
    }
}

/// A light as seen by the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInstance {
    pub entity: Entity,
    pub kind: LightKind,
    pub position: Vec3,
    pub color: Vec3,
    pub params: Vec3,
}

/// Rebuilds `lights` from every entity with both a transform and a light.
pub fn collect_lights(world: &World, lights: &mut Vec<LightInstance>) {
    lights.clear();

    for (entity, (transform, light)) in world.query::<(&Transform, &Light)>().iter() {
        lights.push(LightInstance {
            entity,
            kind: light.kind(),
            position: transform.position_world(world),
            color: light.color(),
            params: light.params(),
        });
    }
}

/// Shader text a light kind contributes to the standard shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFragment {
    /// Members appended to the `Uniforms` struct.
    pub uniforms: String,
    /// Sampled textures, each gets a `<name>_sampler` companion.
    pub textures: &'static [&'static str],
    pub code: String,
}

impl LightKind {
    pub fn shader_fragment(self) -> ShaderFragment {
        match self {
            LightKind::Point => ShaderFragment {
                uniforms: format!(
                    "    light_positions: array<vec3<f32>, {max}>,\n    \
                     light_colors: array<vec3<f32>, {max}>,\n    \
                     light_ranges: array<vec3<f32>, {max}>,\n    \
                     light_count: u32,\n",
                    max = MAX_POINT_LIGHTS
                ),
                textures: &[],
                code: include_str!("rendering/shaders/point_light.wgsl").to_string(),
            },
            LightKind::Environment => ShaderFragment {
                uniforms: "    environment_intensity: f32,\n".to_string(),
                textures: &["irradiance_map", "specular_map", "brdf_lut"],
                code: include_str!("rendering/shaders/environment_light.wgsl").to_string(),
            },
        }
    }

    pub fn bind_uniforms(
        self,
        binder: &mut UniformBinder,
        world: &World,
        lights: &[LightInstance],
    ) -> Result<(), RenderError> {
        match self {
            LightKind::Point => {
                bind_point_lights(binder, lights);
                Ok(())
            }
            LightKind::Environment => bind_environment_light(binder, world, lights),
        }
    }
}

fn bind_point_lights(binder: &mut UniformBinder, lights: &[LightInstance]) {
    let points: Vec<&LightInstance> = lights
        .iter()
        .filter(|light| light.kind == LightKind::Point)
        .take(MAX_POINT_LIGHTS)
        .collect();

    let positions = points.iter().map(|light| light.position).collect();
    let colors = points.iter().map(|light| light.color).collect();
    let ranges = points.iter().map(|light| light.params).collect();

    binder.set("light_positions", UniformValue::Vec3Array(positions));
    binder.set("light_colors", UniformValue::Vec3Array(colors));
    binder.set("light_ranges", UniformValue::Vec3Array(ranges));
    binder.set("light_count", UniformValue::UInt(points.len() as u32));
}

fn bind_environment_light(
    binder: &mut UniformBinder,
    world: &World,
    lights: &[LightInstance],
) -> Result<(), RenderError> {
    let Some(instance) = lights
        .iter()
        .find(|light| light.kind == LightKind::Environment)
    else {
        return Ok(());
    };

    let Ok(mut light) = world.get::<&mut Light>(instance.entity) else {
        return Ok(());
    };

    let Light::Environment(environment) = &mut *light else {
        return Ok(());
    };

    let irradiance = environment.irradiance.ensure_uploaded(binder.backend())?;
    let specular = environment.specular.ensure_uploaded(binder.backend())?;
    let brdf_lut = environment.brdf_lut.ensure_uploaded(binder.backend())?;

    binder.set_texture("irradiance_map", irradiance);
    binder.set_texture("specular_map", specular);
    binder.set_texture("brdf_lut", brdf_lut);
    binder.set(
        "environment_intensity",
        UniformValue::Float(environment.intensity),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::backend::recording::{Command, RecordingBackend};
    use crate::rendering::texture::TextureData;
    use crate::scene_graph::Scene;

    fn point(color: Vec3) -> Light {
        Light::Point(PointLight {
            color,
            ..Default::default()
        })
    }

    #[test]
    fn collects_world_space_positions() {
        let mut scene = Scene::new("lights");
        let parent = scene.spawn((Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),));
        scene.spawn((
            Transform::from_position(Vec3::X).with_parent(parent),
            point(Vec3::new(1.0, 0.0, 0.0)),
        ));
        scene.spawn((point(Vec3::ONE),));

        let mut lights = Vec::new();
        collect_lights(scene.world(), &mut lights);

        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].position, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(lights[0].params, Vec3::new(20.0, 10.0, 0.1));
    }

    #[test]
    fn point_lights_are_capped() {
        let mut scene = Scene::new("lights");
        for i in 0..(MAX_POINT_LIGHTS + 3) {
            scene.spawn((
                Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)),
                point(Vec3::ONE),
            ));
        }

        let mut lights = Vec::new();
        collect_lights(scene.world(), &mut lights);
        assert_eq!(lights.len(), MAX_POINT_LIGHTS + 3);

        let mut backend = RecordingBackend::new();
        let mut binder = UniformBinder::new(&mut backend);
        LightKind::Point
            .bind_uniforms(&mut binder, scene.world(), &lights)
            .unwrap();

        assert_eq!(
            backend.uniform("light_count"),
            Some(&UniformValue::UInt(MAX_POINT_LIGHTS as u32))
        );
        match backend.uniform("light_positions") {
            Some(UniformValue::Vec3Array(positions)) => {
                assert_eq!(positions.len(), MAX_POINT_LIGHTS);
                assert_eq!(positions[0], Vec3::ZERO);
            }
            other => panic!("unexpected light positions: {other:?}"),
        }
    }

    #[test]
    fn environment_light_binds_three_textures() {
        let mut scene = Scene::new("lights");
        let texture = |name: &str| Texture::new(TextureData::solid(name, [128, 128, 128, 255]));
        scene.spawn((
            Transform::new(),
            Light::Environment(EnvironmentLight {
                irradiance: texture("irradiance"),
                specular: texture("specular"),
                brdf_lut: texture("brdf"),
                intensity: 0.5,
            }),
        ));

        let mut lights = Vec::new();
        collect_lights(scene.world(), &mut lights);

        let mut backend = RecordingBackend::new();
        let mut binder = UniformBinder::new(&mut backend);
        LightKind::Environment
            .bind_uniforms(&mut binder, scene.world(), &lights)
            .unwrap();
        assert_eq!(binder.texture_units_used(), 3);

        let units: Vec<u32> = backend
            .commands
            .iter()
            .filter_map(|command| match command {
                Command::BindTexture(unit, _) => Some(*unit),
                _ => None,
            })
            .collect();
        assert_eq!(units, vec![0, 1, 2]);
        assert_eq!(
            backend.uniform("environment_intensity"),
            Some(&UniformValue::Float(0.5))
        );
    }

    #[test]
    fn point_fragment_declares_capped_arrays() {
        let fragment = LightKind::Point.shader_fragment();
        assert!(fragment
            .uniforms
            .contains(&format!("array<vec3<f32>, {MAX_POINT_LIGHTS}>")));
        assert!(fragment.code.contains("fn point_lights"));
    }
}
