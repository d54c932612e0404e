use hecs::Entity;

use crate::camera::Camera;
use crate::error::RenderError;
use crate::light::{collect_lights, LightInstance};
use crate::rendering::backend::GraphicsBackend;
use crate::rendering::mesh::Mesh;
use crate::rendering::render_context::RenderContext;
use crate::rendering::shader_cache::ShaderCache;
use crate::scene_graph::{Scene, Transform};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes: usize,
    pub draw_calls: usize,
    pub lights: usize,
}

/// Walks a scene once per frame and draws every visible mesh.
#[derive(Debug, Default)]
pub struct Pipeline {
    shaders: ShaderCache,
    lights: Vec<LightInstance>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    /// Lights collected during the last frame.
    pub fn lights(&self) -> &[LightInstance] {
        &self.lights
    }

    /// Draws in storage order. No sorting by material or depth.
    pub fn render(
        &mut self,
        scene: &Scene,
        backend: &mut dyn GraphicsBackend,
        aspect: f32,
    ) -> Result<FrameStats, RenderError> {
        let world = scene.world();
        let camera_entity = active_camera(scene).ok_or(RenderError::NoActiveCamera)?;

        let Self { shaders, lights } = self;
        collect_lights(world, lights);

        let context = {
            let camera = *world
                .get::<&Camera>(camera_entity)
                .map_err(|_| RenderError::NoActiveCamera)?;
            let camera_transform = world
                .get::<&Transform>(camera_entity)
                .map_err(|_| RenderError::NoActiveCamera)?;

            RenderContext::new(world, aspect, camera_entity, camera, &camera_transform, lights)
        };

        let mut stats = FrameStats {
            lights: lights.len(),
            ..Default::default()
        };

        for (_entity, (transform, mesh)) in world.query::<(&Transform, &mut Mesh)>().iter() {
            if !mesh.visible {
                continue;
            }

            let model = transform.matrix_world(world);
            stats.draw_calls += mesh.render(&context, shaders, backend, model)?;
            stats.meshes += 1;
        }

        log::trace!(
            "Frame: {} meshes, {} draw calls, {} lights",
            stats.meshes,
            stats.draw_calls,
            stats.lights
        );

        Ok(stats)
    }
}

/// The scene's active camera, or the first camera in storage order.
fn active_camera(scene: &Scene) -> Option<Entity> {
    scene.active_camera().or_else(|| {
        scene
            .world()
            .query::<(&Camera, &Transform)>()
            .iter()
            .map(|(entity, _)| entity)
            .next()
    })
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Quat, Vec3};

    use super::*;
    use crate::light::{Light, PointLight};
    use crate::rendering::backend::recording::RecordingBackend;
    use crate::rendering::backend::DrawCall;
    use crate::rendering::geometry::Geometry;
    use crate::rendering::material::{Material, ShaderMaterial, StandardMaterial};
    use crate::rendering::uniforms::UniformValue;

    fn scene_with_camera() -> Scene {
        let mut scene = Scene::new("test");
        let camera = scene.spawn((
            Transform::from_position(Vec3::new(0.0, 0.0, 10.0)),
            Camera::default(),
        ));
        scene.set_active_camera(Some(camera));
        scene
    }

    fn tinted(tint: f32) -> Mesh {
        let material = ShaderMaterial::new("tinted", "@vertex fn vs_main() {}")
            .with_uniform("tint", UniformValue::Float(tint));
        Mesh::single(Material::Shader(material), Geometry::cube())
    }

    fn standard() -> Mesh {
        Mesh::single(
            Material::Standard(StandardMaterial::default()),
            Geometry::plane(1.0),
        )
    }

    #[test]
    fn missing_camera_is_an_error() {
        let mut scene = Scene::new("test");
        scene.spawn((Transform::new(), standard()));

        let mut backend = RecordingBackend::new();
        let result = Pipeline::new().render(&scene, &mut backend, 1.0);

        assert!(matches!(result, Err(RenderError::NoActiveCamera)));
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn camera_without_transform_is_an_error() {
        let mut scene = Scene::new("test");
        let camera = scene.spawn((Camera::default(),));
        scene.set_active_camera(Some(camera));

        let mut backend = RecordingBackend::new();
        let result = Pipeline::new().render(&scene, &mut backend, 1.0);

        assert!(matches!(result, Err(RenderError::NoActiveCamera)));
    }

    #[test]
    fn falls_back_to_first_camera() {
        let mut scene = Scene::new("test");
        scene.spawn((Transform::new(), Camera::default()));
        scene.spawn((Transform::new(), standard()));

        let mut backend = RecordingBackend::new();
        let stats = Pipeline::new().render(&scene, &mut backend, 1.0).unwrap();

        assert_eq!(stats.meshes, 1);
    }

    #[test]
    fn invisible_meshes_are_skipped() {
        let mut scene = scene_with_camera();
        scene.spawn((Transform::new(), standard()));
        let mut hidden = standard();
        hidden.visible = false;
        scene.spawn((Transform::new(), hidden));

        let mut backend = RecordingBackend::new();
        let stats = Pipeline::new().render(&scene, &mut backend, 1.0).unwrap();

        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(backend.draws(), vec![DrawCall::Arrays { vertex_count: 6 }]);
    }

    #[test]
    fn draws_in_insertion_order() {
        let mut scene = scene_with_camera();
        for tint in [3.0, 1.0, 2.0] {
            scene.spawn((Transform::new(), tinted(tint)));
        }

        let mut backend = RecordingBackend::new();
        Pipeline::new().render(&scene, &mut backend, 1.0).unwrap();

        assert_eq!(
            backend.uniforms_per_draw("tint"),
            vec![
                Some(UniformValue::Float(3.0)),
                Some(UniformValue::Float(1.0)),
                Some(UniformValue::Float(2.0)),
            ]
        );
    }

    #[test]
    fn standard_variants_compile_once_across_frames() {
        let mut scene = scene_with_camera();
        for _ in 0..3 {
            scene.spawn((Transform::new(), standard()));
        }

        let mut backend = RecordingBackend::new();
        let mut pipeline = Pipeline::new();
        pipeline.render(&scene, &mut backend, 1.0).unwrap();
        pipeline.render(&scene, &mut backend, 1.0).unwrap();

        assert_eq!(backend.compile_count(), 1);
        assert_eq!(pipeline.shaders().len(), 1);
        assert_eq!(backend.draws().len(), 6);
    }

    #[test]
    fn model_matrix_is_world_matrix() {
        let mut scene = scene_with_camera();
        let parent = scene.spawn((Transform::new().with_rotation(Quat::from_rotation_y(
            std::f32::consts::FRAC_PI_2,
        )),));
        scene.spawn((
            Transform::from_position(Vec3::X).with_parent(parent),
            standard(),
        ));

        let mut backend = RecordingBackend::new();
        Pipeline::new().render(&scene, &mut backend, 1.0).unwrap();

        match backend.uniform("model") {
            Some(UniformValue::Mat4(model)) => {
                let position = model.transform_point3(Vec3::ZERO);
                assert!(position.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
            }
            other => panic!("unexpected model uniform: {other:?}"),
        }
    }

    #[test]
    fn lights_are_collected_each_frame() {
        let mut scene = scene_with_camera();
        scene.spawn((Transform::new(), standard()));
        let light = scene.spawn((
            Transform::from_position(Vec3::Y),
            Light::Point(PointLight::default()),
        ));

        let mut backend = RecordingBackend::new();
        let mut pipeline = Pipeline::new();

        let stats = pipeline.render(&scene, &mut backend, 1.0).unwrap();
        assert_eq!(stats.lights, 1);
        assert_eq!(
            backend.uniform("light_positions"),
            Some(&UniformValue::Vec3Array(vec![Vec3::Y]))
        );

        scene.despawn(light).unwrap();
        let stats = pipeline.render(&scene, &mut backend, 1.0).unwrap();
        assert_eq!(stats.lights, 0);
        assert_eq!(backend.uniform("light_count"), Some(&UniformValue::UInt(0)));
        assert!(pipeline.lights().is_empty());
    }

    #[test]
    fn projection_uses_aspect() {
        let mut scene = scene_with_camera();
        scene.spawn((Transform::new(), standard()));

        let mut backend = RecordingBackend::new();
        Pipeline::new().render(&scene, &mut backend, 2.0).unwrap();

        assert_eq!(
            backend.uniform("projection"),
            Some(&UniformValue::Mat4(Camera::default().projection_matrix(2.0)))
        );
        assert_eq!(
            backend.uniform("view_inverse"),
            Some(&UniformValue::Mat4(Mat4::from_translation(Vec3::new(
                0.0, 0.0, 10.0
            ))))
        );
    }
}
