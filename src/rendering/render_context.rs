use glam::{Mat4, Vec3};
use hecs::{Entity, World};

use crate::camera::Camera;
use crate::light::{LightInstance, LightKind};
use crate::scene_graph::Transform;

/// Per-frame data shared by every draw.
pub struct RenderContext<'a> {
    pub world: &'a World,
    pub aspect: f32,
    pub camera_entity: Entity,
    pub camera: Camera,
    /// World matrix of the camera entity.
    pub camera_world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub lights: &'a [LightInstance],
}

impl<'a> RenderContext<'a> {
    pub fn new(
        world: &'a World,
        aspect: f32,
        camera_entity: Entity,
        camera: Camera,
        camera_transform: &Transform,
        lights: &'a [LightInstance],
    ) -> Self {
        Self {
            world,
            aspect,
            camera_entity,
            camera,
            camera_world: camera_transform.matrix_world(world),
            view: camera_transform.matrix_world_inverse(world),
            projection: camera.projection_matrix(aspect),
            lights,
        }
    }

    pub fn camera_position(&self) -> Vec3 {
        self.camera_world.w_axis.truncate()
    }

    pub fn has_environment_light(&self) -> bool {
        self.lights
            .iter()
            .any(|light| light.kind == LightKind::Environment)
    }
}
