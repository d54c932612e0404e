use std::time::{Duration, Instant};

use glam::{Quat, Vec2, Vec3, Vec4};
use hecs::Entity;
use rand::Rng;

use crate::{
    camera::Camera,
    light::{EnvironmentLight, Light, PointLight},
    rendering::{
        Geometry, Material, Mesh, ShaderMaterial, StandardMaterial, Texture, TextureData,
        UniformValue,
    },
    scene_graph::{Name, Scene, Transform},
};

const PULSE_SHADER: &str = include_str!("rendering/shaders/pulse.wgsl");
const LIGHT_COUNT: usize = 4;

/// Mouse driven camera that circles a target point.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    dragging: bool,
    last_cursor: Option<Vec2>,
}

impl OrbitController {
    const ROTATE_SPEED: f32 = 0.005;
    const MAX_PITCH: f32 = 1.5;

    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            yaw: 0.0,
            pitch: 0.0,
            distance,
            dragging: false,
            last_cursor: None,
        }
    }

    pub fn with_angles(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
        self
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn cursor_moved(&mut self, position: Vec2) {
        if let (true, Some(last)) = (self.dragging, self.last_cursor) {
            let delta = position - last;
            self.yaw -= delta.x * Self::ROTATE_SPEED;
            self.pitch = (self.pitch + delta.y * Self::ROTATE_SPEED)
                .clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
        }
        self.last_cursor = Some(position);
    }

    pub fn zoom(&mut self, lines: f32) {
        self.distance = (self.distance * (1.0 - lines * 0.1)).clamp(1.5, 50.0);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(-self.pitch)
    }

    pub fn eye(&self) -> Vec3 {
        self.target + self.rotation() * Vec3::Z * self.distance
    }

    pub fn apply(&self, transform: &mut Transform) {
        transform.set_transform(self.eye(), self.rotation(), Vec3::ONE);
    }
}

pub struct DemoState {
    pub scene: Scene,
    pub start_time: Instant,
    pub orbit: OrbitController,
    camera: Entity,
    spinner: Entity,
    satellite: Entity,
    watcher: Entity,
    lights: Vec<Entity>,
}

impl DemoState {
    pub fn new() -> anyhow::Result<Self> {
        let mut scene = Scene::new("Demo");

        let orbit = OrbitController::new(Vec3::new(0.0, 1.0, 0.0), 9.0).with_angles(0.6, 0.35);
        let mut camera_transform = Transform::new();
        orbit.apply(&mut camera_transform);
        let camera = scene.spawn((Name::new("Camera"), camera_transform, Camera::default()));
        scene.set_active_camera(Some(camera));

        let ground = StandardMaterial {
            albedo_map: Some(Texture::new(checker("Ground checker", 64, 8))),
            roughness: 0.9,
            ..Default::default()
        };
        scene.spawn((
            Name::new("Ground"),
            Transform::new(),
            Mesh::single(Material::Standard(ground), Geometry::plane(20.0)),
        ));

        let spinner = scene.spawn((
            Name::new("Spinner"),
            Transform::from_position(Vec3::new(0.0, 1.0, 0.0)),
            Mesh::single(
                Material::Standard(StandardMaterial {
                    metallic: 0.8,
                    roughness: 0.3,
                    ..StandardMaterial::from_color(Vec4::new(0.8, 0.2, 0.15, 1.0))
                }),
                Geometry::cube(),
            ),
        ));

        let satellite = scene.spawn((
            Name::new("Satellite"),
            Transform::from_position(Vec3::new(2.0, 0.0, 0.0))
                .with_scale(Vec3::splat(0.4))
                .with_parent(spinner),
            Mesh::single(
                Material::Standard(StandardMaterial {
                    emissive: Vec3::new(0.1, 0.3, 0.6),
                    ..StandardMaterial::from_color(Vec4::new(0.2, 0.5, 0.9, 1.0))
                }),
                Geometry::cube(),
            ),
        ));

        let pulse = ShaderMaterial::new("Pulse", PULSE_SHADER)
            .with_uniform("tint", UniformValue::Vec3(Vec3::new(0.9, 0.7, 0.2)))
            .with_uniform("time", UniformValue::Float(0.0));
        let watcher = scene.spawn((
            Name::new("Watcher"),
            Transform::from_position(Vec3::new(-3.0, 1.5, -2.0)).with_scale(Vec3::splat(0.6)),
            Mesh::single(Material::Shader(pulse), Geometry::cube()),
        ));

        let mut rng = rand::thread_rng();
        let lights = (0..LIGHT_COUNT)
            .map(|i| {
                let color = Vec3::new(
                    rng.gen_range(0.3..1.0),
                    rng.gen_range(0.3..1.0),
                    rng.gen_range(0.3..1.0),
                );
                scene.spawn((
                    Name::new(format!("Light {i}")),
                    Transform::new(),
                    Light::Point(PointLight {
                        color,
                        power: 8.0,
                        radius: 0.2,
                        range: 12.0,
                    }),
                ))
            })
            .collect();

        scene.spawn((
            Name::new("Sky"),
            Transform::new(),
            Light::Environment(EnvironmentLight {
                irradiance: Texture::new(sky_gradient("Sky irradiance", 8, 4)),
                specular: Texture::new(sky_gradient("Sky specular", 32, 16)),
                brdf_lut: Texture::new(TextureData::solid("BRDF", [230, 20, 0, 255]).linear()),
                intensity: 0.35,
            }),
        ));

        log::info!("Demo scene ready with {} entities", scene.len());

        let mut state = Self {
            scene,
            start_time: Instant::now(),
            orbit,
            camera,
            spinner,
            satellite,
            watcher,
            lights,
        };
        state.update(Duration::ZERO);

        Ok(state)
    }

    pub fn update(&mut self, delta: Duration) {
        let time = self.start_time.elapsed().as_secs_f32();
        let dt = delta.as_secs_f32();

        self.scene.modify_transform(self.spinner, |transform| {
            transform.set_rotation(Quat::from_rotation_y(time * 0.5));
            transform.set_position(Vec3::new(0.0, 1.0 + (time * 2.0).sin() * 0.1, 0.0));
        });

        self.scene
            .modify_transform(self.satellite, |transform| transform.rotate_x(dt * 2.0));

        for (i, light) in self.lights.iter().enumerate() {
            let angle = time * 0.4 + i as f32 * std::f32::consts::TAU / LIGHT_COUNT as f32;
            let position = Vec3::new(angle.cos() * 5.0, 3.0, angle.sin() * 5.0);
            self.scene
                .modify_transform(*light, |transform| transform.set_position(position));
        }

        let target = self
            .scene
            .transform(self.satellite)
            .map(|transform| transform.position_world(self.scene.world()));
        if let Some(target) = target {
            self.scene
                .modify_transform(self.watcher, |transform| transform.look_at(target));
        }

        if let Ok(mut mesh) = self.scene.world().get::<&mut Mesh>(self.watcher) {
            for primitive in &mut mesh.primitives {
                if let Material::Shader(material) = &mut primitive.material {
                    material.set_uniform("time", UniformValue::Float(time));
                }
            }
        }

        let orbit = &self.orbit;
        self.scene
            .modify_transform(self.camera, |transform| orbit.apply(transform));
    }
}

fn checker(name: &str, size: u32, tiles: u32) -> TextureData {
    let tile = (size / tiles).max(1);
    let pixels = (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / tile + y / tile) % 2 == 0 {
                [200, 200, 200, 255]
            } else {
                [90, 90, 100, 255]
            }
        })
        .collect();

    TextureData::new(name, size, size, pixels)
}

/// Equirectangular sky: blue overhead fading to a brown horizon.
fn sky_gradient(name: &str, width: u32, height: u32) -> TextureData {
    let sky = Vec3::new(0.35, 0.55, 0.9);
    let ground = Vec3::new(0.3, 0.25, 0.2);

    let pixels = (0..height)
        .flat_map(|y| {
            let t = (y as f32 + 0.5) / height as f32;
            let color = sky.lerp(ground, t) * 255.0;
            (0..width).flat_map(move |_| [color.x as u8, color.y as u8, color.z as u8, 255])
        })
        .collect();

    TextureData::new(name, width, height, pixels)
}
