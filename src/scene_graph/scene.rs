use glam::Mat4;
use hecs::{DynamicBundle, Entity, NoSuchEntity, Ref, World};

use crate::scene_graph::transform::Transform;
use crate::scene_graph::transform_system::TransformSystem;

/// Display name used by the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Entity registry plus the transform system that listens to it.
///
/// Structural changes go through this type so the transform hooks fire; the
/// underlying world is only handed out by shared reference.
pub struct Scene {
    name: String,
    world: World,
    transforms: TransformSystem,
    active_camera: Option<Entity>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: World::new(),
            transforms: TransformSystem::new(),
            active_camera: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn transforms(&self) -> &TransformSystem {
        &self.transforms
    }

    pub fn spawn(&mut self, components: impl DynamicBundle) -> Entity {
        let entity = self.world.spawn(components);
        self.transforms.on_construct(&self.world, entity);
        entity
    }

    /// Adds components to an existing entity. A replaced transform is detached
    /// from its old parent, and its children move over to the new one.
    pub fn insert(
        &mut self,
        entity: Entity,
        components: impl DynamicBundle,
    ) -> Result<(), NoSuchEntity> {
        if !components.has::<Transform>() {
            return self.world.insert(entity, components);
        }

        let children = self.transforms.on_replace(&self.world, entity);
        self.world.insert(entity, components)?;
        self.transforms.on_construct(&self.world, entity);
        self.transforms.adopt_children(&self.world, entity, children);
        Ok(())
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<(), NoSuchEntity> {
        self.transforms.on_destroy(&self.world, entity);

        if self.active_camera == Some(entity) {
            self.active_camera = None;
        }

        self.world.despawn(entity)
    }

    pub fn remove_transform(&mut self, entity: Entity) -> Option<Transform> {
        self.transforms.on_destroy(&self.world, entity);
        self.world.remove_one::<Transform>(entity).ok()
    }

    /// Mutates an entity's transform and notifies the transform system.
    pub fn modify_transform<R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut Transform) -> R,
    ) -> Option<R> {
        let result = {
            let mut transform = self.world.get::<&mut Transform>(entity).ok()?;
            f(&mut transform)
        };

        self.transforms.on_update(&self.world, entity);
        Some(result)
    }

    pub fn set_parent(&mut self, entity: Entity, parent: Option<Entity>) {
        self.modify_transform(entity, |transform| transform.set_parent(parent));
    }

    pub fn transform(&self, entity: Entity) -> Option<Ref<'_, Transform>> {
        self.world.get::<&Transform>(entity).ok()
    }

    pub fn matrix_world(&self, entity: Entity) -> Option<Mat4> {
        self.transform(entity)
            .map(|transform| transform.matrix_world(&self.world))
    }

    pub fn set_active_camera(&mut self, camera: Option<Entity>) {
        self.active_camera = camera;
    }

    pub fn active_camera(&self) -> Option<Entity> {
        self.active_camera
    }

    pub fn get_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.world
            .query::<&Name>()
            .iter()
            .find(|(_, entity_name)| entity_name.0 == name)
            .map(|(entity, _)| entity)
    }

    /// Entities in storage order with their display names, for the inspector.
    pub fn entity_names(&self) -> Vec<(Entity, String)> {
        self.world
            .iter()
            .map(|entity| {
                let name = entity
                    .get::<&Name>()
                    .map(|name| name.0.clone())
                    .unwrap_or_else(|| format!("{:?}", entity.entity()));
                (entity.entity(), name)
            })
            .collect()
    }

    pub fn len(&self) -> u32 {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.len() == 0
    }
}
