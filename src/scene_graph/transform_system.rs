use hecs::{Entity, World};

use crate::scene_graph::transform::{GlobalVersion, Transform};

/// Owns the global mutation counter and keeps parent/child lists consistent.
///
/// hecs has no component hooks, so [`Scene`](crate::scene_graph::Scene) calls
/// `on_construct`, `on_update` and `on_destroy` at the matching points.
/// Component borrows are always released before touching another entity's
/// transform, because two `&mut Transform` borrows in one archetype conflict.
#[derive(Debug, Default)]
pub struct TransformSystem {
    version: GlobalVersion,
}

impl TransformSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_version(&self) -> u64 {
        self.version.get()
    }

    pub fn update_global_version(&self) {
        self.version.bump();
    }

    pub fn owns(&self, transform: &Transform) -> bool {
        transform.global.same_counter(&self.version)
    }

    pub fn on_construct(&self, world: &World, entity: Entity) {
        {
            let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
                return;
            };

            if !self.owns(&transform) {
                transform.attach(self.version.clone());
            }
            // Adjacency is rebuilt from parent links, never carried in.
            transform.children.clear();
            transform.acknowledged_parent = None;
        }

        self.update_global_version();
        self.on_update(world, entity);
    }

    pub fn on_update(&self, world: &World, entity: Entity) {
        let (previous, current) = {
            let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
                return;
            };

            let previous = transform.acknowledged_parent;
            let current = transform.parent();
            if previous == current {
                return;
            }

            transform.acknowledged_parent = current;
            (previous, current)
        };

        if let Some(previous) = previous {
            if let Ok(mut parent) = world.get::<&mut Transform>(previous) {
                parent.children.retain(|child| *child != entity);
            }
        }

        if let Some(current) = current {
            match world.get::<&mut Transform>(current) {
                Ok(mut parent) => {
                    if !parent.children.contains(&entity) {
                        parent.children.push(entity);
                    }
                }
                Err(_) => {
                    log::warn!(
                        "{:?} has parent {:?} which has no transform, treating it as a root",
                        entity,
                        current
                    );
                }
            }
        }
    }

    /// Detaches a transform that is about to be swapped for another one and
    /// hands back its children for [`adopt_children`](Self::adopt_children).
    pub fn on_replace(&self, world: &World, entity: Entity) -> Vec<Entity> {
        let children = {
            let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
                return Vec::new();
            };
            transform.set_parent(None);
            std::mem::take(&mut transform.children)
        };

        self.on_update(world, entity);
        self.update_global_version();
        children
    }

    pub fn adopt_children(&self, world: &World, entity: Entity, children: Vec<Entity>) {
        if children.is_empty() {
            return;
        }

        for child in &children {
            if let Ok(mut child) = world.get::<&mut Transform>(*child) {
                child.invalidate_parent_link();
            }
        }

        if let Ok(mut transform) = world.get::<&mut Transform>(entity) {
            for child in children {
                if !transform.children.contains(&child) {
                    transform.children.push(child);
                }
            }
        }

        self.update_global_version();
    }

    pub fn on_destroy(&self, world: &World, entity: Entity) {
        let children = {
            let Ok(mut transform) = world.get::<&mut Transform>(entity) else {
                return;
            };
            transform.set_parent(None);
            std::mem::take(&mut transform.children)
        };

        self.on_update(world, entity);

        for child in children {
            if let Ok(mut child) = world.get::<&mut Transform>(child) {
                child.detach_parent_link();
            }
        }

        self.update_global_version();
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;
    use glam::{Quat, Vec3};

    use super::*;

    fn spawn(world: &mut World, system: &TransformSystem, transform: Transform) -> Entity {
        let entity = world.spawn((transform,));
        system.on_construct(world, entity);
        entity
    }

    fn set_parent(world: &World, system: &TransformSystem, entity: Entity, parent: Option<Entity>) {
        world
            .get::<&mut Transform>(entity)
            .unwrap()
            .set_parent(parent);
        system.on_update(world, entity);
    }

    fn children(world: &World, entity: Entity) -> Vec<Entity> {
        world.get::<&Transform>(entity).unwrap().children().to_vec()
    }

    #[test]
    fn child_inherits_parent_rotation() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let parent = spawn(
            &mut world,
            &system,
            Transform::new().with_rotation(Quat::from_rotation_y(FRAC_PI_2)),
        );
        let child = spawn(
            &mut world,
            &system,
            Transform::from_position(Vec3::X).with_parent(parent),
        );

        let position = world
            .get::<&Transform>(child)
            .unwrap()
            .position_world(&world);
        assert_abs_diff_eq!(position, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
    }

    #[test]
    fn construct_with_parent_links_children() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let parent = spawn(&mut world, &system, Transform::new());
        let child = spawn(&mut world, &system, Transform::new().with_parent(parent));

        assert_eq!(children(&world, parent), vec![child]);
    }

    #[test]
    fn reparenting_moves_child_exactly_once() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let a = spawn(&mut world, &system, Transform::new());
        let b = spawn(&mut world, &system, Transform::new());
        let child = spawn(&mut world, &system, Transform::new());

        set_parent(&world, &system, child, Some(a));
        set_parent(&world, &system, child, Some(b));
        set_parent(&world, &system, child, Some(b));
        system.on_update(&world, child);

        assert!(children(&world, a).is_empty());
        assert_eq!(children(&world, b), vec![child]);

        set_parent(&world, &system, child, Some(a));
        set_parent(&world, &system, child, Some(a));
        assert_eq!(children(&world, a), vec![child]);
        assert!(children(&world, b).is_empty());
    }

    #[test]
    fn parent_change_moves_world_matrix() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let a = spawn(&mut world, &system, Transform::from_position(Vec3::X));
        let b = spawn(&mut world, &system, Transform::from_position(Vec3::Y));
        let child = spawn(&mut world, &system, Transform::new().with_parent(a));

        let read = |world: &World| {
            world
                .get::<&Transform>(child)
                .unwrap()
                .position_world(world)
        };

        assert_abs_diff_eq!(read(&world), Vec3::X, epsilon = 1e-6);
        set_parent(&world, &system, child, Some(b));
        assert_abs_diff_eq!(read(&world), Vec3::Y, epsilon = 1e-6);
    }

    #[test]
    fn global_version_tracks_mutations_only() {
        let mut world = World::new();
        let system = TransformSystem::new();
        assert_eq!(system.global_version(), 0);

        let parent = spawn(&mut world, &system, Transform::new());
        let child = spawn(&mut world, &system, Transform::new());

        let mut last = system.global_version();
        let mut assert_increased = |system: &TransformSystem| {
            let current = system.global_version();
            assert!(current > last, "{current} should be greater than {last}");
            last = current;
        };

        world
            .get::<&mut Transform>(child)
            .unwrap()
            .set_position(Vec3::Z);
        assert_increased(&system);

        world
            .get::<&mut Transform>(child)
            .unwrap()
            .set_matrix_local(glam::Mat4::from_scale(Vec3::splat(2.0)));
        assert_increased(&system);

        set_parent(&world, &system, child, Some(parent));
        assert_increased(&system);

        let before_reads = system.global_version();
        {
            let transform = world.get::<&Transform>(child).unwrap();
            transform.matrix_world(&world);
            transform.matrix_world_inverse(&world);
            transform.position();
            transform.rotation_world(&world);
        }
        assert_eq!(system.global_version(), before_reads);
    }

    #[test]
    fn unrelated_mutation_does_not_recompute_world() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let a = spawn(&mut world, &system, Transform::from_position(Vec3::X));
        let b = spawn(&mut world, &system, Transform::new());

        let version = {
            let transform = world.get::<&Transform>(a).unwrap();
            transform.matrix_world(&world);
            transform.world_version()
        };

        world
            .get::<&mut Transform>(b)
            .unwrap()
            .set_position(Vec3::Y);

        let transform = world.get::<&Transform>(a).unwrap();
        transform.matrix_world(&world);
        assert_eq!(transform.world_version(), version);
    }

    #[test]
    fn moving_parent_recomputes_cached_child() {
        let mut world = World::new();
        let system = TransformSystem::new();
        let parent = spawn(&mut world, &system, Transform::from_position(Vec3::Y));
        let child = spawn(
            &mut world,
            &system,
            Transform::from_position(Vec3::X).with_parent(parent),
        );

        let cached_version = {
            let transform = world.get::<&Transform>(child).unwrap();
            transform.matrix_world(&world);
            transform.world_version()
        };

        world
            .get::<&mut Transform>(parent)
            .unwrap()
            .set_position(Vec3::Z);
        system.on_update(&world, parent);

        let transform = world.get::<&Transform>(child).unwrap();
        assert_abs_diff_eq!(
            transform.position_world(&world),
            Vec3::new(1.0, 0.0, 1.0),
            epsilon = 1e-6
        );
        assert!(transform.world_version() > cached_version);
    }

    #[test]
    fn destroying_parent_turns_child_into_root() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let parent = spawn(
            &mut world,
            &system,
            Transform::from_position(Vec3::new(5.0, 0.0, 0.0)),
        );
        let child = spawn(
            &mut world,
            &system,
            Transform::from_position(Vec3::Y).with_parent(parent),
        );

        {
            let transform = world.get::<&Transform>(child).unwrap();
            assert_abs_diff_eq!(
                transform.position_world(&world),
                Vec3::new(5.0, 1.0, 0.0),
                epsilon = 1e-6
            );
        }

        system.on_destroy(&world, parent);
        world.despawn(parent).unwrap();

        let transform = world.get::<&Transform>(child).unwrap();
        assert_eq!(transform.parent(), None);
        assert_eq!(transform.matrix_world(&world), transform.matrix_local());
    }

    #[test]
    fn destroying_child_leaves_parent_list() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let parent = spawn(&mut world, &system, Transform::new());
        let first = spawn(&mut world, &system, Transform::new().with_parent(parent));
        let second = spawn(&mut world, &system, Transform::new().with_parent(parent));

        system.on_destroy(&world, first);
        world.despawn(first).unwrap();

        assert_eq!(children(&world, parent), vec![second]);
    }

    #[test]
    fn missing_parent_resolves_as_root() {
        let mut world = World::new();
        let system = TransformSystem::new();

        let not_a_node = world.spawn(("no transform here",));
        let child = spawn(
            &mut world,
            &system,
            Transform::from_position(Vec3::Z).with_parent(not_a_node),
        );

        let transform = world.get::<&Transform>(child).unwrap();
        assert_eq!(transform.matrix_world(&world), transform.matrix_local());
    }
}
