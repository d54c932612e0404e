use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use glam::{Mat4, Quat, Vec3};
use hecs::{Entity, World};
use parking_lot::Mutex;

/// Shared handle to a transform system's mutation counter.
///
/// A transform that has not been attached to a system yet carries its own
/// detached counter, so setters work the same way before and after spawning.
#[derive(Debug, Clone, Default)]
pub struct GlobalVersion(Arc<AtomicU64>);

impl GlobalVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn same_counter(&self, other: &GlobalVersion) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// What the cached world matrix was last computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParentLink {
    Stale,
    Root,
    Parent(u64),
}

#[derive(Debug, Clone)]
struct TransformState {
    position: Vec3,
    scale: Vec3,
    rotation: Quat,

    local_matrix: Mat4,
    world_matrix: Mat4,
    world_inverse_matrix: Mat4,

    component_version: u64,
    matrix_version: u64,
    world_version: u64,
    world_inverse_version: u64,

    // Global version observed at the last full world check.
    world_stamp: Option<u64>,
    world_matrix_source: u64,
    world_parent_link: ParentLink,
    // World version the inverse was derived from.
    world_inverse_source: Option<u64>,
}

impl TransformState {
    fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            local_matrix: Mat4::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            world_inverse_matrix: Mat4::IDENTITY,
            component_version: 0,
            matrix_version: 0,
            world_version: 0,
            world_inverse_version: 0,
            world_stamp: None,
            world_matrix_source: 0,
            world_parent_link: ParentLink::Stale,
            world_inverse_source: None,
        }
    }

    fn sync_matrix(&mut self) {
        if self.component_version > self.matrix_version {
            self.local_matrix =
                Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position);
            self.matrix_version = self.component_version;
        }
    }

    fn sync_components(&mut self) {
        if self.matrix_version > self.component_version {
            let (scale, rotation, position) = self.local_matrix.to_scale_rotation_translation();
            self.scale = scale;
            self.rotation = rotation;
            self.position = position;
            self.component_version = self.matrix_version;
        }
    }

    fn next_local_version(&self) -> u64 {
        self.component_version.max(self.matrix_version) + 1
    }

    fn invalidate_parent_link(&mut self) {
        self.world_parent_link = ParentLink::Stale;
    }
}

/// Per-entity spatial node.
///
/// Local SRT components and the local matrix are two views of the same data.
/// Whichever carries the higher version is authoritative; the other is derived
/// on the next read. World matrices are cached and only recomputed when the
/// owning [`TransformSystem`](crate::scene_graph::TransformSystem)'s global
/// version moves and something upstream actually changed.
#[derive(Debug)]
pub struct Transform {
    parent: Option<Entity>,
    // Parent the transform system last built adjacency for.
    pub(crate) acknowledged_parent: Option<Entity>,
    pub(crate) children: Vec<Entity>,
    pub(crate) global: GlobalVersion,
    state: Mutex<TransformState>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Transform {
    /// Clones the local state only. The copy is detached: no parent links, no
    /// children, and its own counter until a transform system adopts it.
    fn clone(&self) -> Self {
        let state = self.state.lock();
        let mut copy = TransformState::identity();
        copy.position = state.position;
        copy.scale = state.scale;
        copy.rotation = state.rotation;
        copy.local_matrix = state.local_matrix;
        copy.component_version = state.component_version;
        copy.matrix_version = state.matrix_version;

        Self {
            parent: None,
            acknowledged_parent: None,
            children: Vec::new(),
            global: GlobalVersion::new(),
            state: Mutex::new(copy),
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self {
            parent: None,
            acknowledged_parent: None,
            children: Vec::new(),
            global: GlobalVersion::new(),
            state: Mutex::new(TransformState::identity()),
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new().with_position(position)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.set_parent(Some(parent));
        self
    }

    pub fn position(&self) -> Vec3 {
        let mut state = self.state.lock();
        state.sync_components();
        state.position
    }

    pub fn scale(&self) -> Vec3 {
        let mut state = self.state.lock();
        state.sync_components();
        state.scale
    }

    pub fn rotation(&self) -> Quat {
        let mut state = self.state.lock();
        state.sync_components();
        state.rotation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.modify_components(|state| state.position = position);
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.modify_components(|state| state.scale = scale);
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.modify_components(|state| state.rotation = rotation.normalize());
    }

    pub fn set_transform(&mut self, position: Vec3, rotation: Quat, scale: Vec3) {
        self.modify_components(|state| {
            state.position = position;
            state.rotation = rotation.normalize();
            state.scale = scale;
        });
    }

    fn modify_components(&mut self, f: impl FnOnce(&mut TransformState)) {
        let state = self.state.get_mut();
        // Pick up a directly-set matrix first so untouched fields are not stale.
        state.sync_components();
        f(state);
        state.component_version = state.next_local_version();
        self.global.bump();
    }

    pub fn matrix_local(&self) -> Mat4 {
        let mut state = self.state.lock();
        state.sync_matrix();
        state.local_matrix
    }

    pub fn set_matrix_local(&mut self, matrix: Mat4) {
        let state = self.state.get_mut();
        state.local_matrix = matrix;
        state.matrix_version = state.next_local_version();
        self.global.bump();
    }

    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Changes the parent link. Adjacency lists are rebuilt by the transform
    /// system's update hook, so go through [`Scene`](crate::scene_graph::Scene)
    /// rather than mutating a component in place.
    pub fn set_parent(&mut self, parent: Option<Entity>) {
        if self.parent == parent {
            return;
        }

        self.parent = parent;
        self.state.get_mut().invalidate_parent_link();
        self.global.bump();
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    pub fn component_version(&self) -> u64 {
        self.state.lock().component_version
    }

    pub fn matrix_version(&self) -> u64 {
        self.state.lock().matrix_version
    }

    pub fn world_version(&self) -> u64 {
        self.state.lock().world_version
    }

    pub fn world_inverse_version(&self) -> u64 {
        self.state.lock().world_inverse_version
    }

    pub fn matrix_world(&self, world: &World) -> Mat4 {
        let global = self.global.get();

        {
            let state = self.state.lock();
            if state.world_stamp == Some(global) {
                return state.world_matrix;
            }
        }

        // The lock is released while walking up, a cycle recurses instead of deadlocking.
        let parent = self.parent.and_then(|parent| {
            let parent = world.get::<&Transform>(parent).ok()?;
            let matrix = parent.matrix_world(world);
            Some((matrix, parent.world_version()))
        });

        let mut state = self.state.lock();
        state.sync_matrix();

        let link = match parent {
            Some((_, version)) => ParentLink::Parent(version),
            None => ParentLink::Root,
        };

        if link != state.world_parent_link || state.world_matrix_source != state.matrix_version {
            state.world_matrix = match parent {
                Some((parent_world, _)) => parent_world * state.local_matrix,
                None => state.local_matrix,
            };
            state.world_parent_link = link;
            state.world_matrix_source = state.matrix_version;
            state.world_version += 1;
        }

        state.world_stamp = Some(global);
        state.world_matrix
    }

    pub fn matrix_world_inverse(&self, world: &World) -> Mat4 {
        let world_matrix = self.matrix_world(world);
        let mut state = self.state.lock();

        if state.world_inverse_source != Some(state.world_version) {
            state.world_inverse_matrix = world_matrix.inverse();
            state.world_inverse_source = Some(state.world_version);
            state.world_inverse_version += 1;
        }

        state.world_inverse_matrix
    }

    pub fn position_world(&self, world: &World) -> Vec3 {
        self.matrix_world(world).to_scale_rotation_translation().2
    }

    pub fn scale_world(&self, world: &World) -> Vec3 {
        self.matrix_world(world).to_scale_rotation_translation().0
    }

    pub fn rotation_world(&self, world: &World) -> Quat {
        self.matrix_world(world).to_scale_rotation_translation().1
    }

    pub fn translate(&mut self, delta: Vec3) {
        let position = self.position();
        self.set_position(position + delta);
    }

    /// Applies `rotation` in local space.
    pub fn rotate(&mut self, rotation: Quat) {
        let current = self.rotation();
        self.set_rotation(current * rotation);
    }

    pub fn rotate_x(&mut self, angle: f32) {
        self.rotate(Quat::from_rotation_x(angle));
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate(Quat::from_rotation_y(angle));
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.rotate(Quat::from_rotation_z(angle));
    }

    pub fn rotate_axis(&mut self, axis: Vec3, angle: f32) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.rotate(Quat::from_axis_angle(axis, angle));
    }

    /// Pre-multiplies the local matrix, i.e. applies `matrix` in parent space.
    pub fn apply_matrix(&mut self, matrix: Mat4) {
        let local = self.matrix_local();
        self.set_matrix_local(matrix * local);
    }

    /// Rotates so that local -Z points at `target` (given in parent space).
    pub fn look_at(&mut self, target: Vec3) {
        let Some(direction) = (target - self.position()).try_normalize() else {
            return;
        };

        let forward = Vec3::NEG_Z;
        let cos_angle = forward.dot(direction).clamp(-1.0, 1.0);
        let angle = cos_angle.acos();

        let rotation = match forward.cross(direction).try_normalize() {
            Some(axis) => Quat::from_axis_angle(axis, angle),
            None if cos_angle < 0.0 => Quat::from_axis_angle(Vec3::Y, angle),
            None => Quat::IDENTITY,
        };

        self.set_rotation(rotation);
    }

    /// Adopts a system counter. Cached world state is dropped since its stamp
    /// belongs to the previous counter.
    pub(crate) fn attach(&mut self, global: GlobalVersion) {
        self.global = global;
        let state = self.state.get_mut();
        state.world_stamp = None;
        state.invalidate_parent_link();
    }

    /// Forces the next world read to recompute against the parent.
    pub(crate) fn invalidate_parent_link(&mut self) {
        self.state.get_mut().invalidate_parent_link();
    }

    pub(crate) fn detach_parent_link(&mut self) {
        self.parent = None;
        self.acknowledged_parent = None;
        self.state.get_mut().invalidate_parent_link();
    }
}
