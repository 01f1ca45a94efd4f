//! Scene management
//!
//! Entities and components live in a `bevy_ecs` [`World`]. The renderer only
//! reads from the scene; it never stores scene data across frames.

mod bounds;
mod camera;
mod components;
mod light;
mod transform;

pub use bounds::*;
pub use camera::*;
pub use components::*;
pub use light::*;
pub use transform::*;

use bevy_ecs::prelude::*;

/// The scene containing all renderable content
pub struct Scene {
    world: World,
    pub camera: Camera,
    /// Entity highlighted by the selection outline
    pub selected: Option<Entity>,
    /// Seconds since the scene started, fed to particle simulation
    pub elapsed_time: f32,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            camera: Camera::default(),
            selected: None,
            elapsed_time: 0.0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Spawn an entity with the given components
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        self.world.spawn(bundle).id()
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    pub fn get_mut<T: Component<Mutability = bevy_ecs::component::Mutable>>(&mut self, entity: Entity) -> Option<Mut<'_, T>> {
        self.world.get_mut::<T>(entity)
    }

    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        self.world.get::<T>(entity).is_some()
    }

    /// Every entity carrying a `T`, paired with the component
    ///
    /// Only archetypes containing `T` are visited. A component type that was
    /// never spawned yields nothing.
    pub fn components<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        let matches: Vec<(Entity, &T)> = match self.world.try_query::<(Entity, &T)>() {
            Some(query) => query.iter_manual(&self.world).collect(),
            None => Vec::new(),
        };
        matches.into_iter()
    }

    pub fn objects(&self) -> impl Iterator<Item = (Entity, &ObjectComponent)> + '_ {
        self.components::<ObjectComponent>()
    }

    pub fn lights(&self) -> impl Iterator<Item = (Entity, &LightComponent)> + '_ {
        self.components::<LightComponent>()
    }

    pub fn emitters(&self) -> impl Iterator<Item = (Entity, &ParticleEmitterComponent)> + '_ {
        self.components::<ParticleEmitterComponent>()
    }

    pub fn force_fields(&self) -> impl Iterator<Item = (Entity, &ForceFieldComponent)> + '_ {
        self.components::<ForceFieldComponent>()
    }

    /// World-space bound of an object's whole mesh
    pub fn object_world_bound(&self, entity: Entity, object: &ObjectComponent) -> Option<Aabb> {
        let transform = self.get::<TransformComponent>(entity)?;
        let mesh = self.get::<MeshComponent>(object.mesh)?;
        Some(mesh.local_bound.transformed(&transform.world_matrix()))
    }

    /// Union of all object bounds
    pub fn bound(&self) -> Aabb {
        let mut bound = Aabb::EMPTY;
        for (entity, object) in self.objects() {
            if let Some(aabb) = self.object_world_bound(entity, object) {
                bound.union_with(&aabb);
            }
        }
        bound
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_scene_bound_covers_all_objects() {
        let mut scene = Scene::new();
        let mesh = scene.spawn(MeshComponent {
            local_bound: Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)),
            ..Default::default()
        });
        scene.spawn((
            ObjectComponent::new(mesh),
            TransformComponent::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        ));
        scene.spawn((
            ObjectComponent::new(mesh),
            TransformComponent::from_translation(Vec3::new(-5.0, 0.0, 0.0)),
        ));

        let bound = scene.bound();
        assert_eq!(bound.min, Vec3::new(-6.0, -1.0, -1.0));
        assert_eq!(bound.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn test_scene_component_queries() {
        let mut scene = Scene::new();
        let light = scene.spawn((
            LightComponent::point(Vec3::ONE, 2.0, 5.0),
            TransformComponent::default(),
        ));

        assert!(scene.contains::<LightComponent>(light));
        assert!(!scene.contains::<ObjectComponent>(light));
        assert_eq!(scene.lights().count(), 1);
        assert_eq!(scene.objects().count(), 0);
    }

    #[test]
    fn test_components_only_yields_matching_entities() {
        let mut scene = Scene::new();
        assert_eq!(scene.force_fields().count(), 0);

        let mesh = scene.spawn(MeshComponent::default());
        for i in 0..64 {
            scene.spawn(TransformComponent::from_translation(Vec3::splat(i as f32)));
        }
        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.push(scene.spawn((ObjectComponent::new(mesh), TransformComponent::default())));
            scene.spawn(LightComponent::point(Vec3::ONE, 1.0, 1.0));
        }

        let mut objects: Vec<Entity> = scene.objects().map(|(entity, _)| entity).collect();
        objects.sort();
        expected.sort();
        assert_eq!(objects, expected);
        assert!(scene.objects().all(|(_, object)| object.mesh == mesh));
        assert_eq!(scene.lights().count(), 3);
        assert_eq!(scene.force_fields().count(), 0);
    }
}
