//! Entity bookkeeping for connected players.
//!
//! Players live in a general-purpose ECS registry, but only carry a name and
//! a precise position; nothing else in the server depends on the registry's
//! structure.

use bevy_ecs::prelude::Component;
use bevy_ecs::world::World as EcsWorld;
use strata_coords::AbsolutePrecisePosition;

pub use bevy_ecs::entity::Entity;

/// Display name of an entity, used for players.
#[derive(Component, Clone, Debug)]
pub struct NameComponent(pub String);

/// Precise world position of an entity.
#[derive(Component, Clone, Copy, Debug)]
pub struct Position(pub AbsolutePrecisePosition);

/// Thin wrapper over the ECS world holding player entities.
#[derive(Default)]
pub struct EntityRegistry {
    world: EcsWorld,
}

impl EntityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a player entity with a name and position.
    pub fn spawn_player(&mut self, name: &str, position: AbsolutePrecisePosition) -> Entity {
        self.world
            .spawn((NameComponent(name.to_string()), Position(position)))
            .id()
    }

    /// Despawns an entity. Returns `false` if it no longer exists.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    /// Updates an entity's position component. Returns `false` if the entity
    /// is gone or has no position.
    pub fn set_position(&mut self, entity: Entity, position: AbsolutePrecisePosition) -> bool {
        match self.world.get_mut::<Position>(entity) {
            Some(mut component) => {
                component.0 = position;
                true
            }
            None => false,
        }
    }

    /// The entity's current position, if it exists.
    pub fn position_of(&self, entity: Entity) -> Option<AbsolutePrecisePosition> {
        self.world.get::<Position>(entity).map(|p| p.0)
    }

    /// The entity's name, if it exists.
    pub fn name_of(&self, entity: Entity) -> Option<String> {
        self.world.get::<NameComponent>(entity).map(|n| n.0.clone())
    }

    /// Positions of every named, positioned entity (i.e. every player).
    pub fn player_positions(&mut self) -> Vec<AbsolutePrecisePosition> {
        let mut players = self.world.query::<(&NameComponent, &Position)>();
        players.iter(&self.world).map(|(_, p)| p.0).collect()
    }

    /// Number of player entities currently alive.
    pub fn player_count(&mut self) -> usize {
        let mut players = self.world.query::<(&NameComponent, &Position)>();
        players.iter(&self.world).count()
    }
}
