use bevy_ecs::prelude::*;

/// Number of completed simulation steps.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick(pub u64);

/// Toroidal extent of the particle field.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
        }
    }
}
