use bevy_ecs::prelude::*;

/// Location of a particle inside [`crate::WorldBounds`].
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Units per tick.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Mass(pub f32);

/// Marker for particles that ignore their velocity.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Frozen;
