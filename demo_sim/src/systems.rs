use bevy_ecs::prelude::*;

use crate::components::{Frozen, Position, Velocity};
use crate::resources::{Tick, WorldBounds};

/// Move every unfrozen particle by its velocity, wrapping at the bounds.
pub fn move_particles(
    bounds: Res<WorldBounds>,
    mut particles: Query<(&mut Position, &Velocity), Without<Frozen>>,
) {
    for (mut position, velocity) in &mut particles {
        position.x = (position.x + velocity.dx).rem_euclid(bounds.width);
        position.y = (position.y + velocity.dy).rem_euclid(bounds.height);
    }
}

pub fn advance_tick(mut tick: ResMut<Tick>) {
    tick.0 = tick.0.wrapping_add(1);
}
