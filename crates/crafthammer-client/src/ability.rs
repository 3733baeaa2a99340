use crafthammer_host::{Unit, Vector, World};
use tracing::debug;

/// Radius of the area-of-effect ability, in world units
pub const ABILITY_RADIUS: f64 = 500.0;

/// Kill every enemy of `caster` within [`ABILITY_RADIUS`] of `target`
///
/// Returns the number of units killed.
pub fn on_ability_cast(world: &dyn World, caster: &dyn Unit, target: Vector) -> usize {
    let enemies: Vec<_> = world
        .find_units_in_radius(target, ABILITY_RADIUS)
        .into_iter()
        .filter(|unit| caster.is_enemy(&**unit))
        .collect();

    for enemy in &enemies {
        enemy.kill();
    }

    debug!(
        target: "ability",
        "Unit {:?} cast at {:?}, killed {} enemies",
        caster.id(),
        target,
        enemies.len()
    );
    enemies.len()
}
