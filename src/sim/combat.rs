//! Combat rules for the headless arena - weapons, damage, hit rolls

use rand::Rng;

/// Template every arena unit is spawned from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTemplate {
    /// Health a unit starts each round with
    pub max_health: f32,
    /// Damage per hit
    pub weapon_damage: f32,
    /// Cooldown between shots (seconds)
    pub fire_cooldown_secs: f32,
    /// Probability that a shot lands (0..=1)
    pub accuracy: f32,
}

impl Default for UnitTemplate {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            weapon_damage: 12.0,
            fire_cooldown_secs: 0.5,
            accuracy: 0.35,
        }
    }
}

/// Combat system for managing weapons and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Check if a unit can fire (cooldown check)
    pub fn can_fire(weapon_cooldown: f32) -> bool {
        weapon_cooldown <= 0.0
    }

    /// Count a cooldown down by one tick
    pub fn update_cooldown(cooldown: f32, dt: f32) -> f32 {
        (cooldown - dt).max(0.0)
    }

    /// Roll whether a shot lands
    pub fn roll_hit<R: Rng>(rng: &mut R, accuracy: f32) -> bool {
        rng.gen::<f32>() < accuracy.clamp(0.0, 1.0)
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

/// Outcome of one shot fired during an arena tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotResult {
    pub shooter: u32,
    pub target: u32,
    /// Player number the target is assigned to
    pub target_player: u32,
    pub damage: f32,
    pub target_health: f32,
    pub target_killed: bool,
}
