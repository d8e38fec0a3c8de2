//! Headless arena: spawns units and lets them duel while under control

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::unit::{SpawnTransform, UnitHandle, UnitSpawner};

use super::combat::{CombatSystem, ShotResult, UnitTemplate};
use super::unit::SimUnit;

struct ArenaState {
    template: UnitTemplate,
    units: Vec<Arc<SimUnit>>,
    rng: ChaCha8Rng,
}

/// Stand-in for the engine-side unit system.
///
/// Cloning shares the same arena, so the spawner handed to the match and
/// the background combat task see the same units.
#[derive(Clone)]
pub struct SimArena {
    state: Arc<Mutex<ArenaState>>,
}

impl SimArena {
    pub fn new(template: UnitTemplate, seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ArenaState {
                template,
                units: Vec::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    #[cfg(test)]
    pub fn units(&self) -> Vec<Arc<SimUnit>> {
        self.state.lock().units.clone()
    }

    /// Run one combat tick. Every unit that is active and under control
    /// fires at a random other active unit once its weapon is ready.
    pub fn step(&self, dt: f32) -> Vec<ShotResult> {
        let mut state = self.state.lock();
        let ArenaState {
            template,
            units,
            rng,
        } = &mut *state;

        let mut shots = Vec::new();

        for shooter in units.iter() {
            if !shooter.can_act() || !shooter.try_fire(dt) {
                continue;
            }

            let targets: Vec<&Arc<SimUnit>> = units
                .iter()
                .filter(|u| u.id() != shooter.id() && u.is_active())
                .collect();

            let Some(target) = targets.choose(rng) else {
                continue;
            };

            if !CombatSystem::roll_hit(rng, template.accuracy) {
                continue;
            }

            let target_killed = target.take_damage(template.weapon_damage);
            shots.push(ShotResult {
                shooter: shooter.id(),
                target: target.id(),
                target_player: target.player_number(),
                damage: template.weapon_damage,
                target_health: target.health(),
                target_killed,
            });
        }

        shots
    }

    /// Drive the arena until the task is aborted
    pub async fn run(self, tick: Duration) {
        let dt = tick.as_secs_f32();
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            for shot in self.step(dt) {
                if shot.target_killed {
                    info!(
                        unit = shot.target,
                        player = shot.target_player,
                        killer = shot.shooter,
                        "Unit destroyed"
                    );
                } else {
                    debug!(
                        unit = shot.target,
                        player = shot.target_player,
                        shooter = shot.shooter,
                        damage = shot.damage,
                        health = shot.target_health,
                        "Unit hit"
                    );
                }
            }
        }
    }
}

impl UnitSpawner for SimArena {
    fn spawn(&mut self, at: &SpawnTransform) -> Arc<dyn UnitHandle> {
        let mut state = self.state.lock();
        let id = state.units.len() as u32 + 1;
        let unit = Arc::new(SimUnit::new(id, state.template, *at));
        state.units.push(unit.clone());
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::ControlComponent;

    fn sure_shot() -> UnitTemplate {
        UnitTemplate {
            max_health: 20.0,
            weapon_damage: 10.0,
            fire_cooldown_secs: 0.1,
            accuracy: 1.0,
        }
    }

    #[test]
    fn spawned_units_get_sequential_ids() {
        let mut arena = SimArena::new(UnitTemplate::default(), 1);
        arena.spawn(&SpawnTransform::default());
        arena.spawn(&SpawnTransform::default());

        let ids: Vec<u32> = arena.units().iter().map(|u| u.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn duel_ends_with_a_single_survivor() {
        let mut arena = SimArena::new(sure_shot(), 42);
        arena.spawn(&SpawnTransform::default());
        arena.spawn(&SpawnTransform::default());

        let mut kills = 0;
        for _ in 0..20 {
            kills += arena.step(0.1).iter().filter(|s| s.target_killed).count();
        }

        assert!(kills >= 1);
        let alive = arena.units().iter().filter(|u| u.is_active()).count();
        assert!(alive <= 1);
    }

    #[test]
    fn units_without_control_hold_fire() {
        let mut arena = SimArena::new(sure_shot(), 3);
        for unit in [arena.spawn(&SpawnTransform::default()), arena.spawn(&SpawnTransform::default())] {
            if let Some(shooting) = unit.shooting() {
                shooting.set_enabled(false);
            }
        }

        for _ in 0..10 {
            assert!(arena.step(0.1).is_empty());
        }
        assert!(arena.units().iter().all(|u| u.is_active()));
    }
}
