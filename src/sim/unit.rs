//! Headless arena unit and its components

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::game::unit::{
    Color, ControlComponent, OverlayComponent, SpawnTransform, UnitHandle, VisualComponent,
};

use super::combat::{CombatSystem, UnitTemplate};

/// Movement or shooting component of a headless unit
#[derive(Debug)]
pub struct SimControl {
    player_number: AtomicU32,
    enabled: AtomicBool,
}

impl SimControl {
    fn new() -> Self {
        Self {
            player_number: AtomicU32::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn player_number(&self) -> u32 {
        self.player_number.load(Ordering::Relaxed)
    }
}

impl ControlComponent for SimControl {
    fn set_player_number(&self, player_index: u32) {
        self.player_number.store(player_index, Ordering::Relaxed);
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// One colorable mesh of a headless unit
#[derive(Debug, Default)]
pub struct SimRenderer {
    color: Mutex<Option<Color>>,
}

impl SimRenderer {
    #[cfg(test)]
    pub fn color(&self) -> Option<Color> {
        *self.color.lock()
    }
}

impl VisualComponent for SimRenderer {
    fn set_color(&self, color: Color) {
        *self.color.lock() = Some(color);
    }
}

/// Health-bar overlay of a headless unit
#[derive(Debug)]
pub struct SimOverlay {
    visible: AtomicBool,
}

impl OverlayComponent for SimOverlay {
    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
struct SimUnitState {
    active: bool,
    transform: SpawnTransform,
    health: f32,
    weapon_cooldown: f32,
}

/// A unit living in the headless arena.
///
/// Mirrors what an engine-side tank would expose: a hull and turret mesh,
/// movement and shooting components, and a health overlay. It deactivates
/// itself when its health reaches zero.
#[derive(Debug)]
pub struct SimUnit {
    id: u32,
    template: UnitTemplate,
    state: Mutex<SimUnitState>,
    movement: Arc<SimControl>,
    shooting: Arc<SimControl>,
    renderers: Vec<Arc<SimRenderer>>,
    overlay: Arc<SimOverlay>,
}

impl SimUnit {
    pub fn new(id: u32, template: UnitTemplate, at: SpawnTransform) -> Self {
        Self {
            id,
            template,
            state: Mutex::new(SimUnitState {
                active: true,
                transform: at,
                health: template.max_health,
                weapon_cooldown: 0.0,
            }),
            movement: Arc::new(SimControl::new()),
            shooting: Arc::new(SimControl::new()),
            renderers: vec![Arc::new(SimRenderer::default()), Arc::new(SimRenderer::default())],
            overlay: Arc::new(SimOverlay {
                visible: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn health(&self) -> f32 {
        self.state.lock().health
    }

    pub fn player_number(&self) -> u32 {
        self.movement.player_number()
    }

    #[cfg(test)]
    pub fn renderers(&self) -> &[Arc<SimRenderer>] {
        &self.renderers
    }

    #[cfg(test)]
    pub fn overlay_visible(&self) -> bool {
        self.overlay.visible.load(Ordering::Relaxed)
    }

    /// Active and under player control
    pub fn can_act(&self) -> bool {
        self.state.lock().active && self.movement.is_enabled() && self.shooting.is_enabled()
    }

    /// Advance the weapon cooldown by `dt`; returns true if the unit fires
    /// this tick (the cooldown is re-armed)
    pub fn try_fire(&self, dt: f32) -> bool {
        let mut state = self.state.lock();
        state.weapon_cooldown = CombatSystem::update_cooldown(state.weapon_cooldown, dt);
        if !state.active || !CombatSystem::can_fire(state.weapon_cooldown) {
            return false;
        }
        state.weapon_cooldown = self.template.fire_cooldown_secs;
        true
    }

    /// Apply a hit; returns true if it killed the unit
    pub fn take_damage(&self, damage: f32) -> bool {
        let mut state = self.state.lock();
        if !state.active {
            return false;
        }

        let (health, killed) = CombatSystem::apply_damage(state.health, damage);
        state.health = health;
        if killed {
            state.active = false;
        }
        killed
    }

    /// Knock the unit out immediately
    #[cfg(test)]
    pub fn eliminate(&self) {
        let mut state = self.state.lock();
        state.health = 0.0;
        state.active = false;
    }
}

impl UnitHandle for SimUnit {
    fn is_active(&self) -> bool {
        self.state.lock().active
    }

    fn set_active(&self, active: bool) {
        self.state.lock().active = active;
    }

    fn place(&self, transform: SpawnTransform) {
        self.state.lock().transform = transform;
    }

    fn transform(&self) -> SpawnTransform {
        self.state.lock().transform
    }

    fn reset_transient_state(&self) {
        let mut state = self.state.lock();
        state.health = self.template.max_health;
        state.weapon_cooldown = 0.0;
        state.active = true;
    }

    fn movement(&self) -> Option<Arc<dyn ControlComponent>> {
        Some(self.movement.clone() as Arc<dyn ControlComponent>)
    }

    fn shooting(&self) -> Option<Arc<dyn ControlComponent>> {
        Some(self.shooting.clone() as Arc<dyn ControlComponent>)
    }

    fn visuals(&self) -> Vec<Arc<dyn VisualComponent>> {
        self.renderers
            .iter()
            .map(|r| r.clone() as Arc<dyn VisualComponent>)
            .collect()
    }

    fn overlay(&self) -> Option<Arc<dyn OverlayComponent>> {
        Some(self.overlay.clone() as Arc<dyn OverlayComponent>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::Vec3;

    fn unit() -> SimUnit {
        SimUnit::new(1, UnitTemplate::default(), SpawnTransform::default())
    }

    #[test]
    fn lethal_damage_deactivates() {
        let unit = unit();
        assert!(!unit.take_damage(60.0));
        assert!(unit.take_damage(60.0));
        assert!(!unit.is_active());
        assert_eq!(unit.health(), 0.0);
        // Dead units ignore further hits
        assert!(!unit.take_damage(10.0));
    }

    #[test]
    fn reset_restores_health_and_activity() {
        let unit = unit();
        unit.place(SpawnTransform::new(Vec3::new(5.0, 0.0, 5.0), 45.0));
        unit.eliminate();
        unit.reset_transient_state();

        assert!(unit.is_active());
        assert_eq!(unit.health(), UnitTemplate::default().max_health);
        assert_eq!(unit.transform().yaw_degrees, 45.0);
    }

    #[test]
    fn firing_respects_cooldown() {
        let unit = unit();
        assert!(unit.try_fire(0.1));
        assert!(!unit.try_fire(0.1));
        assert!(unit.try_fire(0.5));
    }

    #[test]
    fn disabled_components_stop_the_unit_acting() {
        let unit = unit();
        assert!(unit.can_act());
        unit.shooting.set_enabled(false);
        assert!(!unit.can_act());
    }
}
