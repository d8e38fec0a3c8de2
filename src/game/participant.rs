//! Per-player match record

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::unit::{Color, ControlComponent, OverlayComponent, SpawnTransform, UnitHandle};

/// How participant labels are rendered on the text panels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// `PLAYER 1`
    #[default]
    Plain,
    /// `<color=#2A64B3>PLAYER 1</color>`
    RichText,
}

/// Roster entry configured before the session starts
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSlot {
    pub color: Color,
    pub spawn: SpawnTransform,
}

/// Setup errors. These are configuration defects, not runtime conditions.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Unit for player {player} has no {component} component")]
    MissingComponent {
        player: u32,
        component: &'static str,
    },

    #[error("A match needs at least one participant")]
    EmptyRoster,
}

/// A player's persistent record for the whole session, bound to the unit
/// that represents it in the arena
pub struct ParticipantRecord {
    player_index: u32,
    color: Color,
    spawn: SpawnTransform,
    unit: Arc<dyn UnitHandle>,
    movement: Arc<dyn ControlComponent>,
    shooting: Arc<dyn ControlComponent>,
    overlay: Arc<dyn OverlayComponent>,
    label_text: String,
    wins: u32,
    control_enabled: bool,
}

impl ParticipantRecord {
    /// Bind a freshly spawned unit to the roster slot.
    ///
    /// Colors every visual component of the unit and hands the player number
    /// to its movement and shooting components. Fails if the unit lacks any
    /// component the match has to drive.
    pub fn setup(
        slot: &ParticipantSlot,
        unit: Arc<dyn UnitHandle>,
        player_index: u32,
        style: LabelStyle,
    ) -> Result<Self, SetupError> {
        let missing = |component| SetupError::MissingComponent {
            player: player_index,
            component,
        };

        let movement = unit.movement().ok_or_else(|| missing("movement"))?;
        let shooting = unit.shooting().ok_or_else(|| missing("shooting"))?;
        let overlay = unit.overlay().ok_or_else(|| missing("overlay"))?;

        movement.set_player_number(player_index);
        shooting.set_player_number(player_index);

        for visual in unit.visuals() {
            visual.set_color(slot.color);
        }

        let label_text = match style {
            LabelStyle::Plain => format!("PLAYER {}", player_index),
            LabelStyle::RichText => format!(
                "<color=#{}>PLAYER {}</color>",
                slot.color.to_hex(),
                player_index
            ),
        };

        let control_enabled = movement.is_enabled() && shooting.is_enabled();

        Ok(Self {
            player_index,
            color: slot.color,
            spawn: slot.spawn,
            unit,
            movement,
            shooting,
            overlay,
            label_text,
            wins: 0,
            control_enabled,
        })
    }

    pub fn player_index(&self) -> u32 {
        self.player_index
    }

    pub fn color(&self) -> Color {
        self.color
    }

    #[cfg(test)]
    pub fn spawn(&self) -> SpawnTransform {
        self.spawn
    }

    pub fn label(&self) -> &str {
        &self.label_text
    }

    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn control_enabled(&self) -> bool {
        self.control_enabled
    }

    pub fn unit(&self) -> &Arc<dyn UnitHandle> {
        &self.unit
    }

    pub fn enable_control(&mut self) {
        self.set_control(true);
    }

    pub fn disable_control(&mut self) {
        self.set_control(false);
    }

    fn set_control(&mut self, enabled: bool) {
        self.movement.set_enabled(enabled);
        self.shooting.set_enabled(enabled);
        self.overlay.set_visible(enabled);
        self.control_enabled = enabled;

        debug!(player = self.player_index, enabled, "Control toggled");
    }

    /// Put the unit back on its spawn point with a clean slate
    pub fn reset_for_round(&mut self) {
        self.unit.set_active(false);
        self.unit.place(self.spawn);
        self.unit.reset_transient_state();
        self.unit.set_active(true);
    }

    pub fn is_alive(&self) -> bool {
        self.unit.is_active()
    }

    /// Called by the match controller when this participant wins a round
    pub(crate) fn record_round_win(&mut self) {
        self.wins += 1;
    }
}

impl fmt::Debug for ParticipantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantRecord")
            .field("player_index", &self.player_index)
            .field("label_text", &self.label_text)
            .field("wins", &self.wins)
            .field("control_enabled", &self.control_enabled)
            .finish_non_exhaustive()
    }
}
