//! Narrow interfaces to the engine-side unit system
//!
//! The match core never simulates a unit. It places units, asks them for a
//! clean slate, toggles their control components and reads their liveness.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// RGB display color assigned to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Uppercase `RRGGBB`, no leading `#`
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid color '{0}', expected RRGGBB")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError(s.to_string()))
        };

        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

/// World-space position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Position and heading a unit is placed at when a round resets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnTransform {
    pub position: Vec3,
    /// Heading around the vertical axis, in degrees
    pub yaw_degrees: f32,
}

impl SpawnTransform {
    pub const fn new(position: Vec3, yaw_degrees: f32) -> Self {
        Self {
            position,
            yaw_degrees,
        }
    }
}

/// A component whose input-responsiveness the match toggles
/// (movement and shooting)
pub trait ControlComponent: Send + Sync {
    fn set_player_number(&self, player_index: u32);
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

/// A renderable part of the unit that takes the participant color
pub trait VisualComponent: Send + Sync {
    fn set_color(&self, color: Color);
}

/// The per-unit UI overlay (health bar and the like)
pub trait OverlayComponent: Send + Sync {
    fn set_visible(&self, visible: bool);
}

/// Capability set of a simulated unit owned by the external unit system
pub trait UnitHandle: Send + Sync {
    /// The unit system deactivates a unit when its health reaches zero
    fn is_active(&self) -> bool;
    fn set_active(&self, active: bool);

    fn place(&self, transform: SpawnTransform);
    fn transform(&self) -> SpawnTransform;

    /// Drop health, velocity and any other per-round state and leave the
    /// unit active
    fn reset_transient_state(&self);

    fn movement(&self) -> Option<Arc<dyn ControlComponent>>;
    fn shooting(&self) -> Option<Arc<dyn ControlComponent>>;
    fn visuals(&self) -> Vec<Arc<dyn VisualComponent>>;
    fn overlay(&self) -> Option<Arc<dyn OverlayComponent>>;
}

/// Creates unit instances from the configured template
pub trait UnitSpawner {
    fn spawn(&mut self, at: &SpawnTransform) -> Arc<dyn UnitHandle>;
}

/// Camera rig that keeps every unit in frame
pub trait ArenaCamera: Send {
    fn set_targets(&mut self, targets: Vec<Arc<dyn UnitHandle>>);
    /// Snap to the framing used at the start of a round
    fn frame_arena(&mut self);
}

/// Level/session lifecycle owned by the host
pub trait SessionControl: Send {
    fn restart_session(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn color_parses_with_or_without_hash() {
        let blue = assert_ok!("2A64B3".parse::<Color>());
        assert_eq!(blue, Color::rgb(0x2A, 0x64, 0xB3));
        assert_eq!(assert_ok!("#e52e28".parse::<Color>()), Color::rgb(229, 46, 40));
    }

    #[test]
    fn color_rejects_bad_input() {
        assert_err!("2A64B".parse::<Color>());
        assert_err!("GGGGGG".parse::<Color>());
        assert_err!("ÄÄÄÄ".parse::<Color>());
    }

    #[test]
    fn color_hex_is_uppercase() {
        assert_eq!(Color::rgb(229, 46, 40).to_hex(), "E52E28");
        assert_eq!(Color::rgb(0, 10, 255).to_string(), "#000AFF");
    }
}
