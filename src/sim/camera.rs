//! Headless camera rig that frames every unit in the arena

use std::sync::Arc;

use tracing::debug;

use crate::game::unit::{ArenaCamera, UnitHandle, Vec3};

/// Space kept between the outermost unit and the edge of the frame
const SCREEN_EDGE_BUFFER: f32 = 4.0;
/// Smallest half-extent the camera will zoom in to
const MIN_SIZE: f32 = 6.5;

/// Where the camera looks and how much of the arena it shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Framing {
    pub center: Vec3,
    pub half_extent: f32,
}

#[derive(Default)]
pub struct SimCamera {
    targets: Vec<Arc<dyn UnitHandle>>,
    framing: Option<Framing>,
}

impl SimCamera {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn framing(&self) -> Option<Framing> {
        self.framing
    }

    /// Center on the active targets and size the view so all of them fit
    fn compute_framing(&self) -> Framing {
        let positions: Vec<Vec3> = self
            .targets
            .iter()
            .filter(|t| t.is_active())
            .map(|t| t.transform().position)
            .collect();

        if positions.is_empty() {
            return Framing {
                center: Vec3::default(),
                half_extent: MIN_SIZE,
            };
        }

        let n = positions.len() as f32;
        let center = Vec3::new(
            positions.iter().map(|p| p.x).sum::<f32>() / n,
            positions.iter().map(|p| p.y).sum::<f32>() / n,
            positions.iter().map(|p| p.z).sum::<f32>() / n,
        );

        let spread = positions
            .iter()
            .map(|p| (p.x - center.x).abs().max((p.z - center.z).abs()))
            .fold(0.0_f32, f32::max);

        Framing {
            center,
            half_extent: (spread + SCREEN_EDGE_BUFFER).max(MIN_SIZE),
        }
    }
}

impl ArenaCamera for SimCamera {
    fn set_targets(&mut self, targets: Vec<Arc<dyn UnitHandle>>) {
        self.targets = targets;
    }

    fn frame_arena(&mut self) {
        let framing = self.compute_framing();
        debug!(
            center_x = framing.center.x,
            center_z = framing.center.z,
            half_extent = framing.half_extent,
            "Camera framed arena"
        );
        self.framing = Some(framing);
    }
}
