//! Match core: participant records and the round state machine

pub mod display;
pub mod r#match;
pub mod participant;
pub mod unit;

pub use display::DisplayBoard;
pub use participant::{LabelStyle, ParticipantSlot, SetupError};
pub use r#match::{MatchCollaborators, MatchController, MatchPhase, MatchSettings};
