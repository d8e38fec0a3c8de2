//! Headless stand-in for the engine-side unit system

pub mod arena;
pub mod camera;
pub mod combat;
pub mod unit;

pub use arena::SimArena;
pub use camera::SimCamera;
pub use combat::UnitTemplate;
