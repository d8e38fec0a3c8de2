//! HTTP surface for spectators

pub mod routes;

pub use routes::build_router;
