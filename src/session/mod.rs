//! Match session lifecycle

pub mod service;

pub use service::SessionService;
