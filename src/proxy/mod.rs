// src/proxy/mod.rs
mod backend;
mod registry;
mod session;

pub use backend::BackendTarget;
pub use registry::TargetRegistry;
pub use session::{serve, ProxyError};
