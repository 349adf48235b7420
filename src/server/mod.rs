// src/server/mod.rs
mod dispatcher;
pub mod listener;

pub use dispatcher::Dispatcher;
