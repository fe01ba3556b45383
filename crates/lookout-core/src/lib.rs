mod action;
pub mod args;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod io;
mod observe;
pub mod operation;
pub mod paths;
mod react;
pub mod registry;
pub mod remote;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{LookoutError, Result};
pub use operation::Operations;
