pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{EnvFile, PyProject, Settings, StackEnv};
pub use core::stack::{Stack, StartupPlan};
pub use utils::error::{Result, WqError};
