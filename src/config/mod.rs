#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod manifest;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command, FileKind};
pub use env::{EnvFile, StackEnv};
pub use manifest::PyProject;
pub use toml_config::Settings;
