//! Tool configuration
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. Host/user config (~/.config/chart-values/config.toml)
//! 3. Repo config (.chart-values.toml)
//! 4. CLI flags
//!
//! Layers are combined with the same deep merge used for chart values.

mod defaults;
mod effective;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};

/// Repo config file name, looked up in the working directory
pub const REPO_CONFIG_FILE: &str = ".chart-values.toml";
