//! Configuration merge system
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (~/.config/hostcall/config.toml)
//! 3. Project config (./hostcall.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, Settings,
    PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
