//! Configuration: YAML settings file and its sections
//!
//! ```ignore
//! use deckflow_core::config::{default_config_path, load_config, save_config, EngineConfig};
//!
//! let path = default_config_path();
//! let config: EngineConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};
pub use settings::{
    AnalysisConfig, DeckConfig, EffectsConfig, EngineConfig, PollingConfig, SlicerConfig,
    SpectrumConfig,
};
