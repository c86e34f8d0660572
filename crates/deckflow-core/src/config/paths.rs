//! Standard locations of Deckflow configuration files

use std::path::PathBuf;

/// Directory holding Deckflow settings
///
/// Returns `<config dir>/deckflow`, falling back to the working directory
/// on platforms without a config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deckflow")
}

/// Default engine settings file: `<config dir>/deckflow/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}
