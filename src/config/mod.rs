// Configuration management module
// TOML settings loaded once at startup, plus the interactive setup flow

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, IngestionConfig, OllamaConfig, QuizSettings, RetrievalConfig,
    SummarySettings,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
