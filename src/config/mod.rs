// Configuration management module
// TOML settings for embedding, chunking, index and retrieval

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingBackend, EmbeddingConfig, IndexConfig, OllamaConfig,
    RetrievalConfig,
};

/// Resolve the base directory: an explicit override wins over the platform default
#[inline]
pub fn resolve_base_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    override_dir.map_or_else(Config::default_base_dir, Ok)
}
