use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.base_dir, temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.chunking.chunk_overlap < config.chunking.chunk_size);
}

#[test]
fn load_existing_config_falls_back_on_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "not [valid toml")
        .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.retrieval.top_k, 4);
}
