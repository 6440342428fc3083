use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.index.metric, Metric::Cosine);
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.retrieval.max_context_chars, 800);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimension = 4;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidEmbeddingDimension(4))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));

    let mut invalid_config = config;
    invalid_config.index.directory = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidIndexDirectory(_))
    ));
}

#[test]
fn chunking_overlap_must_be_smaller_than_size() {
    let mut config = Config::default();
    config.chunking.chunk_overlap = config.chunking.chunk_size;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));

    config.chunking.chunk_size = 0;
    config.chunking.chunk_overlap = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial_toml = r#"
        [embedding]
        backend = "ollama"

        [index]
        metric = "l2"
    "#;

    let parsed: Config = toml::from_str(partial_toml).expect("should parse partial toml");
    assert_eq!(parsed.embedding.backend, EmbeddingBackend::Ollama);
    assert_eq!(parsed.embedding.dimension, DEFAULT_HASHING_DIMENSION);
    assert_eq!(parsed.index.metric, Metric::L2);
    assert_eq!(parsed.index.directory, "rag_index");
    assert_eq!(parsed.chunking, ChunkingConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_model("new-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_protocol("HTTP".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
    assert_eq!(config.index_path(), temp_dir.path().join("rag_index"));
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let base_dir = temp_dir.path().join("nested");

    let mut config = Config {
        base_dir: base_dir.clone(),
        ..Config::default()
    };
    config.chunking.chunk_size = 500;
    config.chunking.chunk_overlap = 50;
    config.retrieval.top_k = 8;
    config.save().expect("should save config");

    assert!(config.config_file_path().exists());

    let loaded = Config::load(&base_dir).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn absolute_index_directory_is_kept() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let absolute = temp_dir.path().join("elsewhere");

    let mut config = Config {
        base_dir: temp_dir.path().join("base"),
        ..Config::default()
    };
    config.index.directory = absolute.display().to_string();

    assert_eq!(config.index_path(), absolute);
}
