use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.timeout_seconds, 30);
    assert_eq!(config.chunking.chunk_size, 1500);
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.quiz.default_questions, 10);
    assert_eq!(config.quiz.default_difficulty, "medium");
    assert_eq!(config.quiz.max_prompt_chars, 8000);
    assert_eq!(config.summary.max_prompt_chars, 10000);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.generation_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.timeout_seconds = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_size = 10;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidChunkSize(10))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ingestion.embedding_concurrency = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.retrieval.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
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
    let mut parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    parsed_config.base_dir = config.base_dir.clone();
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [ollama]
        host = "gpu-box"

        [retrieval]
        top_k = 8
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.ollama.host, "gpu-box");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.retrieval.top_k, 8);
    assert_eq!(config.chunking.chunk_size, 1500);
    assert_eq!(config.ingestion.embedding_concurrency, 4);
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_embedding_model("mxbai-embed-large".to_string()).is_ok());
    assert!(config.set_generation_model("qwen2.5:7b".to_string()).is_ok());
    assert!(config.set_embedding_dimension(1024).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_generation_model("  ".to_string()).is_err());
    assert!(config.set_embedding_dimension(8).is_err());
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.database_path(), temp_dir.path().join("metadata.db"));
    assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.ollama.host = "studybox".to_string();
    config.retrieval.top_k = 3;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load saved config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[ollama]\nport = 11434\n\n[chunking]\nchunk_size = 5\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn config_dir_honours_env_override() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    // SAFETY: serialized with other tests touching the environment
    unsafe {
        std::env::set_var(HOME_ENV_VAR, temp_dir.path());
    }
    let dir = Config::config_dir().expect("should resolve config dir");
    unsafe {
        std::env::remove_var(HOME_ENV_VAR);
    }

    assert_eq!(dir, temp_dir.path());
}
