use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the vector database lives.
#[derive(Clone, Debug, PartialEq)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub transcription_model: String,
    pub transcription_language: String,
    pub chat_model: String,
    pub timezone: String,
    pub qdrant: QdrantConfig,
    pub rag_collection: String,
    pub embedding_model: String,
    pub embedding_size: usize,
    pub rag_enable_hybrid: bool,
    pub rag_docs_dir: PathBuf,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub static_dir: PathBuf,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn parse_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", raw),
            )),
        },
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:8000")?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let qdrant_url = match std::env::var("QDRANT_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                let host = var_or("QDRANT_HOST", "qdrant");
                let port = parse_var::<u16>("QDRANT_PORT", "6333")?;
                format!("http://{}:{}", host, port)
            }
        };
        let qdrant = QdrantConfig {
            url: qdrant_url,
            api_key: std::env::var("QDRANT_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        let embedding_size = parse_var::<usize>("OPENAI_EMBEDDING_SIZE", "1536")?;
        if embedding_size == 0 {
            return Err(ConfigError::InvalidValue(
                "OPENAI_EMBEDDING_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            realtime_model: var_or("REALTIME_MODEL", "gpt-realtime"),
            realtime_voice: var_or("REALTIME_VOICE", "marin"),
            transcription_model: var_or("TRANSCRIPTION_MODEL", "gpt-4o-mini-transcribe"),
            transcription_language: var_or("TRANSCRIPTION_LANGUAGE", "es"),
            chat_model: var_or("CHAT_MODEL", "gpt-4o-mini"),
            timezone: var_or("TIMEZONE", "Atlantic/Canary"),
            qdrant,
            rag_collection: var_or("RAG_COLLECTION", "museum_docs"),
            embedding_model: var_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_size,
            rag_enable_hybrid: parse_flag("RAG_ENABLE_HYBRID", false)?,
            rag_docs_dir: PathBuf::from(var_or("RAG_DOCS_DIR", "./data")),
            log_level,
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
            static_dir: PathBuf::from(var_or("STATIC_DIR", "./static")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const VARS: &[&str] = &[
        "BIND_ADDRESS",
        "OPENAI_API_KEY",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "TRANSCRIPTION_MODEL",
        "TRANSCRIPTION_LANGUAGE",
        "CHAT_MODEL",
        "TIMEZONE",
        "QDRANT_URL",
        "QDRANT_HOST",
        "QDRANT_PORT",
        "QDRANT_API_KEY",
        "RAG_COLLECTION",
        "OPENAI_EMBEDDING_MODEL",
        "OPENAI_EMBEDDING_SIZE",
        "RAG_ENABLE_HYBRID",
        "RAG_DOCS_DIR",
        "RUST_LOG",
        "PROMPTS_PATH",
        "STATIC_DIR",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.openai_api_key, "test-openai-key");
        assert_eq!(config.realtime_model, "gpt-realtime");
        assert_eq!(config.realtime_voice, "marin");
        assert_eq!(config.transcription_model, "gpt-4o-mini-transcribe");
        assert_eq!(config.transcription_language, "es");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.timezone, "Atlantic/Canary");
        assert_eq!(
            config.qdrant,
            QdrantConfig {
                url: "http://qdrant:6333".to_string(),
                api_key: None,
            }
        );
        assert_eq!(config.rag_collection, "museum_docs");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.embedding_size, 1536);
        assert!(!config.rag_enable_hybrid);
        assert_eq!(config.rag_docs_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.static_dir, PathBuf::from("./static"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("TIMEZONE", "Europe/Madrid");
            env::set_var("QDRANT_HOST", "localhost");
            env::set_var("QDRANT_PORT", "7000");
            env::set_var("QDRANT_API_KEY", "secret");
            env::set_var("OPENAI_EMBEDDING_SIZE", "256");
            env::set_var("RAG_ENABLE_HYBRID", "True");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.timezone, "Europe/Madrid");
        assert_eq!(config.qdrant.url, "http://localhost:7000");
        assert_eq!(config.qdrant.api_key.as_deref(), Some("secret"));
        assert_eq!(config.embedding_size, 256);
        assert!(config.rag_enable_hybrid);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_qdrant_url_overrides_host_and_port() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("QDRANT_URL", "https://cluster.example.com:6333");
            env::set_var("QDRANT_PORT", "not-a-port");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.qdrant.url, "https://cluster.example.com:6333");
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_hybrid_flag() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RAG_ENABLE_HYBRID", "maybe");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RAG_ENABLE_HYBRID"),
            _ => panic!("Expected InvalidValue for RAG_ENABLE_HYBRID"),
        }
    }

    #[test]
    #[serial]
    fn test_config_zero_embedding_size() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("OPENAI_EMBEDDING_SIZE", "0");
        }

        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidValue(var, _) if var == "OPENAI_EMBEDDING_SIZE"
        ));
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }
}
