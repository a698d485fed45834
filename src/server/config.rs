//! Server configuration
//!
//! Read once from the environment at startup. There is no config file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot resolve HOST {host:?}: {reason}")]
    UnresolvableHost { host: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier of the model to load (`MODEL_NAME`)
    pub model_name: String,
    /// Interface to bind (`HOST`), an IP literal or a hostname
    pub host: String,
    /// Port to bind (`PORT`), 0 picks an ephemeral port
    pub port: u16,
    /// Directory holding one sub-directory per model (`MODEL_DIR`)
    pub model_dir: PathBuf,
    /// Tokens per text before truncation (`MAX_SEQUENCE_LENGTH`)
    pub max_sequence_length: usize,
    /// ONNX Runtime intra-op threads (`INTRA_THREADS`)
    pub intra_threads: usize,
    /// L2-normalize embeddings (`NORMALIZE_EMBEDDINGS`)
    pub normalize_embeddings: bool,
    /// Fetch the model from the Hugging Face Hub when it is not under
    /// `model_dir` (`MODEL_DOWNLOAD`)
    pub allow_download: bool,
    /// Fallback log level when `RUST_LOG` is unset (`LOG_LEVEL`)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_dir: PathBuf::from("models"),
            max_sequence_length: 256,
            intra_threads: 4,
            normalize_embeddings: true,
            allow_download: true,
            log_level: "info".to_string(),
        }
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup; unset keys keep
    /// their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MODEL_NAME") {
            config.model_name = v.trim().to_string();
        }
        if let Some(v) = get("HOST") {
            config.host = v.trim().to_string();
        }
        if let Some(v) = get("PORT") {
            config.port = parse("PORT", v)?;
        }
        if let Some(v) = get("MODEL_DIR") {
            config.model_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MAX_SEQUENCE_LENGTH") {
            config.max_sequence_length = parse("MAX_SEQUENCE_LENGTH", v)?;
        }
        if let Some(v) = get("INTRA_THREADS") {
            config.intra_threads = parse("INTRA_THREADS", v)?;
        }
        if let Some(v) = get("NORMALIZE_EMBEDDINGS") {
            config.normalize_embeddings = parse_bool("NORMALIZE_EMBEDDINGS", v)?;
        }
        if let Some(v) = get("MODEL_DOWNLOAD") {
            config.allow_download = parse_bool("MODEL_DOWNLOAD", v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = v.trim().to_string();
        }

        Ok(config)
    }

    /// Resolve `host:port` to the address to bind, first match wins
    pub async fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let unresolvable = |reason: String| ConfigError::UnresolvableHost {
            host: self.host.clone(),
            reason,
        };

        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| unresolvable(e.to_string()))?
            .next()
            .ok_or_else(|| unresolvable("no addresses found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(
            config.bind_address().await.unwrap().to_string(),
            "0.0.0.0:8000"
        );
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert!(config.normalize_embeddings);
        assert!(config.allow_download);
    }

    #[tokio::test]
    async fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MODEL_NAME", "bge-small-en-v1.5"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("MAX_SEQUENCE_LENGTH", "512"),
            ("NORMALIZE_EMBEDDINGS", "false"),
            ("MODEL_DOWNLOAD", "no"),
        ]))
        .unwrap();

        assert_eq!(config.model_name, "bge-small-en-v1.5");
        assert_eq!(
            config.bind_address().await.unwrap().to_string(),
            "127.0.0.1:9100"
        );
        assert_eq!(config.max_sequence_length, 512);
        assert!(!config.normalize_embeddings);
        assert!(!config.allow_download);
    }

    #[tokio::test]
    async fn test_hostname_host() {
        let config =
            ServerConfig::from_lookup(lookup(&[("HOST", "localhost"), ("PORT", "8123")])).unwrap();
        assert_eq!(config.host, "localhost");

        let addr = config.bind_address().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8123);
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", " "), ("MODEL_NAME", "")])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_invalid_values() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "70000")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("NORMALIZE_EMBEDDINGS", "maybe")])).is_err());
    }
}
