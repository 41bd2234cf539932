use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses, and validates the configuration at `path`.
///
/// Validation failure is fatal and reported before any stage is spawned:
/// there is no partial-config fallback.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the raw config file content, used to detect a
/// config change across restarts.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads the configuration and returns it alongside its content hash.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn valid_config_json() -> &'static str {
        r#"{
            "crawler": {
                "parallelism": 4,
                "max_workers": {"ip_search": 10, "url_frontier": 10, "page_search": 10},
                "chunk_size": 16,
                "req_timeout": 30,
                "user_agent": "SumiTarama/1.0",
                "allowed_protocols": ["http", "https"],
                "retry_after_minutes": 60,
                "fail_reason_weights": {"INVALID_STATUS_CODE": 0.0, "NOT_AVAILABLE": 0.0, "NOT_TURKISH": 0.0},
                "max_document_length": 100000,
                "ports": [80, 443],
                "shuffle_chunks": false
            },
            "system": {"machine_id": 0, "total_machines": 1}
        }"#
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(valid_config_json());
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.crawler.chunk_size, 16);
        assert_eq!(config.crawler.ports, vec![80, 443]);
        assert_eq!(config.system.machine_id, 0);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_json() {
        let file = create_temp_config("not json {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_bad_chunk_size() {
        let file = create_temp_config(&valid_config_json().replace("\"chunk_size\": 16", "\"chunk_size\": 17"));
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_config_bad_machine_id() {
        let file = create_temp_config(
            &valid_config_json().replace("\"machine_id\": 0, \"total_machines\": 1", "\"machine_id\": 2, \"total_machines\": 1"),
        );
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash_stable() {
        let file = create_temp_config(valid_config_json());
        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config(valid_config_json());
        let file2 = create_temp_config(&valid_config_json().replace("16", "32"));
        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
