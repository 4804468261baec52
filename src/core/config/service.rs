use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::RagSettings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const LLM_API_KEY_ENV: &str = "AGENTIC_RAG_LLM_API_KEY";
const VECTOR_API_KEY_ENV: &str = "AGENTIC_RAG_VECTOR_API_KEY";

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Public config deep-merged with secrets, before validation.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.paths.config_path);
        let secrets_config = load_yaml_file(&self.paths.secrets_path);
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged);
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<RagSettings, ApiError> {
        let config = self.load_config()?;
        settings_from_value(config)
    }
}

pub fn settings_from_value(config: Value) -> Result<RagSettings, ApiError> {
    validate_config(&config)?;
    serde_json::from_value(config)
        .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides(config: &mut Value) {
    for (var, section) in [(LLM_API_KEY_ENV, "llm"), (VECTOR_API_KEY_ENV, "vector")] {
        let Ok(key) = env::var(var) else {
            continue;
        };
        if key.trim().is_empty() {
            continue;
        }
        if let Value::Object(root) = config {
            let entry = root
                .entry(section.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = entry {
                map.insert("api_key".to_string(), Value::String(key));
            }
        }
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "llm": { "base_url": "http://a", "timeout_secs": 10 },
            "sources": ["x"]
        });
        let secrets = json!({
            "llm": { "api_key": "sk-1" },
            "sources": ["y"]
        });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({
                "llm": { "base_url": "http://a", "timeout_secs": 10, "api_key": "sk-1" },
                "sources": ["y"]
            })
        );
    }

    #[test]
    fn load_settings_reads_config_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yml");
        fs::write(
            &config_path,
            "pipeline:\n  max_retries: 3\nvector:\n  collection: Laws\n",
        )
        .unwrap();
        fs::write(dir.path().join("secrets.yml"), "vector:\n  api_key: wv-key\n").unwrap();

        let paths = AppPaths {
            project_root: dir.path().to_path_buf(),
            data_dir: dir.path().to_path_buf(),
            log_dir: dir.path().join("logs"),
            config_path,
            secrets_path: dir.path().join("secrets.yml"),
        };
        let settings = ConfigService::new(Arc::new(paths)).load_settings().unwrap();

        assert_eq!(settings.pipeline.max_retries, 3);
        assert_eq!(settings.vector.collection, "Laws");
        assert_eq!(settings.vector.api_key.as_deref(), Some("wv-key"));
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths {
            project_root: dir.path().to_path_buf(),
            data_dir: dir.path().to_path_buf(),
            log_dir: dir.path().join("logs"),
            config_path: dir.path().join("absent.yml"),
            secrets_path: dir.path().join("absent-secrets.yml"),
        };
        let settings = ConfigService::new(Arc::new(paths)).load_settings().unwrap();
        assert_eq!(settings.retrieval.top_k, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = settings_from_value(json!({ "pipeline": { "max_retries": 99 } })).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
