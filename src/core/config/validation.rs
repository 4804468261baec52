use serde_json::{Map, Value};
use super::settings::PipelineSettings;
use crate::core::errors::ApiError;

const RANKING_STRATEGIES: [&str; 2] = ["score", "frequency"];
const GRADE_SCOPES: [&str; 2] = ["per_channel", "merged"];
const CITATION_POLICIES: [&str; 2] = ["per_snippet", "by_source"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_list_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
        for role in ["expansion", "grading", "generation"] {
            let path = format!("llm.{}", role);
            if let Some(entry) = expect_optional_object(llm, role)? {
                validate_required_string_field(entry, &format!("{}.model", path), "model")?;
                validate_f64_field(
                    entry,
                    &format!("{}.temperature", path),
                    "temperature",
                    0.0,
                    2.0,
                )?;
            }
        }
    }

    if let Some(vector) = expect_optional_object(root, "vector")? {
        validate_optional_string_field(vector, "vector.url", "url")?;
        validate_optional_string_field(vector, "vector.collection", "collection")?;
        validate_f64_field(vector, "vector.alpha", "alpha", 0.0, 1.0)?;
        validate_optional_string_field(vector, "vector.target_vector", "target_vector")?;
        validate_optional_string_field(vector, "vector.fallback_vector", "fallback_vector")?;
    }

    if let Some(fulltext) = expect_optional_object(root, "fulltext")? {
        validate_optional_string_field(fulltext, "fulltext.database_path", "database_path")?;
        validate_identifier_field(fulltext, "fulltext.table", "table")?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 200)?;
        validate_u64_field(retrieval, "retrieval.max_phrases", "max_phrases", 1, 32)?;
        validate_u64_field(
            retrieval,
            "retrieval.combination_samples",
            "combination_samples",
            0,
            32,
        )?;
        validate_u64_field(retrieval, "retrieval.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_bool_field(retrieval, "retrieval.detect_sources", "detect_sources")?;
        validate_enum_field(
            retrieval,
            "retrieval.vector_ranking",
            "vector_ranking",
            &RANKING_STRATEGIES,
        )?;
        validate_enum_field(
            retrieval,
            "retrieval.fulltext_ranking",
            "fulltext_ranking",
            &RANKING_STRATEGIES,
        )?;
    }

    if let Some(pipeline) = expect_optional_object(root, "pipeline")? {
        validate_u64_field(pipeline, "pipeline.max_retries", "max_retries", 0, 10)?;
        validate_u64_field(pipeline, "pipeline.max_steps", "max_steps", 1, 10_000)?;
        validate_enum_field(pipeline, "pipeline.grade_scope", "grade_scope", &GRADE_SCOPES)?;
        validate_required_string_field_if_present(
            pipeline,
            "pipeline.refusal_message",
            "refusal_message",
        )?;
        validate_required_string_field_if_present(
            pipeline,
            "pipeline.insufficient_info_phrase",
            "insufficient_info_phrase",
        )?;
        validate_step_budget(pipeline)?;
    }

    if let Some(citations) = expect_optional_object(root, "citations")? {
        validate_enum_field(citations, "citations.policy", "policy", &CITATION_POLICIES)?;
    }

    if let Some(sources) = expect_optional_object(root, "sources")? {
        validate_optional_string_field(sources, "sources.download_base", "download_base")?;
        validate_optional_string_field(sources, "sources.database", "database")?;
        validate_optional_string_field(sources, "sources.collection", "collection")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let value = section.get(key).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_required_string_field_if_present(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    if section.contains_key(key) {
        validate_required_string_field(section, path, key)
    } else {
        Ok(())
    }
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

/// The step limit has to cover every retry round the config allows.
fn validate_step_budget(pipeline: &Map<String, Value>) -> Result<(), ApiError> {
    let defaults = PipelineSettings::default();
    let max_retries = pipeline
        .get("max_retries")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(defaults.max_retries));
    let max_steps = pipeline
        .get("max_steps")
        .and_then(Value::as_u64)
        .unwrap_or(defaults.max_steps as u64);
    let required = PipelineSettings::required_steps(max_retries as u32) as u64;
    if max_steps < required {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at 'pipeline.max_steps': {} retries need at least {} steps, got {}",
            max_retries, required, max_steps
        )));
    }
    Ok(())
}

fn validate_string_list_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    match value.as_array() {
        Some(items) if items.iter().all(Value::is_string) => Ok(()),
        _ => Err(config_type_error(path, "array of strings")),
    }
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

/// Table names are spliced into SQL, so only plain identifiers pass.
fn validate_identifier_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    let valid = !text.is_empty()
        && text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "Invalid config at '{}': must be a plain identifier",
        path
    )))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_config() {
        assert!(validate_config(&json!({})).is_ok());
    }

    #[test]
    fn rejects_non_object_root() {
        assert!(validate_config(&json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let err = validate_config(&json!({ "vector": { "alpha": 1.5 } })).unwrap_err();
        assert!(err.to_string().contains("vector.alpha"));
    }

    #[test]
    fn rejects_unknown_citation_policy() {
        let err = validate_config(&json!({ "citations": { "policy": "footnotes" } })).unwrap_err();
        assert!(err.to_string().contains("per_snippet"));
    }

    #[test]
    fn rejects_sql_unsafe_table_name() {
        assert!(validate_config(&json!({ "fulltext": { "table": "chunks; DROP" } })).is_err());
        assert!(validate_config(&json!({ "fulltext": { "table": "chunks_fts" } })).is_ok());
    }

    #[test]
    fn model_role_requires_model_id() {
        let err = validate_config(&json!({
            "llm": { "grading": { "temperature": 0.0 } }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("llm.grading.model"));
    }

    #[test]
    fn rejects_empty_refusal_message() {
        assert!(validate_config(&json!({ "pipeline": { "refusal_message": "  " } })).is_err());
    }

    #[test]
    fn cors_origins_must_be_strings() {
        assert!(validate_config(&json!({ "server": { "cors_allowed_origins": ["http://a"] } })).is_ok());
        assert!(validate_config(&json!({ "server": { "cors_allowed_origins": [1] } })).is_err());
        assert!(validate_config(&json!({ "server": { "cors_allowed_origins": "http://a" } })).is_err());
    }

    #[test]
    fn step_limit_must_cover_the_retry_budget() {
        let err = validate_config(&json!({
            "pipeline": { "max_retries": 10, "max_steps": 20 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("pipeline.max_steps"));

        assert!(validate_config(&json!({ "pipeline": { "max_retries": 10 } })).is_ok());
        assert!(validate_config(&json!({ "pipeline": { "max_steps": 13 } })).is_err());
        assert!(validate_config(&json!({ "pipeline": { "max_steps": 14 } })).is_ok());
    }
}
