//! Weaviate hybrid-search channel.
//!
//! Queries go through the GraphQL `Get` endpoint with a `hybrid` operator so
//! the server blends BM25 and vector similarity according to `alpha`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use super::fulltext::is_identifier;
use super::types::{Channel, SearchResult, VectorQuery};
use super::VectorSearch;
use crate::core::config::settings::VectorSettings;
use crate::core::errors::ApiError;

/// Object properties the client reads back from a collection.
#[derive(Debug, Clone)]
pub struct CollectionFields {
    pub text: String,
    pub source_name: String,
    pub source_id: String,
    pub position: String,
}

impl CollectionFields {
    fn from_settings(settings: &VectorSettings) -> Self {
        Self {
            text: settings.text_property.clone(),
            source_name: settings.source_name_property.clone(),
            source_id: settings.source_id_property.clone(),
            position: settings.position_property.clone(),
        }
    }
}

pub struct WeaviateClient {
    base_url: String,
    api_key: Option<String>,
    fields: CollectionFields,
    client: Client,
}

impl WeaviateClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        fields: CollectionFields,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            fields,
            client,
        })
    }

    pub fn from_settings(settings: &VectorSettings, timeout: Duration) -> Result<Self, ApiError> {
        Self::new(
            settings.url.clone(),
            settings.api_key.clone(),
            CollectionFields::from_settings(settings),
            timeout,
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

/// Builds the GraphQL document for one hybrid query.
pub(crate) fn hybrid_query(
    collection: &str,
    query: &VectorQuery,
    fields: &CollectionFields,
) -> Result<String, ApiError> {
    for name in [
        collection,
        fields.text.as_str(),
        fields.source_name.as_str(),
        fields.source_id.as_str(),
        fields.position.as_str(),
    ] {
        if !is_identifier(name) {
            return Err(ApiError::BadRequest(format!("invalid identifier '{}'", name)));
        }
    }

    // serde_json string literals are valid GraphQL string literals.
    let mut hybrid = format!(
        "query: {}, alpha: {}",
        json!(query.phrase),
        query.alpha
    );
    if let Some(target) = &query.target_vector {
        hybrid.push_str(&format!(", targetVectors: [{}]", json!(target)));
    }
    if let Some(vector) = &query.vector {
        hybrid.push_str(&format!(", vector: {}", json!(vector)));
    }

    let mut arguments = format!("hybrid: {{{}}}, limit: {}", hybrid, query.limit);
    if !query.sources.is_empty() {
        arguments.push_str(&format!(
            ", where: {{path: [{}], operator: ContainsAny, valueText: {}}}",
            json!(fields.source_name),
            json!(query.sources)
        ));
    }

    Ok(format!(
        "{{ Get {{ {collection}({arguments}) {{ {text} {name} {id} {position} _additional {{ id score }} }} }} }}",
        collection = collection,
        arguments = arguments,
        text = fields.text,
        name = fields.source_name,
        id = fields.source_id,
        position = fields.position,
    ))
}

pub(crate) fn parse_hybrid_response(
    payload: &Value,
    collection: &str,
    fields: &CollectionFields,
) -> Result<Vec<SearchResult>, ApiError> {
    if let Some(errors) = payload["errors"].as_array() {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e["message"].as_str())
                .collect();
            return Err(ApiError::Upstream(format!(
                "vector query failed: {}",
                messages.join("; ")
            )));
        }
    }

    let Some(objects) = payload["data"]["Get"][collection].as_array() else {
        return Ok(Vec::new());
    };

    Ok(objects
        .iter()
        .map(|obj| {
            let source_name = value_to_string(&obj[&fields.source_name]).unwrap_or_default();
            let source_id =
                value_to_string(&obj[&fields.source_id]).unwrap_or_else(|| source_name.clone());
            SearchResult {
                text: obj[&fields.text].as_str().unwrap_or_default().to_string(),
                source_id,
                source_name,
                record_id: obj["_additional"]["id"].as_str().map(String::from),
                channel: Channel::Vector,
                relevance_score: score_of(&obj["_additional"]["score"]),
                position_hint: obj[&fields.position]
                    .as_u64()
                    .and_then(|p| u32::try_from(p).ok()),
            }
        })
        .collect())
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Weaviate reports hybrid scores as strings.
fn score_of(value: &Value) -> f32 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0) as f32,
        _ => 0.0,
    }
}

#[async_trait]
impl VectorSearch for WeaviateClient {
    async fn ensure_collection(&self, collection: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/schema/{}", self.base_url, collection);
        let res = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(format!(
                "vector collection '{}' does not exist",
                collection
            ))),
            status => Err(ApiError::Upstream(format!(
                "schema lookup for '{}' failed ({})",
                collection, status
            ))),
        }
    }

    async fn query(&self, collection: &str, query: &VectorQuery) -> Result<Vec<SearchResult>, ApiError> {
        let document = hybrid_query(collection, query, &self.fields)?;
        let url = format!("{}/v1/graphql", self.base_url);

        let res = self
            .authorize(self.client.post(&url))
            .json(&json!({ "query": document }))
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("vector query failed ({}): {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        parse_hybrid_response(&payload, collection, &self.fields)
    }
}
