use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::pipeline::{PipelineOutcome, PipelineRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryPayload {
    pub message: String,
    #[serde(default)]
    pub keyword_seed: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub return_docs: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct QueryResponse {
    pub message: String,
    pub kind: &'static str,
    pub has_sources: bool,
}

impl From<PipelineOutcome> for QueryResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        Self {
            kind: outcome.kind(),
            has_sources: outcome.has_sources(),
            message: outcome.text().to_string(),
        }
    }
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let request = PipelineRequest {
        question: payload.message,
        keyword_seed: payload.keyword_seed,
        top_k: payload.top_k,
        return_raw_documents: payload.return_docs,
        sources: payload.sources,
    };
    let outcome = state.pipeline.run(request).await?;
    Ok(Json(QueryResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AppPaths, ConfigService, RagSettings};
    use crate::search::Channel;
    use crate::test_support::{hit, CannedFullText, CannedVector, ScriptedLlm};

    fn state(llm: ScriptedLlm, vector: CannedVector, dir: &std::path::Path) -> Arc<AppState> {
        let paths = Arc::new(AppPaths::with_root(dir.to_path_buf(), dir.join("data")));
        AppState::with_backends(
            paths.clone(),
            ConfigService::new(paths),
            RagSettings::default(),
            Arc::new(llm),
            Arc::new(vector),
            Arc::new(CannedFullText::empty()),
        )
        .unwrap()
    }

    fn payload(message: &str) -> QueryPayload {
        serde_json::from_value(serde_json::json!({ "message": message })).unwrap()
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(ScriptedLlm::replying("x"), CannedVector::empty(), dir.path());

        let result = query(State(state), Json(payload("  "))).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn answers_with_sources() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(|prompt| {
            Ok(if prompt.contains("binary_score") {
                r#"{"binary_score": "yes"}"#.to_string()
            } else if prompt.contains("<end_of_snippet>") {
                "VAT is 14% **(1)**".to_string()
            } else {
                "vat".to_string()
            })
        });
        let vector = CannedVector::new(|_| {
            Ok(vec![hit(Channel::Vector, "1", "VAT rate is 14%", "tax.pdf", 0.9)])
        });
        let state = state(llm, vector, dir.path());

        let response = query(State(state), Json(payload("What is VAT?")))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn response_mirrors_the_outcome() {
        let response = QueryResponse::from(PipelineOutcome::Refusal {
            text: "I can't answer".to_string(),
        });
        assert_eq!(
            response,
            QueryResponse {
                message: "I can't answer".to_string(),
                kind: "refusal",
                has_sources: false,
            }
        );

        let payload: QueryPayload = serde_json::from_value(serde_json::json!({
            "message": "q",
            "return_docs": true,
            "sources": ["tax.pdf"]
        }))
        .unwrap();
        assert!(payload.return_docs);
        assert_eq!(payload.sources, vec!["tax.pdf".to_string()]);
        assert!(payload.top_k.is_none());
    }
}
