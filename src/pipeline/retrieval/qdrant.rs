//! REST client for a Qdrant collection holding condition vectors.
//!
//! Point ids are UUID v5 of the condition id; the payload is the serialized
//! `MedicalCondition`. Only the calls the engine needs: search, retrieve,
//! scroll, and upsert for seeding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ConditionCatalog, ConditionIndex, IndexError, ScoredCondition, SearchFilter};
use crate::config::ProviderSettings;
use crate::models::MedicalCondition;
use crate::pipeline::embedding::{EmbeddingError, EmbeddingModel};

/// Page size for scroll requests.
const SCROLL_PAGE: usize = 256;

pub struct QdrantConditionIndex {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl QdrantConditionIndex {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, IndexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IndexError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, IndexError> {
        Self::new(
            &settings.index_url,
            &settings.index_collection,
            settings.index_api_key.clone(),
            settings.timeout_secs,
        )
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and upsert conditions into the collection.
    pub fn upsert_conditions<E: EmbeddingModel + ?Sized>(
        &self,
        conditions: &[MedicalCondition],
        embedder: &E,
    ) -> Result<(), IndexError> {
        if conditions.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = conditions.iter().map(MedicalCondition::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = embedder.embed_batch(&refs)?;
        if vectors.len() != conditions.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: conditions.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let points = conditions
            .iter()
            .zip(vectors)
            .map(|(condition, vector)| {
                let payload = serde_json::to_value(condition)
                    .map_err(|e| IndexError::InvalidPayload(e.to_string()))?;
                Ok(json!({
                    "id": point_id(&condition.condition_id),
                    "vector": vector,
                    "payload": payload,
                }))
            })
            .collect::<Result<Vec<Value>, IndexError>>()?;

        let url = format!("{}/points?wait=true", self.collection_url());
        self.send(self.client.put(&url).json(&json!({ "points": points })))?;
        tracing::info!(count = conditions.len(), collection = %self.collection, "Conditions upserted");
        Ok(())
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Attach auth, send, and map transport and status failures.
    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<reqwest::blocking::Response, IndexError> {
        let request = match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        };

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                IndexError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                IndexError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                IndexError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(IndexError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn post_json<T: for<'de> Deserialize<'de>>(&self, url: &str, body: &Value) -> Result<T, IndexError> {
        let response = self.send(self.client.post(url).json(body))?;
        response
            .json()
            .map_err(|e| IndexError::ResponseParsing(e.to_string()))
    }
}

/// Stable point id for a condition.
pub fn point_id(condition_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, condition_id.as_bytes())
}

/// Translate a typed filter into a Qdrant `must` filter. `None` when unconstrained.
pub fn to_qdrant_filter(filter: &SearchFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(rare) = filter.rare_disease {
        must.push(json!({ "key": "is_rare_disease", "match": { "value": rare } }));
    }
    if let Some(urgency) = filter.urgency {
        must.push(json!({ "key": "urgency_level", "match": { "value": urgency.as_str() } }));
    }
    if let Some(min) = filter.min_prevalence {
        must.push(json!({ "key": "prevalence", "range": { "gte": min } }));
    }
    if let Some(max) = filter.max_prevalence {
        must.push(json!({ "key": "prevalence", "range": { "lte": max } }));
    }
    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f64,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct RecordPoint {
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Deserialize)]
struct ScrollPage {
    points: Vec<RecordPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f64,
    with_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

fn parse_payload(payload: Option<Value>) -> Result<MedicalCondition, IndexError> {
    let payload = payload.ok_or_else(|| IndexError::InvalidPayload("point has no payload".into()))?;
    serde_json::from_value(payload).map_err(|e| IndexError::InvalidPayload(e.to_string()))
}

impl ConditionIndex for QdrantConditionIndex {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f64,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredCondition>, IndexError> {
        let url = format!("{}/points/search", self.collection_url());
        let body = serde_json::to_value(SearchRequest {
            vector: query,
            limit,
            score_threshold,
            with_payload: true,
            filter: to_qdrant_filter(filter),
        })
        .map_err(|e| IndexError::HttpClient(e.to_string()))?;

        tracing::debug!(limit, score_threshold, collection = %self.collection, "Searching conditions");
        let parsed: QdrantResponse<Vec<ScoredPoint>> = self.post_json(&url, &body)?;

        parsed
            .result
            .into_iter()
            .map(|point| {
                Ok(ScoredCondition {
                    condition: parse_payload(point.payload)?,
                    similarity: point.score.clamp(0.0, 1.0),
                })
            })
            .collect()
    }

    fn get_condition_by_id(&self, condition_id: &str) -> Result<Option<MedicalCondition>, IndexError> {
        let url = format!("{}/points", self.collection_url());
        let body = json!({ "ids": [point_id(condition_id)], "with_payload": true });
        let parsed: QdrantResponse<Vec<RecordPoint>> = self.post_json(&url, &body)?;
        parsed
            .result
            .into_iter()
            .next()
            .map(|point| parse_payload(point.payload))
            .transpose()
    }
}

impl ConditionCatalog for QdrantConditionIndex {
    fn conditions(&self, filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError> {
        let url = format!("{}/points/scroll", self.collection_url());
        let mut conditions = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(f) = to_qdrant_filter(filter) {
                body["filter"] = f;
            }
            if let Some(o) = offset.take() {
                body["offset"] = o;
            }

            let page: QdrantResponse<ScrollPage> = self.post_json(&url, &body)?;
            for point in page.result.points {
                conditions.push(parse_payload(point.payload)?);
            }
            match page.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = conditions.len(), "Scrolled condition catalog");
        Ok(conditions)
    }
}
