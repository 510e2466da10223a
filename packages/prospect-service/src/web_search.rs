use serde_json::Value;
use tracing::info;

use prospect_domain::StructuredQuery;
use prospect_providers::{Error as ProviderError, with_backoff};

use crate::{ProspectService, ServiceResult, cache};

/// Raw per-company blobs from the search-capable LLM, before extraction.
///
/// A response that lacked the expected array shape is normalised to an empty
/// set with a diagnostic message instead of an error.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebSearchResponse {
	pub companies: Vec<Value>,
	pub diagnostic: Option<String>,
}

impl ProspectService {
	pub async fn web_search(&self, query: &StructuredQuery) -> ServiceResult<WebSearchResponse> {
		let cfg = &self.cfg.providers.llm_search;
		let key = cache::web_search_key(query, cfg);

		if let Some(hit) = self.caches.get_web_search(&key).await {
			info!(
				cache_kind = "web_search",
				cache_key_prefix = cache::cache_key_prefix(&key),
				hit = true,
				"Cache hit."
			);

			return Ok(hit);
		}

		// Blocks until a permit frees up; never drops the request.
		self.limiter.acquire().await;

		let messages = build_web_search_messages(query);
		let raw = with_backoff(self.retry, ProviderError::is_retryable, || {
			self.providers.web_search.complete_json(cfg, &messages)
		})
		.await?;
		let response = normalize_web_response(raw);

		info!(
			cache_kind = "web_search",
			cache_key_prefix = cache::cache_key_prefix(&key),
			hit = false,
			companies = response.companies.len(),
			"Cache miss; stored fresh result."
		);

		self.caches.insert_web_search(key, response.clone()).await;

		Ok(response)
	}
}

// A response that is not `{"companies": [...]}` (or a bare array) yields an
// empty set with a diagnostic, never a crash on garbage JSON.
fn normalize_web_response(raw: Value) -> WebSearchResponse {
	let companies = match &raw {
		Value::Object(map) => map.get("companies").and_then(Value::as_array).cloned(),
		Value::Array(items) => Some(items.clone()),
		_ => None,
	};

	match companies {
		Some(companies) => WebSearchResponse { companies, diagnostic: None },
		None => WebSearchResponse {
			companies: Vec::new(),
			diagnostic: Some("Web search response did not contain a companies array.".to_string()),
		},
	}
}

fn build_web_search_messages(query: &StructuredQuery) -> Vec<Value> {
	let system_prompt = "You are a company research engine with web search access. \
Find real companies matching the given criteria. \
Output must be valid JSON only: {\"companies\": [...]}, one object per company with \
whatever fields you found (name, website, industry, location, size, founded, description). \
Do not invent companies. Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Search criteria:\n{}",
		serde_json::to_string_pretty(&query.signature()).unwrap_or_default()
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_with_companies_array_passes_through() {
		let raw = serde_json::json!({ "companies": [{ "name": "PayFlow" }] });
		let response = normalize_web_response(raw);

		assert_eq!(response.companies.len(), 1);
		assert!(response.diagnostic.is_none());
	}

	#[test]
	fn bare_array_is_accepted() {
		let response = normalize_web_response(serde_json::json!([{ "name": "PayFlow" }]));

		assert_eq!(response.companies.len(), 1);
	}

	#[test]
	fn missing_array_shape_normalises_to_empty_with_diagnostic() {
		let response = normalize_web_response(serde_json::json!({ "answer": "no idea" }));

		assert!(response.companies.is_empty());
		assert!(response.diagnostic.is_some());
	}
}
