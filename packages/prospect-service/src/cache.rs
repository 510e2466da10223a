use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;

use prospect_config::LlmProviderConfig;
use prospect_domain::StructuredQuery;

use crate::{
	extract::ExtractionResponse,
	unified::{SearchOptions, UnifiedSearchResponse},
	web_search::WebSearchResponse,
};

const WEB_SEARCH_CACHE_SCHEMA_VERSION: i32 = 1;
const EXTRACTION_CACHE_SCHEMA_VERSION: i32 = 1;
const UNIFIED_CACHE_SCHEMA_VERSION: i32 = 1;

/// One TTL cache per expensive stage, owned by the service so tests can
/// instantiate isolated caches. Raw web-search output has the shortest TTL,
/// derived extractions live longer, and the fully-fused response has its own
/// TTL again. Reads and writes are concurrent with last-write-wins semantics.
pub struct StageCaches {
	enabled: bool,
	web_search: Cache<String, WebSearchResponse>,
	extraction: Cache<String, ExtractionResponse>,
	unified: Cache<String, UnifiedSearchResponse>,
}
impl StageCaches {
	pub fn new(cfg: &prospect_config::Cache) -> Self {
		Self {
			enabled: cfg.enabled,
			web_search: Cache::builder()
				.max_capacity(cfg.max_entries)
				.time_to_live(Duration::from_secs(cfg.web_search_ttl_secs))
				.build(),
			extraction: Cache::builder()
				.max_capacity(cfg.max_entries)
				.time_to_live(Duration::from_secs(cfg.extraction_ttl_secs))
				.build(),
			unified: Cache::builder()
				.max_capacity(cfg.max_entries)
				.time_to_live(Duration::from_secs(cfg.unified_ttl_secs))
				.build(),
		}
	}

	pub async fn get_web_search(&self, key: &str) -> Option<WebSearchResponse> {
		if !self.enabled {
			return None;
		}

		self.web_search.get(key).await
	}

	pub async fn insert_web_search(&self, key: String, value: WebSearchResponse) {
		if self.enabled {
			self.web_search.insert(key, value).await;
		}
	}

	pub async fn get_extraction(&self, key: &str) -> Option<ExtractionResponse> {
		if !self.enabled {
			return None;
		}

		self.extraction.get(key).await
	}

	pub async fn insert_extraction(&self, key: String, value: ExtractionResponse) {
		if self.enabled {
			self.extraction.insert(key, value).await;
		}
	}

	pub async fn get_unified(&self, key: &str) -> Option<UnifiedSearchResponse> {
		if !self.enabled {
			return None;
		}

		self.unified.get(key).await
	}

	pub async fn insert_unified(&self, key: String, value: UnifiedSearchResponse) {
		if self.enabled {
			self.unified.insert(key, value).await;
		}
	}

	/// Best-effort full clear; there is no per-pattern invalidation.
	pub fn clear(&self) {
		self.web_search.invalidate_all();
		self.extraction.invalidate_all();
		self.unified.invalidate_all();
	}
}

/// blake3 over canonical JSON. serde_json object keys serialise sorted, so
/// semantically identical payloads collide regardless of construction order.
pub fn hash_cache_key(payload: &Value) -> String {
	let raw = serde_json::to_vec(payload).unwrap_or_default();

	blake3::hash(&raw).to_hex().to_string()
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

pub fn web_search_key(query: &StructuredQuery, cfg: &LlmProviderConfig) -> String {
	let payload = serde_json::json!({
		"kind": "web_search",
		"schema_version": WEB_SEARCH_CACHE_SCHEMA_VERSION,
		"query": query.signature(),
		"provider_id": cfg.provider_id,
		"model": cfg.model,
	});

	hash_cache_key(&payload)
}

/// Keyed by the raw input companies, not the query text: identical raw
/// content always extracts to the same entities.
pub fn extraction_key(raw_companies: &[Value], cfg: &LlmProviderConfig) -> String {
	let payload = serde_json::json!({
		"kind": "extraction",
		"schema_version": EXTRACTION_CACHE_SCHEMA_VERSION,
		"input": raw_companies,
		"provider_id": cfg.provider_id,
		"model": cfg.model,
	});

	hash_cache_key(&payload)
}

pub fn unified_key(query: &str, options: &SearchOptions) -> String {
	let payload = serde_json::json!({
		"kind": "unified",
		"schema_version": UNIFIED_CACHE_SCHEMA_VERSION,
		"query": query.trim().to_lowercase(),
		"options": serde_json::to_value(options).unwrap_or_default(),
	});

	hash_cache_key(&payload)
}
