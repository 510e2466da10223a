use serde_json::Value;
use tracing::info;

use prospect_domain::{ExtractedEntity, dedupe_entities};
use prospect_providers::{Error as ProviderError, with_backoff};

use crate::{ProspectService, ServiceError, ServiceResult, cache, web_search::WebSearchResponse};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractionResponse {
	pub companies: Vec<ExtractedEntity>,
	pub meta: ExtractionMeta,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct ExtractionMeta {
	pub input_count: usize,
	pub extracted_count: usize,
	pub deduped_count: usize,
}

// The fixed output schema the extractor model must follow.
#[derive(Debug, serde::Deserialize)]
struct ExtractionOutput {
	companies: Vec<ExtractedEntity>,
}

impl ProspectService {
	/// Turn raw web-search blobs into structured entities.
	///
	/// The input must carry at least one raw company (`InvalidRequest`
	/// otherwise, never retried). An extractor response that does not match
	/// the entity schema is a permanent stage error, not something to coerce.
	pub async fn extract_entities(
		&self,
		raw: &WebSearchResponse,
	) -> ServiceResult<ExtractionResponse> {
		if raw.companies.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "Raw search result must contain a non-empty companies array.".to_string(),
			});
		}

		let cfg = &self.cfg.providers.llm_extractor;
		let key = cache::extraction_key(&raw.companies, cfg);

		if let Some(hit) = self.caches.get_extraction(&key).await {
			info!(
				cache_kind = "extraction",
				cache_key_prefix = cache::cache_key_prefix(&key),
				hit = true,
				"Cache hit."
			);

			return Ok(hit);
		}

		let messages = build_extraction_messages(&raw.companies);
		let value = with_backoff(self.retry, ProviderError::is_retryable, || {
			self.providers.extractor.complete_json(cfg, &messages)
		})
		.await?;
		let parsed: ExtractionOutput =
			serde_json::from_value(value).map_err(|err| ServiceError::Provider {
				message: format!("Extraction response does not match the entity schema: {err}"),
			})?;

		let extracted_count = parsed.companies.len();
		let named: Vec<ExtractedEntity> = parsed
			.companies
			.into_iter()
			.filter(|entity| !entity.name.trim().is_empty())
			.map(clamp_confidence)
			.collect();
		let companies = dedupe_entities(named);
		let meta = ExtractionMeta {
			input_count: raw.companies.len(),
			extracted_count,
			deduped_count: companies.len(),
		};
		let response = ExtractionResponse { companies, meta };

		info!(
			cache_kind = "extraction",
			cache_key_prefix = cache::cache_key_prefix(&key),
			hit = false,
			extracted = meta.extracted_count,
			deduped = meta.deduped_count,
			"Cache miss; stored fresh result."
		);

		self.caches.insert_extraction(key, response.clone()).await;

		Ok(response)
	}
}

fn clamp_confidence(mut entity: ExtractedEntity) -> ExtractedEntity {
	if !entity.confidence_score.is_finite() {
		entity.confidence_score = 0.0;
	}

	entity.confidence_score = entity.confidence_score.clamp(0.0, 1.0);

	entity
}

fn build_extraction_messages(raw_companies: &[Value]) -> Vec<Value> {
	let schema = serde_json::json!({
		"companies": [{
			"name": "string (required)",
			"domain": "string or null",
			"industry": "string or null",
			"description": "string or null",
			"location": "string or null",
			"size": "string or null",
			"founding_year": "integer or null",
			"specialties": ["string"],
			"social_links": { "network": "url" },
			"confidence_score": "number between 0 and 1",
		}]
	});
	let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());
	let system_prompt = "You extract structured company records from raw research snippets. \
Output must be valid JSON only and must match the provided schema exactly. \
Use null for anything the snippet does not state. \
Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nRaw companies:\n{raw}",
		schema = schema_text,
		raw = serde_json::to_string_pretty(&Value::Array(raw_companies.to_vec()))
			.unwrap_or_default()
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}
