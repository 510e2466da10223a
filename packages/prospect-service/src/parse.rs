use serde_json::Value;
use tracing::warn;

use prospect_domain::StructuredQuery;

use crate::ProspectService;

impl ProspectService {
	/// Translate free text into structured facets.
	///
	/// Never fails: a provider error, missing credentials, or non-conforming
	/// output degrades to `{free_text: original}` so downstream stages always
	/// receive a usable query.
	pub async fn parse_query(&self, text: &str) -> StructuredQuery {
		let trimmed = text.trim();

		if trimmed.is_empty() {
			return StructuredQuery::default();
		}

		let messages = build_parser_messages(trimmed);
		let raw = match self
			.providers
			.parser
			.complete_json(&self.cfg.providers.llm_parser, &messages)
			.await
		{
			Ok(value) => value,
			Err(err) => {
				warn!(error = %err, "Query parsing degraded to free text.");

				return StructuredQuery::from_free_text(trimmed);
			},
		};

		match serde_json::from_value::<StructuredQuery>(raw) {
			Ok(parsed) => parsed.normalized(trimmed),
			Err(err) => {
				warn!(error = %err, "Query parser returned an unexpected shape; degrading to free text.");

				StructuredQuery::from_free_text(trimmed)
			},
		}
	}
}

fn build_parser_messages(query: &str) -> Vec<Value> {
	let schema = serde_json::json!({
		"industry": "string or null",
		"country": "string or null",
		"region": "string or null",
		"locality": "string or null",
		"size": "string or null",
		"founded_year": "integer or null",
		"founded_min": "integer or null",
		"founded_max": "integer or null",
		"free_text": "string or null",
	});
	let schema_text = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());
	let system_prompt = "You translate company search queries into structured facets. \
Output must be valid JSON only and must match the provided schema exactly. \
Put anything you cannot map to a facet into free_text. \
Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nQuery:\n{query}",
		schema = schema_text,
		query = query
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}
