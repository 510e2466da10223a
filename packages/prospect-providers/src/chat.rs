use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// One chat-completion round-trip returning the assistant message content
/// parsed as JSON.
///
/// Every pipeline LLM call (query parsing, web search, extraction) prompts
/// for a JSON object, so content that fails to parse is a permanent,
/// non-retryable error rather than something to coerce.
pub async fn complete_json(
	cfg: &prospect_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<Value> {
	if cfg.api_key.trim().is_empty() {
		return Err(Error::NotConfigured { provider: cfg.provider_id.clone() });
	}

	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(Error::from_reqwest)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let response = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await
		.map_err(Error::from_reqwest)?;
	let status = response.status();

	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();

		return Err(Error::from_status(status, &body));
	}

	let json: Value = response.json().await.map_err(Error::from_reqwest)?;

	parse_content_json(json)
}

fn parse_content_json(json: Value) -> Result<Value> {
	let content = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(Value::as_str)
		.ok_or_else(|| Error::Permanent {
			message: "Completion response is missing message content.".to_string(),
		})?;

	serde_json::from_str(strip_code_fence(content)).map_err(|_| Error::Permanent {
		message: "Completion content is not valid JSON.".to_string(),
	})
}

// Models occasionally wrap the JSON object in a markdown code fence.
fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"companies\": []}" } }
			]
		});
		let parsed = parse_content_json(json).expect("parse failed");

		assert!(parsed.get("companies").is_some());
	}

	#[test]
	fn parses_fenced_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "```json\n{\"companies\": []}\n```" } }
			]
		});

		assert!(parse_content_json(json).is_ok());
	}

	#[test]
	fn non_json_content_is_permanent() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "here are some companies" } }
			]
		});
		let err = parse_content_json(json).expect_err("expected parse failure");

		assert!(!err.is_retryable());
	}

	#[test]
	fn missing_content_is_permanent() {
		let err =
			parse_content_json(serde_json::json!({ "choices": [] })).expect_err("expected error");

		assert!(matches!(err, Error::Permanent { .. }));
	}
}
