use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Embed a bounded batch of texts. One vector per input, in input order.
pub async fn embed(
	cfg: &prospect_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if cfg.api_key.trim().is_empty() {
		return Err(Error::NotConfigured { provider: cfg.provider_id.clone() });
	}
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(Error::from_reqwest)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
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
	let vectors = parse_embedding_response(json)?;

	if vectors.len() != texts.len() {
		return Err(Error::Permanent {
			message: "Embedding provider returned mismatched vector count.".to_string(),
		});
	}

	Ok(vectors)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(Value::as_array).ok_or_else(|| Error::Permanent {
		message: "Embedding response is missing data array.".to_string(),
	})?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|index| index as usize)
			.unwrap_or(fallback_index);
		let embedding =
			item.get("embedding").and_then(Value::as_array).ok_or_else(|| Error::Permanent {
				message: "Embedding item missing embedding array.".to_string(),
			})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::Permanent {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
