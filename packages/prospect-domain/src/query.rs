use serde_json::Value;

/// Structured facets recognised in a free-text company search query.
///
/// Facet extraction is best-effort: downstream stages treat every facet as a
/// hint, never as a hard filter that can silently exclude all valid results.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructuredQuery {
	#[serde(default)]
	pub industry: Option<String>,
	#[serde(default)]
	pub country: Option<String>,
	#[serde(default)]
	pub region: Option<String>,
	#[serde(default)]
	pub locality: Option<String>,
	#[serde(default)]
	pub size: Option<String>,
	#[serde(default)]
	pub founded_year: Option<i32>,
	#[serde(default)]
	pub founded_min: Option<i32>,
	#[serde(default)]
	pub founded_max: Option<i32>,
	#[serde(default)]
	pub free_text: Option<String>,
}
impl StructuredQuery {
	/// The degraded form: the whole query as free text, no facets.
	pub fn from_free_text(text: &str) -> Self {
		Self { free_text: Some(text.to_string()), ..Self::default() }
	}

	pub fn facet_count(&self) -> usize {
		[
			self.industry.is_some(),
			self.country.is_some(),
			self.region.is_some(),
			self.locality.is_some(),
			self.size.is_some(),
			self.founded_year.is_some(),
			self.founded_min.is_some(),
			self.founded_max.is_some(),
		]
		.into_iter()
		.filter(|set| *set)
		.count()
	}

	pub fn is_empty(&self) -> bool {
		self.facet_count() == 0
			&& self.free_text.as_deref().map(|text| text.trim().is_empty()).unwrap_or(true)
	}

	/// Trim string facets and drop the empty ones. If everything empties out,
	/// the original text is retained as free text so the query never becomes
	/// silently blank.
	pub fn normalized(mut self, original: &str) -> Self {
		for facet in [
			&mut self.industry,
			&mut self.country,
			&mut self.region,
			&mut self.locality,
			&mut self.size,
			&mut self.free_text,
		] {
			if facet.as_deref().map(|value| value.trim().is_empty()).unwrap_or(false) {
				*facet = None;
			} else if let Some(value) = facet.as_mut() {
				*value = value.trim().to_string();
			}
		}

		if self.is_empty() {
			return Self::from_free_text(original);
		}

		self
	}

	/// Canonical JSON form for cache keys. serde_json object keys are sorted,
	/// so two queries with the same facets always produce the same value.
	pub fn signature(&self) -> Value {
		serde_json::json!({
			"industry": self.industry,
			"country": self.country,
			"region": self.region,
			"locality": self.locality,
			"size": self.size,
			"founded_year": self.founded_year,
			"founded_min": self.founded_min,
			"founded_max": self.founded_max,
			"free_text": self.free_text.as_deref().map(str::trim),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalized_drops_blank_facets() {
		let query = StructuredQuery {
			industry: Some("  fintech  ".to_string()),
			country: Some("   ".to_string()),
			..StructuredQuery::default()
		};
		let normalized = query.normalized("fintech startups");

		assert_eq!(normalized.industry.as_deref(), Some("fintech"));
		assert!(normalized.country.is_none());
	}

	#[test]
	fn normalized_falls_back_to_original_text() {
		let query = StructuredQuery {
			industry: Some(" ".to_string()),
			free_text: Some(String::new()),
			..StructuredQuery::default()
		};
		let normalized = query.normalized("fintech startups in Berlin");

		assert_eq!(normalized.free_text.as_deref(), Some("fintech startups in Berlin"));
	}

	#[test]
	fn signature_is_order_independent() {
		let first = StructuredQuery {
			industry: Some("AI".to_string()),
			country: Some("US".to_string()),
			..StructuredQuery::default()
		};
		let second = StructuredQuery {
			country: Some("US".to_string()),
			industry: Some("AI".to_string()),
			..StructuredQuery::default()
		};

		assert_eq!(
			serde_json::to_string(&first.signature()).unwrap(),
			serde_json::to_string(&second.signature()).unwrap()
		);
	}
}
