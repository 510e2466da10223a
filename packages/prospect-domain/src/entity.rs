use std::collections::{BTreeMap, HashMap};

use crate::normalize::{normalize_domain, normalize_name};

/// A company extracted from unstructured web-search output.
///
/// Ephemeral: created per extraction call, consumed immediately by the
/// matcher, never persisted directly.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExtractedEntity {
	pub name: String,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub industry: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub location: Option<String>,
	#[serde(default)]
	pub size: Option<String>,
	#[serde(default)]
	pub founding_year: Option<i32>,
	#[serde(default)]
	pub specialties: Vec<String>,
	#[serde(default)]
	pub social_links: BTreeMap<String, String>,
	#[serde(default)]
	pub confidence_score: f32,
}
impl ExtractedEntity {
	/// The canonical text embedded for fuzzy matching.
	pub fn canonical_text(&self) -> String {
		let mut out = self.name.trim().to_string();

		for part in [self.description.as_deref(), self.industry.as_deref()] {
			if let Some(part) = part.map(str::trim).filter(|part| !part.is_empty()) {
				out.push_str(". ");
				out.push_str(part);
			}
		}

		out
	}
}

/// Merge duplicate entities from one extraction response.
///
/// Entities sharing a case-insensitive domain collapse into the first-seen
/// entry; entities without a domain collapse by case-insensitive name.
/// Scalar fields keep the first non-empty value, list and map fields union
/// without overwriting. Running the function over already-deduplicated output
/// is a no-op.
pub fn dedupe_entities(entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
	let mut out: Vec<ExtractedEntity> = Vec::with_capacity(entities.len());
	let mut by_domain: HashMap<String, usize> = HashMap::new();
	let mut by_name: HashMap<String, usize> = HashMap::new();

	for entity in entities {
		let domain_key = entity.domain.as_deref().and_then(normalize_domain);

		let slot = match &domain_key {
			Some(domain) => by_domain.get(domain).copied(),
			None => by_name.get(&normalize_name(&entity.name)).copied(),
		};

		match slot {
			Some(index) => merge_into(&mut out[index], entity),
			None => {
				let index = out.len();

				match domain_key {
					Some(domain) => {
						by_domain.insert(domain, index);
					},
					None => {
						by_name.insert(normalize_name(&entity.name), index);
					},
				}

				out.push(entity);
			},
		}
	}

	out
}

// Explicit field-by-field merge over the closed entity schema: the first
// non-empty value wins, lists and maps union without overwriting.
fn merge_into(primary: &mut ExtractedEntity, other: ExtractedEntity) {
	merge_scalar(&mut primary.domain, other.domain);
	merge_scalar(&mut primary.industry, other.industry);
	merge_scalar(&mut primary.description, other.description);
	merge_scalar(&mut primary.location, other.location);
	merge_scalar(&mut primary.size, other.size);

	if primary.founding_year.is_none() {
		primary.founding_year = other.founding_year;
	}
	if primary.name.trim().is_empty() {
		primary.name = other.name;
	}

	for specialty in other.specialties {
		let seen = primary
			.specialties
			.iter()
			.any(|existing| existing.eq_ignore_ascii_case(&specialty));

		if !seen && !specialty.trim().is_empty() {
			primary.specialties.push(specialty);
		}
	}

	for (network, url) in other.social_links {
		primary.social_links.entry(network).or_insert(url);
	}

	if primary.confidence_score == 0.0 {
		primary.confidence_score = other.confidence_score;
	}
}

fn merge_scalar(primary: &mut Option<String>, other: Option<String>) {
	let empty = primary.as_deref().map(|value| value.trim().is_empty()).unwrap_or(true);

	if empty && let Some(value) = other.filter(|value| !value.trim().is_empty()) {
		*primary = Some(value);
	}
}
