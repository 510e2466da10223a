use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use prospect_domain::StructuredQuery;

/// One datastore predicate derived from a recognised query facet.
///
/// Facets map to case-insensitive substring or equality predicates on fixed
/// columns; anything unrecognised upstream simply never becomes a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanyCondition {
	Contains { column: &'static str, needle: String },
	YearEq { value: i32 },
	YearGte { value: i32 },
	YearLte { value: i32 },
	/// Free-text residue: substring over name, industry, and enrichment.
	FreeText { needle: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyFilter {
	conditions: Vec<CompanyCondition>,
}
impl CompanyFilter {
	pub fn from_query(query: &StructuredQuery) -> Self {
		let mut conditions = Vec::new();

		for (column, facet) in [
			("industry", query.industry.as_deref()),
			("country", query.country.as_deref()),
			("region", query.region.as_deref()),
			("locality", query.locality.as_deref()),
			("size", query.size.as_deref()),
		] {
			if let Some(needle) = facet.map(str::trim).filter(|needle| !needle.is_empty()) {
				conditions
					.push(CompanyCondition::Contains { column, needle: needle.to_string() });
			}
		}

		if let Some(year) = query.founded_year {
			conditions.push(CompanyCondition::YearEq { value: year });
		}
		if let Some(year) = query.founded_min {
			conditions.push(CompanyCondition::YearGte { value: year });
		}
		if let Some(year) = query.founded_max {
			conditions.push(CompanyCondition::YearLte { value: year });
		}
		if let Some(needle) =
			query.free_text.as_deref().map(str::trim).filter(|needle| !needle.is_empty())
		{
			conditions.push(CompanyCondition::FreeText { needle: needle.to_string() });
		}

		Self { conditions }
	}

	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty()
	}

	/// Canonical JSON form, hashed into cursor fingerprints so a cursor can
	/// only resume the exact (filter, sort) pair that produced it.
	pub fn fingerprint_value(&self) -> Value {
		let conditions: Vec<Value> = self
			.conditions
			.iter()
			.map(|condition| match condition {
				CompanyCondition::Contains { column, needle } => {
					serde_json::json!({ "op": "contains", "column": column, "needle": needle })
				},
				CompanyCondition::YearEq { value } => {
					serde_json::json!({ "op": "year_eq", "value": value })
				},
				CompanyCondition::YearGte { value } => {
					serde_json::json!({ "op": "year_gte", "value": value })
				},
				CompanyCondition::YearLte { value } => {
					serde_json::json!({ "op": "year_lte", "value": value })
				},
				CompanyCondition::FreeText { needle } => {
					serde_json::json!({ "op": "free_text", "needle": needle })
				},
			})
			.collect();

		Value::Array(conditions)
	}

	pub(crate) fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		for (index, condition) in self.conditions.iter().enumerate() {
			if index > 0 {
				builder.push(" AND ");
			}

			match condition {
				CompanyCondition::Contains { column, needle } => {
					builder.push(*column);
					builder.push(" ILIKE ");
					builder.push_bind(format!("%{}%", escape_like(needle)));
				},
				CompanyCondition::YearEq { value } => {
					builder.push("founded_year = ");
					builder.push_bind(*value);
				},
				CompanyCondition::YearGte { value } => {
					builder.push("founded_year >= ");
					builder.push_bind(*value);
				},
				CompanyCondition::YearLte { value } => {
					builder.push("founded_year <= ");
					builder.push_bind(*value);
				},
				CompanyCondition::FreeText { needle } => {
					let pattern = format!("%{}%", escape_like(needle));

					builder.push("(name ILIKE ");
					builder.push_bind(pattern.clone());
					builder.push(" OR industry ILIKE ");
					builder.push_bind(pattern.clone());
					builder.push(" OR enrichment ILIKE ");
					builder.push_bind(pattern);
					builder.push(")");
				},
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
	Name,
	CreatedAt,
	UpdatedAt,
}
impl SortField {
	pub fn column(self) -> &'static str {
		match self {
			Self::Name => "name",
			Self::CreatedAt => "created_at",
			Self::UpdatedAt => "updated_at",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
	Asc,
	Desc,
}

/// Sort specification. The identity column (`company_id`, ascending) is
/// always appended as the secondary key, guaranteeing a total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SortSpec {
	pub field: SortField,
	pub direction: SortDirection,
}
impl Default for SortSpec {
	fn default() -> Self {
		Self { field: SortField::Name, direction: SortDirection::Asc }
	}
}
impl SortSpec {
	pub fn fingerprint_value(&self) -> Value {
		serde_json::json!({
			"field": self.field.column(),
			"direction": match self.direction {
				SortDirection::Asc => "asc",
				SortDirection::Desc => "desc",
			},
		})
	}
}

// ILIKE treats %, _ and \ specially; facet text is user input.
pub(crate) fn escape_like(needle: &str) -> String {
	let mut out = String::with_capacity(needle.len());

	for ch in needle.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn facets_become_conditions() {
		let query = StructuredQuery {
			industry: Some("fintech".to_string()),
			locality: Some("Berlin".to_string()),
			founded_min: Some(2015),
			free_text: Some("startups".to_string()),
			..StructuredQuery::default()
		};
		let filter = CompanyFilter::from_query(&query);

		assert_eq!(
			filter.conditions,
			vec![
				CompanyCondition::Contains { column: "industry", needle: "fintech".to_string() },
				CompanyCondition::Contains { column: "locality", needle: "Berlin".to_string() },
				CompanyCondition::YearGte { value: 2015 },
				CompanyCondition::FreeText { needle: "startups".to_string() },
			]
		);
	}

	#[test]
	fn blank_facets_are_ignored() {
		let query = StructuredQuery {
			industry: Some("  ".to_string()),
			..StructuredQuery::default()
		};

		assert!(CompanyFilter::from_query(&query).is_empty());
	}

	#[test]
	fn like_metacharacters_are_escaped() {
		assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
	}

	#[test]
	fn fingerprint_is_deterministic() {
		let query = StructuredQuery {
			industry: Some("AI".to_string()),
			country: Some("US".to_string()),
			..StructuredQuery::default()
		};
		let first = CompanyFilter::from_query(&query).fingerprint_value();
		let second = CompanyFilter::from_query(&query).fingerprint_value();

		assert_eq!(first, second);
	}
}
