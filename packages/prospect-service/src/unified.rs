use std::{
	collections::{BTreeMap, HashMap},
	time::Instant,
};

use tracing::{info, warn};
use uuid::Uuid;

use prospect_domain::{
	ExtractedEntity, StructuredQuery, normalize_domain, term_overlap, tokenize,
};
use prospect_storage::{
	filter::{SortDirection, SortField, SortSpec},
	models::Company,
	page::PageRequest,
	queries,
};

use crate::{
	MatchField, MatchOptions, MatchResult, MatchType, Pagination, ProspectService, ServiceError,
	ServiceResult, cache,
};

const MAX_QUERY_TERMS: usize = 8;

/// One discrete step of the unified pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Parse,
	DbSearch,
	WebSearch,
	Extract,
	Match,
	FuseRank,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Parse => "parse",
			Self::DbSearch => "db-search",
			Self::WebSearch => "web-search",
			Self::Extract => "extract",
			Self::Match => "match",
			Self::FuseRank => "fuse-rank",
		}
	}
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchOptions {
	pub limit: Option<u32>,
	pub cursor: Option<String>,
	#[serde(default)]
	pub include_total: bool,
	pub sort_field: Option<SortField>,
	pub sort_direction: Option<SortDirection>,
	pub max_matches: Option<u32>,
	pub similarity_threshold: Option<f32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnifiedSearchRequest {
	pub query: String,
	#[serde(default)]
	pub options: SearchOptions,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Sources {
	pub database: bool,
	pub web: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchMeta {
	pub stages: BTreeMap<String, u64>,
	pub errors: BTreeMap<String, String>,
	pub sources: Sources,
}

/// A reported candidate match for one result item.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MatchSummary {
	pub company_id: Uuid,
	pub name: String,
	pub match_type: MatchType,
	pub match_field: MatchField,
	pub score: f32,
}

/// One fused result item: a stored company (possibly enriched from the web)
/// or a web-discovered entity with no stored counterpart.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RankedCompany {
	pub company_id: Option<Uuid>,
	pub name: String,
	pub domain: Option<String>,
	pub industry: Option<String>,
	pub locality: Option<String>,
	pub region: Option<String>,
	pub country: Option<String>,
	pub location: Option<String>,
	pub size: Option<String>,
	pub founded_year: Option<i32>,
	pub linkedin_url: Option<String>,
	pub description: Option<String>,
	pub web_discovered: bool,
	pub enriched_from_web: bool,
	pub score: f32,
	pub matches: Vec<MatchSummary>,
}
impl RankedCompany {
	fn from_company(row: Company) -> Self {
		Self {
			company_id: Some(row.company_id),
			name: row.name,
			domain: row.domain,
			industry: row.industry,
			locality: row.locality,
			region: row.region,
			country: row.country,
			location: None,
			size: row.size,
			founded_year: row.founded_year,
			linkedin_url: row.linkedin_url,
			description: row.enrichment,
			web_discovered: false,
			enriched_from_web: false,
			score: 0.0,
			matches: Vec::new(),
		}
	}

	fn from_entity(entity: &ExtractedEntity) -> Self {
		Self {
			company_id: None,
			name: entity.name.clone(),
			domain: entity.domain.as_deref().and_then(normalize_domain),
			industry: entity.industry.clone(),
			locality: None,
			region: None,
			country: None,
			location: entity.location.clone(),
			size: entity.size.clone(),
			founded_year: entity.founding_year,
			linkedin_url: entity.social_links.get("linkedin").cloned(),
			description: entity.description.clone(),
			web_discovered: true,
			enriched_from_web: false,
			score: 0.0,
			matches: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnifiedSearchResponse {
	pub success: bool,
	pub companies: Vec<RankedCompany>,
	pub pagination: Option<Pagination>,
	pub meta: SearchMeta,
}

impl ProspectService {
	/// The unified pipeline: PARSE → DB_SEARCH → (if short) WEB_SEARCH →
	/// EXTRACT → MATCH → FUSE_AND_RANK.
	///
	/// Stage failures land in `meta.errors` and skip their dependants; the
	/// request succeeds as long as any stage produced data. Only a dead
	/// database combined with a dead web path is a hard failure.
	pub async fn unified_search(
		&self,
		req: UnifiedSearchRequest,
	) -> ServiceResult<UnifiedSearchResponse> {
		let query_text = req.query.trim().to_string();
		let options = req.options;
		let limit = options
			.limit
			.unwrap_or(self.cfg.search.default_limit)
			.clamp(1, self.cfg.search.max_limit);
		let cache_key = cache::unified_key(&query_text, &options);

		if !query_text.is_empty()
			&& let Some(hit) = self.caches.get_unified(&cache_key).await
		{
			info!(
				cache_kind = "unified",
				cache_key_prefix = cache::cache_key_prefix(&cache_key),
				hit = true,
				"Cache hit."
			);

			return Ok(hit);
		}

		let mut stages: BTreeMap<String, u64> = BTreeMap::new();
		let mut errors: BTreeMap<String, String> = BTreeMap::new();
		let mut sources = Sources::default();

		// PARSE never fails; it degrades to free text internally.
		let start = Instant::now();
		let parsed = self.parse_query(&query_text).await;

		record(&mut stages, Stage::Parse, start);

		let sort = SortSpec {
			field: options.sort_field.unwrap_or(SortField::Name),
			direction: options.sort_direction.unwrap_or(SortDirection::Asc),
		};
		let page_req = PageRequest {
			limit,
			cursor: options.cursor.clone(),
			include_total: options.include_total,
		};
		let start = Instant::now();
		let db_page = match self.db_search(&parsed, &sort, &page_req).await {
			Ok(page) => {
				sources.database = true;

				Some(page)
			},
			Err(err) => {
				// Proceed as though the database returned nothing; this
				// forces the web path to run.
				warn!(error = %err, "Database search failed; continuing with the web path.");
				errors.insert(Stage::DbSearch.as_str().to_string(), err.to_string());

				None
			},
		};

		record(&mut stages, Stage::DbSearch, start);

		let db_rows = db_page.as_ref().map(|page| page.rows.clone()).unwrap_or_default();
		let need_web = (db_rows.len() as u32) < limit;
		let mut match_results: Vec<MatchResult> = Vec::new();

		if need_web {
			let start = Instant::now();
			let web = match self.web_search(&parsed).await {
				Ok(response) => {
					sources.web = true;

					Some(response)
				},
				Err(err) => {
					errors.insert(Stage::WebSearch.as_str().to_string(), err.to_string());

					None
				},
			};

			record(&mut stages, Stage::WebSearch, start);

			// Stages depending on a failed or empty predecessor are skipped,
			// never attempted with garbage input.
			let extraction = match web.filter(|response| !response.companies.is_empty()) {
				Some(web) => {
					let start = Instant::now();
					let extraction = match self.extract_entities(&web).await {
						Ok(extraction) => Some(extraction),
						Err(err) => {
							errors.insert(Stage::Extract.as_str().to_string(), err.to_string());

							None
						},
					};

					record(&mut stages, Stage::Extract, start);

					extraction
				},
				None => None,
			};

			if let Some(extraction) =
				extraction.filter(|extraction| !extraction.companies.is_empty())
			{
				let opts = MatchOptions {
					max_matches: options
						.max_matches
						.unwrap_or(self.cfg.matching.max_matches),
					similarity_threshold: options
						.similarity_threshold
						.unwrap_or(self.cfg.matching.similarity_threshold),
				};
				let start = Instant::now();

				match self.match_entities(&extraction.companies, &opts).await {
					Ok(response) => {
						match_results = response.matched;
					},
					Err(err) => {
						errors.insert(Stage::Match.as_str().to_string(), err.to_string());

						// The extracted entities are still data produced by a
						// successful stage; with matching unavailable they all
						// fuse as unmatched.
						match_results = extraction
							.companies
							.iter()
							.map(|entity| MatchResult {
								entity: entity.clone(),
								matches: Vec::new(),
							})
							.collect();
					},
				}

				record(&mut stages, Stage::Match, start);
			}
		}

		let start = Instant::now();
		let query_tokens = tokenize(&query_text, MAX_QUERY_TERMS);
		let companies =
			fuse_and_rank(db_rows, &match_results, &parsed, &query_tokens, &self.cfg.ranking);

		record(&mut stages, Stage::FuseRank, start);

		self.persist_enrichment(&match_results).await;

		if !sources.database && !sources.web {
			return Err(ServiceError::Provider {
				message: format!(
					"No search stage produced data: {}",
					errors
						.iter()
						.map(|(stage, message)| format!("{stage}: {message}"))
						.collect::<Vec<_>>()
						.join("; ")
				),
			});
		}

		let pagination = db_page.map(|page| Pagination {
			next_cursor: page.next_cursor,
			prev_cursor: page.prev_cursor,
			has_more: page.has_more,
			total: page.total,
		});
		let response = UnifiedSearchResponse {
			success: true,
			companies,
			pagination,
			meta: SearchMeta { stages, errors, sources },
		};

		// Only a fully clean run is worth pinning for the TTL.
		if !query_text.is_empty() && response.meta.errors.is_empty() {
			self.caches.insert_unified(cache_key, response.clone()).await;
		}

		Ok(response)
	}

	// Exact matches push their web-derived description into the store so the
	// next search benefits. Best-effort: a failure here never degrades the
	// response.
	async fn persist_enrichment(&self, match_results: &[MatchResult]) {
		let now = time::OffsetDateTime::now_utc();

		for result in match_results {
			let Some(hit) = result.matches.first() else {
				continue;
			};

			if hit.match_type != MatchType::Exact {
				continue;
			}

			let already_enriched = hit
				.company
				.enrichment
				.as_deref()
				.map(|text| !text.trim().is_empty())
				.unwrap_or(false);
			let Some(description) = result
				.entity
				.description
				.as_deref()
				.map(str::trim)
				.filter(|text| !text.is_empty())
			else {
				continue;
			};

			if already_enriched {
				continue;
			}
			if let Err(err) = queries::update_enrichment(
				&self.db.pool,
				hit.company.company_id,
				description,
				now,
			)
			.await
			{
				warn!(
					error = %err,
					company_id = %hit.company.company_id,
					"Enrichment write failed."
				);
			}
		}
	}
}

/// Merge database rows with matcher output and rank the combined set.
///
/// Exact matches enrich the stored company (appending it when the database
/// page missed it); zero-match entities join as web-discovered; fuzzy-only
/// entities surface their candidates on the matched item instead of becoming
/// results themselves. Ties keep insertion order (stable sort).
fn fuse_and_rank(
	db_rows: Vec<Company>,
	match_results: &[MatchResult],
	parsed: &StructuredQuery,
	query_tokens: &[String],
	weights: &prospect_config::Ranking,
) -> Vec<RankedCompany> {
	let mut items: Vec<RankedCompany> =
		db_rows.into_iter().map(RankedCompany::from_company).collect();
	let mut index_by_id: HashMap<Uuid, usize> = items
		.iter()
		.enumerate()
		.filter_map(|(index, item)| item.company_id.map(|id| (id, index)))
		.collect();

	for result in match_results {
		match result.matches.first() {
			Some(hit) if hit.match_type == MatchType::Exact => {
				let index = match index_by_id.get(&hit.company.company_id) {
					Some(index) => *index,
					None => {
						let index = items.len();

						items.push(RankedCompany::from_company(hit.company.clone()));
						index_by_id.insert(hit.company.company_id, index);

						index
					},
				};

				enrich_item(&mut items[index], &result.entity);

				items[index].enriched_from_web = true;
				items[index].matches = summarize(&result.matches);
			},
			Some(hit) => {
				// Fuzzy-only: most likely a duplicate of an existing company,
				// so report the candidates without promoting the entity.
				if let Some(index) = index_by_id.get(&hit.company.company_id)
					&& items[*index].matches.is_empty()
				{
					items[*index].matches = summarize(&result.matches);
				}
			},
			None => {
				items.push(RankedCompany::from_entity(&result.entity));
			},
		}
	}

	for item in &mut items {
		item.score = score_item(item, parsed, query_tokens, weights);
	}

	items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

	items
}

// First non-empty value wins; the stored record is never overwritten, only
// filled in.
fn enrich_item(item: &mut RankedCompany, entity: &ExtractedEntity) {
	if item.domain.is_none() {
		item.domain = entity.domain.as_deref().and_then(normalize_domain);
	}

	for (slot, value) in [
		(&mut item.industry, entity.industry.as_deref()),
		(&mut item.size, entity.size.as_deref()),
		(&mut item.description, entity.description.as_deref()),
		(&mut item.location, entity.location.as_deref()),
	] {
		if slot.as_deref().map(|text| text.trim().is_empty()).unwrap_or(true)
			&& let Some(value) = value.map(str::trim).filter(|value| !value.is_empty())
		{
			*slot = Some(value.to_string());
		}
	}

	if item.founded_year.is_none() {
		item.founded_year = entity.founding_year;
	}
	if item.linkedin_url.is_none() {
		item.linkedin_url = entity.social_links.get("linkedin").cloned();
	}
}

fn summarize(matches: &[crate::CompanyMatch]) -> Vec<MatchSummary> {
	matches
		.iter()
		.map(|hit| MatchSummary {
			company_id: hit.company.company_id,
			name: hit.company.name.clone(),
			match_type: hit.match_type,
			match_field: hit.match_field,
			score: hit.score,
		})
		.collect()
}

fn score_item(
	item: &RankedCompany,
	parsed: &StructuredQuery,
	query_tokens: &[String],
	weights: &prospect_config::Ranking,
) -> f32 {
	let mut score = 0.0;

	if item.web_discovered {
		score += weights.web_discovered_bonus;
	}
	if item.enriched_from_web {
		score += weights.enriched_bonus;
	}

	score += term_overlap(query_tokens, &item.name) as f32 * weights.term_overlap_weight;

	if facet_matches(parsed.industry.as_deref(), item.industry.as_deref()) {
		score += weights.industry_weight;
	}
	if facet_matches(parsed.locality.as_deref(), item.locality.as_deref()) {
		score += weights.locality_weight;
	}
	if facet_matches(parsed.region.as_deref(), item.region.as_deref()) {
		score += weights.region_weight;
	}
	if facet_matches(parsed.country.as_deref(), item.country.as_deref()) {
		score += weights.country_weight;
	}

	score
}

fn facet_matches(facet: Option<&str>, field: Option<&str>) -> bool {
	match (facet, field) {
		(Some(facet), Some(field)) if !facet.trim().is_empty() => {
			field.to_lowercase().contains(&facet.trim().to_lowercase())
		},
		_ => false,
	}
}

fn record(stages: &mut BTreeMap<String, u64>, stage: Stage, start: Instant) {
	stages.insert(stage.as_str().to_string(), start.elapsed().as_millis() as u64);
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use crate::CompanyMatch;

	use super::*;

	fn company(name: &str, industry: Option<&str>) -> Company {
		let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");

		Company {
			company_id: Uuid::new_v4(),
			name: name.to_string(),
			domain: None,
			industry: industry.map(str::to_string),
			locality: None,
			region: None,
			country: None,
			size: None,
			founded_year: None,
			linkedin_url: None,
			enrichment: None,
			last_enriched_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn entity(name: &str) -> ExtractedEntity {
		ExtractedEntity { name: name.to_string(), ..ExtractedEntity::default() }
	}

	fn weights() -> prospect_config::Ranking {
		prospect_config::Ranking::default()
	}

	#[test]
	fn zero_match_entities_join_as_web_discovered() {
		let mut payflow = entity("PayFlow");

		payflow.domain = Some("payflow.io".to_string());
		payflow.industry = Some("fintech".to_string());

		let results = vec![MatchResult { entity: payflow, matches: Vec::new() }];
		let items = fuse_and_rank(Vec::new(), &results, &StructuredQuery::default(), &[], &weights());

		assert_eq!(items.len(), 1);
		assert!(items[0].web_discovered);
		assert_eq!(items[0].domain.as_deref(), Some("payflow.io"));
		assert!(items[0].company_id.is_none());
	}

	#[test]
	fn exact_matches_enrich_the_stored_row_in_place() {
		let stored = company("PayFlow", None);
		let mut extracted = entity("PayFlow");

		extracted.industry = Some("fintech".to_string());
		extracted.description = Some("Payment rails for SMEs.".to_string());

		let results = vec![MatchResult {
			entity: extracted,
			matches: vec![CompanyMatch {
				company: stored.clone(),
				match_type: MatchType::Exact,
				match_field: MatchField::Name,
				score: 1.0,
			}],
		}];
		let items =
			fuse_and_rank(vec![stored], &results, &StructuredQuery::default(), &[], &weights());

		assert_eq!(items.len(), 1);
		assert!(items[0].enriched_from_web);
		assert!(!items[0].web_discovered);
		assert_eq!(items[0].industry.as_deref(), Some("fintech"));
		assert_eq!(items[0].description.as_deref(), Some("Payment rails for SMEs."));
	}

	#[test]
	fn exact_matches_missing_from_the_page_are_appended() {
		let stored = company("PayFlow", Some("fintech"));
		let results = vec![MatchResult {
			entity: entity("PayFlow"),
			matches: vec![CompanyMatch {
				company: stored.clone(),
				match_type: MatchType::Exact,
				match_field: MatchField::Domain,
				score: 1.0,
			}],
		}];
		let other = company("Acme", None);
		let items =
			fuse_and_rank(vec![other], &results, &StructuredQuery::default(), &[], &weights());

		assert_eq!(items.len(), 2);
		assert_eq!(items.iter().filter(|item| item.enriched_from_web).count(), 1);
	}

	#[test]
	fn fuzzy_only_entities_are_not_promoted() {
		let stored = company("PayFlow", None);
		let results = vec![MatchResult {
			entity: entity("PayFlow Labs"),
			matches: vec![CompanyMatch {
				company: stored.clone(),
				match_type: MatchType::Fuzzy,
				match_field: MatchField::Embedding,
				score: 0.82,
			}],
		}];
		let items =
			fuse_and_rank(vec![stored], &results, &StructuredQuery::default(), &[], &weights());

		assert_eq!(items.len(), 1);
		assert!(!items[0].web_discovered);
		assert_eq!(items[0].matches.len(), 1);
		assert_eq!(items[0].matches[0].match_type, MatchType::Fuzzy);
	}

	#[test]
	fn web_discovered_outranks_plain_rows() {
		let results = vec![MatchResult { entity: entity("PayFlow"), matches: Vec::new() }];
		let items = fuse_and_rank(
			vec![company("Acme", None), company("Umbrella", None)],
			&results,
			&StructuredQuery::default(),
			&[],
			&weights(),
		);

		assert_eq!(items[0].name, "PayFlow");
		assert!(items[0].web_discovered);
	}

	#[test]
	fn facet_matches_add_their_weights() {
		let parsed = StructuredQuery {
			industry: Some("fintech".to_string()),
			..StructuredQuery::default()
		};
		let tokens = tokenize("fintech payflow", MAX_QUERY_TERMS);
		let items = fuse_and_rank(
			vec![company("PayFlow", Some("Fintech payments")), company("Acme", None)],
			&[],
			&parsed,
			&tokens,
			&weights(),
		);

		assert_eq!(items[0].name, "PayFlow");
		// Industry substring match plus one name-term overlap.
		assert!(items[0].score > weights().industry_weight);
		assert_eq!(items[1].score, 0.0);
	}

	#[test]
	fn ties_keep_insertion_order() {
		let first = company("Alpha", None);
		let second = company("Beta", None);
		let first_id = first.company_id;
		let items = fuse_and_rank(
			vec![first, second],
			&[],
			&StructuredQuery::default(),
			&[],
			&weights(),
		);

		assert_eq!(items[0].company_id, Some(first_id));
	}
}
