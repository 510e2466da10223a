use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use prospect_domain::{ExtractedEntity, cosine_similarity, normalize_domain, normalize_name};
use prospect_storage::{models::Company, queries};

use crate::{ProspectService, ServiceResult, embedding_version};

// Entity locations are free text ("Berlin, Germany"); only the first few
// comma-separated parts feed the candidate pre-filter.
const MAX_LOCATION_TERMS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
	pub max_matches: u32,
	pub similarity_threshold: f32,
}
impl MatchOptions {
	pub fn from_config(cfg: &prospect_config::Matching) -> Self {
		Self { max_matches: cfg.max_matches, similarity_threshold: cfg.similarity_threshold }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	Exact,
	Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
	Domain,
	Name,
	Embedding,
}

#[derive(Debug, Clone)]
pub struct CompanyMatch {
	pub company: Company,
	pub match_type: MatchType,
	pub match_field: MatchField,
	pub score: f32,
}

/// Matches for one extracted entity, exact before fuzzy, score descending,
/// at most `max_matches` entries.
#[derive(Debug, Clone)]
pub struct MatchResult {
	pub entity: ExtractedEntity,
	pub matches: Vec<CompanyMatch>,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct MatcherMeta {
	pub total: usize,
	pub exact: usize,
	pub fuzzy: usize,
	pub unmatched: usize,
}

#[derive(Debug)]
pub struct MatchResponse {
	pub matched: Vec<MatchResult>,
	pub meta: MatcherMeta,
}

impl ProspectService {
	/// Match extracted entities against the canonical store.
	///
	/// Exact (normalised domain, then case-insensitive name) hits
	/// short-circuit with score 1.0; the rest fall through to batched
	/// embedding similarity over a coarse candidate pre-filter. An embedding
	/// failure empties that entity's matches without touching its siblings.
	pub async fn match_entities(
		&self,
		entities: &[ExtractedEntity],
		opts: &MatchOptions,
	) -> ServiceResult<MatchResponse> {
		let domains: Vec<String> =
			entities.iter().filter_map(|e| e.domain.as_deref().and_then(normalize_domain)).collect();
		let names: Vec<String> = entities.iter().map(|e| normalize_name(&e.name)).collect();
		let exact_rows =
			queries::find_exact_candidates(&self.db.pool, &domains, &names).await?;

		let mut by_domain: HashMap<String, usize> = HashMap::new();
		let mut by_name: HashMap<String, usize> = HashMap::new();

		for (index, row) in exact_rows.iter().enumerate() {
			if let Some(domain) = row.domain.as_deref().and_then(normalize_domain) {
				by_domain.entry(domain).or_insert(index);
			}

			by_name.entry(normalize_name(&row.name)).or_insert(index);
		}

		let mut matched: Vec<MatchResult> = Vec::with_capacity(entities.len());
		let mut pending: Vec<usize> = Vec::new();

		for entity in entities {
			let domain_hit = entity
				.domain
				.as_deref()
				.and_then(normalize_domain)
				.and_then(|domain| by_domain.get(&domain).copied())
				.map(|index| (index, MatchField::Domain));
			let hit = domain_hit.or_else(|| {
				by_name
					.get(&normalize_name(&entity.name))
					.copied()
					.map(|index| (index, MatchField::Name))
			});

			match hit {
				Some((index, match_field)) => {
					matched.push(MatchResult {
						entity: entity.clone(),
						matches: vec![CompanyMatch {
							company: exact_rows[index].clone(),
							match_type: MatchType::Exact,
							match_field,
							score: 1.0,
						}],
					});
				},
				None => {
					pending.push(matched.len());

					matched.push(MatchResult { entity: entity.clone(), matches: Vec::new() });
				},
			}
		}

		if !pending.is_empty() {
			self.fuzzy_match(&mut matched, &pending, opts).await?;
		}

		let mut meta = MatcherMeta { total: entities.len(), ..MatcherMeta::default() };

		for result in &matched {
			match result.matches.first().map(|m| m.match_type) {
				Some(MatchType::Exact) => meta.exact += 1,
				Some(MatchType::Fuzzy) => meta.fuzzy += 1,
				None => meta.unmatched += 1,
			}
		}

		Ok(MatchResponse { matched, meta })
	}

	// Fuzzy phase: embed entity texts in bounded batches, pull candidate
	// companies through the coarse pre-filter, compare via cosine similarity.
	async fn fuzzy_match(
		&self,
		matched: &mut [MatchResult],
		pending: &[usize],
		opts: &MatchOptions,
	) -> ServiceResult<()> {
		let texts: Vec<String> =
			pending.iter().map(|&index| matched[index].entity.canonical_text()).collect();
		let vectors = self.embed_batched(&texts).await;

		let Some(vectors) = vectors else {
			// Entities in a failed embedding call degrade to no matches;
			// sibling stages keep running.
			return Ok(());
		};

		for (&index, entity_vec) in pending.iter().zip(vectors.iter()) {
			let Some(entity_vec) = entity_vec else {
				continue;
			};
			let entity = &matched[index].entity;
			let location_terms = location_terms(entity.location.as_deref());
			let candidates = queries::candidate_companies(
				&self.db.pool,
				entity.industry.as_deref(),
				&location_terms,
				self.cfg.matching.candidate_limit,
			)
			.await?;

			if candidates.is_empty() {
				continue;
			}

			let candidate_vectors = match self.candidate_vectors(&candidates).await {
				Ok(vectors) => vectors,
				Err(err) => {
					warn!(error = %err, "Candidate embeddings unavailable; entity degrades to no matches.");

					continue;
				},
			};
			let scored: Vec<(Company, Vec<f32>)> = candidates
				.into_iter()
				.zip(candidate_vectors.into_iter())
				.filter_map(|(company, vector)| vector.map(|vector| (company, vector)))
				.collect();

			matched[index].matches = rank_candidates(
				entity_vec,
				&scored,
				opts.similarity_threshold,
				opts.max_matches as usize,
			);
		}

		Ok(())
	}

	// One logical embedding pass over all entity texts, chunked at the
	// configured batch size. A failed chunk maps to None per text.
	async fn embed_batched(&self, texts: &[String]) -> Option<Vec<Option<Vec<f32>>>> {
		if texts.is_empty() {
			return Some(Vec::new());
		}

		let batch_size = self.cfg.matching.embedding_batch_size.max(1) as usize;
		let mut out: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
		let mut any_ok = false;

		for chunk in texts.chunks(batch_size) {
			match self
				.providers
				.embedding
				.embed(&self.cfg.providers.embedding, chunk)
				.await
			{
				Ok(vectors) if vectors.len() == chunk.len() => {
					out.extend(vectors.into_iter().map(Some));

					any_ok = true;
				},
				Ok(_) => {
					warn!("Embedding provider returned mismatched vector count; chunk degraded.");

					out.extend(std::iter::repeat_with(|| None).take(chunk.len()));
				},
				Err(err) => {
					warn!(error = %err, "Embedding call failed; chunk degraded.");

					out.extend(std::iter::repeat_with(|| None).take(chunk.len()));
				},
			}
		}

		if any_ok { Some(out) } else { None }
	}

	// Stored embeddings for candidates, lazily computing and persisting the
	// missing ones in the same bounded batching.
	async fn candidate_vectors(
		&self,
		candidates: &[Company],
	) -> ServiceResult<Vec<Option<Vec<f32>>>> {
		let version = embedding_version(&self.cfg);
		let ids: Vec<Uuid> = candidates.iter().map(|company| company.company_id).collect();
		let stored = queries::embeddings_for(&self.db.pool, &ids, &version).await?;
		let mut by_id: HashMap<Uuid, Vec<f32>> =
			stored.into_iter().map(|row| (row.company_id, row.vec)).collect();

		let missing: Vec<&Company> = candidates
			.iter()
			.filter(|company| !by_id.contains_key(&company.company_id))
			.collect();

		if !missing.is_empty() {
			let texts: Vec<String> =
				missing.iter().map(|company| company_text(company)).collect();

			if let Some(vectors) = self.embed_batched(&texts).await {
				let now = time::OffsetDateTime::now_utc();

				for (company, vector) in missing.iter().zip(vectors.into_iter()) {
					let Some(vector) = vector else {
						continue;
					};

					if let Err(err) = queries::upsert_embedding(
						&self.db.pool,
						company.company_id,
						&version,
						&vector,
						now,
					)
					.await
					{
						warn!(error = %err, company_id = %company.company_id, "Embedding upsert failed.");
					}

					by_id.insert(company.company_id, vector);
				}
			}
		}

		Ok(candidates
			.iter()
			.map(|company| by_id.get(&company.company_id).cloned())
			.collect())
	}
}

/// Score candidates by cosine similarity against the entity vector; keep
/// those at or above the threshold, best first, at most `max_matches`.
pub(crate) fn rank_candidates(
	entity_vec: &[f32],
	candidates: &[(Company, Vec<f32>)],
	similarity_threshold: f32,
	max_matches: usize,
) -> Vec<CompanyMatch> {
	let mut scored: Vec<CompanyMatch> = candidates
		.iter()
		.filter_map(|(company, vector)| {
			let score = cosine_similarity(entity_vec, vector);

			(score >= similarity_threshold).then(|| CompanyMatch {
				company: company.clone(),
				match_type: MatchType::Fuzzy,
				match_field: MatchField::Embedding,
				score,
			})
		})
		.collect();

	scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
	scored.truncate(max_matches);

	scored
}

fn company_text(company: &Company) -> String {
	let mut out = company.name.trim().to_string();

	for part in [company.enrichment.as_deref(), company.industry.as_deref()] {
		if let Some(part) = part.map(str::trim).filter(|part| !part.is_empty()) {
			out.push_str(". ");
			out.push_str(part);
		}
	}

	out
}

fn location_terms(location: Option<&str>) -> Vec<String> {
	location
		.unwrap_or_default()
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.take(MAX_LOCATION_TERMS)
		.map(str::to_string)
		.collect()
}
