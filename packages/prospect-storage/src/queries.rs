use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use prospect_domain::normalize_domain;

use crate::{
	Error, Result,
	filter::escape_like,
	models::{Company, CompanyEmbedding, NewCompany},
};

const SELECT_COMPANIES: &str = "SELECT company_id, name, domain, industry, locality, region, \
	country, size, founded_year, linkedin_url, enrichment, last_enriched_at, created_at, \
	updated_at FROM companies";

pub async fn get_company(pool: &PgPool, company_id: Uuid) -> Result<Option<Company>> {
	let row: Option<Company> = sqlx::query_as(&format!("{SELECT_COMPANIES} WHERE company_id = $1"))
		.bind(company_id)
		.fetch_optional(pool)
		.await?;

	Ok(row)
}

/// One round-trip exact lookup for a batch of extracted entities: normalised
/// domains and lowercased names together.
pub async fn find_exact_candidates(
	pool: &PgPool,
	domains: &[String],
	names: &[String],
) -> Result<Vec<Company>> {
	if domains.is_empty() && names.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<Company> = sqlx::query_as(&format!(
		"{SELECT_COMPANIES} WHERE lower(coalesce(domain, '')) = ANY($1) OR lower(name) = ANY($2)"
	))
	.bind(domains)
	.bind(names)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// Coarse pre-filter for fuzzy matching: companies sharing an industry or a
/// location term (matched against locality, region, and country) with the
/// entity, capped at `limit`. Entities with neither facet get no candidates
/// rather than a full table scan.
pub async fn candidate_companies(
	pool: &PgPool,
	industry: Option<&str>,
	location_terms: &[String],
	limit: u32,
) -> Result<Vec<Company>> {
	let industry = industry.map(str::trim).filter(|value| !value.is_empty());
	let location_terms: Vec<&str> = location_terms
		.iter()
		.map(|term| term.trim())
		.filter(|term| !term.is_empty())
		.collect();

	if industry.is_none() && location_terms.is_empty() {
		return Ok(Vec::new());
	}

	let mut builder = QueryBuilder::<Postgres>::new(SELECT_COMPANIES);
	let mut first = true;

	builder.push(" WHERE ");

	if let Some(industry) = industry {
		builder.push("industry ILIKE ");
		builder.push_bind(format!("%{}%", escape_like(industry)));

		first = false;
	}

	for term in location_terms {
		if !first {
			builder.push(" OR ");
		}

		let pattern = format!("%{}%", escape_like(term));

		builder.push("(locality ILIKE ");
		builder.push_bind(pattern.clone());
		builder.push(" OR region ILIKE ");
		builder.push_bind(pattern.clone());
		builder.push(" OR country ILIKE ");
		builder.push_bind(pattern);
		builder.push(")");

		first = false;
	}

	builder.push(" ORDER BY updated_at DESC, company_id ASC LIMIT ");
	builder.push_bind(limit.max(1) as i64);

	let rows: Vec<Company> = builder.build_query_as().fetch_all(pool).await?;

	Ok(rows)
}

pub async fn embeddings_for(
	pool: &PgPool,
	company_ids: &[Uuid],
	embedding_version: &str,
) -> Result<Vec<CompanyEmbedding>> {
	if company_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<CompanyEmbedding> = sqlx::query_as(
		"SELECT company_id, embedding_version, embedding_dim, vec, created_at \
		 FROM company_embeddings WHERE company_id = ANY($1) AND embedding_version = $2",
	)
	.bind(company_ids)
	.bind(embedding_version)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn upsert_embedding(
	pool: &PgPool,
	company_id: Uuid,
	embedding_version: &str,
	vec: &[f32],
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"INSERT INTO company_embeddings (company_id, embedding_version, embedding_dim, vec, created_at) \
		 VALUES ($1, $2, $3, $4, $5) \
		 ON CONFLICT (company_id, embedding_version) \
		 DO UPDATE SET embedding_dim = EXCLUDED.embedding_dim, vec = EXCLUDED.vec, \
		 created_at = EXCLUDED.created_at",
	)
	.bind(company_id)
	.bind(embedding_version)
	.bind(vec.len() as i32)
	.bind(vec)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn insert_company(pool: &PgPool, company: NewCompany) -> Result<Company> {
	if company.name.trim().is_empty() {
		return Err(Error::InvalidArgument("Company name must be non-empty.".to_string()));
	}

	let now = OffsetDateTime::now_utc();
	let domain = company.domain.as_deref().and_then(normalize_domain);
	let row: Company = sqlx::query_as(
		"INSERT INTO companies (company_id, name, domain, industry, locality, region, country, \
		 size, founded_year, linkedin_url, enrichment, last_enriched_at, created_at, updated_at) \
		 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,NULL,$12,$12) \
		 RETURNING company_id, name, domain, industry, locality, region, country, size, \
		 founded_year, linkedin_url, enrichment, last_enriched_at, created_at, updated_at",
	)
	.bind(Uuid::new_v4())
	.bind(company.name.trim())
	.bind(domain)
	.bind(company.industry)
	.bind(company.locality)
	.bind(company.region)
	.bind(company.country)
	.bind(company.size)
	.bind(company.founded_year)
	.bind(company.linkedin_url)
	.bind(company.enrichment)
	.bind(now)
	.fetch_one(pool)
	.await?;

	Ok(row)
}

/// The enrichment write path: appends web-derived text to a company and
/// stamps `last_enriched_at`. Pipeline reads never mutate rows; this is the
/// only write issued on behalf of a search request.
pub async fn update_enrichment(
	pool: &PgPool,
	company_id: Uuid,
	enrichment: &str,
	now: OffsetDateTime,
) -> Result<()> {
	let result = sqlx::query(
		"UPDATE companies SET enrichment = $2, last_enriched_at = $3, updated_at = $3 \
		 WHERE company_id = $1",
	)
	.bind(company_id)
	.bind(enrichment)
	.bind(now)
	.execute(pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Company {company_id} does not exist.")));
	}

	Ok(())
}
