use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Company {
	pub company_id: Uuid,
	pub name: String,
	pub domain: Option<String>,
	pub industry: Option<String>,
	pub locality: Option<String>,
	pub region: Option<String>,
	pub country: Option<String>,
	pub size: Option<String>,
	pub founded_year: Option<i32>,
	pub linkedin_url: Option<String>,
	pub enrichment: Option<String>,
	pub last_enriched_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanyEmbedding {
	pub company_id: Uuid,
	pub embedding_version: String,
	pub embedding_dim: i32,
	pub vec: Vec<f32>,
	pub created_at: OffsetDateTime,
}

/// Insert payload for a company row. `created_at`/`updated_at` are stamped by
/// the query layer.
#[derive(Debug, Clone, Default)]
pub struct NewCompany {
	pub name: String,
	pub domain: Option<String>,
	pub industry: Option<String>,
	pub locality: Option<String>,
	pub region: Option<String>,
	pub country: Option<String>,
	pub size: Option<String>,
	pub founded_year: Option<i32>,
	pub linkedin_url: Option<String>,
	pub enrichment: Option<String>,
}
