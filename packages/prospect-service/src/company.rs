use uuid::Uuid;

use prospect_domain::StructuredQuery;
use prospect_storage::{
	filter::{SortDirection, SortField, SortSpec},
	models::Company,
	page::PageRequest,
	queries,
};

use crate::{ProspectService, ServiceError, ServiceResult};

/// Wire form of a stored company.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompanyItem {
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
	#[serde(with = "crate::time_serde::option")]
	pub last_enriched_at: Option<time::OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub created_at: time::OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: time::OffsetDateTime,
}
impl From<Company> for CompanyItem {
	fn from(row: Company) -> Self {
		Self {
			company_id: row.company_id,
			name: row.name,
			domain: row.domain,
			industry: row.industry,
			locality: row.locality,
			region: row.region,
			country: row.country,
			size: row.size,
			founded_year: row.founded_year,
			linkedin_url: row.linkedin_url,
			enrichment: row.enrichment,
			last_enriched_at: row.last_enriched_at,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Pagination {
	pub next_cursor: Option<String>,
	pub prev_cursor: Option<String>,
	pub has_more: bool,
	pub total: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompanyGetRequest {
	pub company_id: Uuid,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CompanyListRequest {
	#[serde(default)]
	pub query: StructuredQuery,
	pub limit: Option<u32>,
	pub cursor: Option<String>,
	#[serde(default)]
	pub include_total: bool,
	pub sort_field: Option<SortField>,
	pub sort_direction: Option<SortDirection>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompanyListResponse {
	pub companies: Vec<CompanyItem>,
	pub pagination: Pagination,
}

impl ProspectService {
	pub async fn company_get(&self, req: CompanyGetRequest) -> ServiceResult<CompanyItem> {
		let row = queries::get_company(&self.db.pool, req.company_id).await?;

		row.map(CompanyItem::from).ok_or_else(|| ServiceError::NotFound {
			message: format!("Company {} does not exist.", req.company_id),
		})
	}

	/// Cursor-paginated listing over the same filter/sort/paginator stack the
	/// unified search uses for its database stage.
	pub async fn company_list(&self, req: CompanyListRequest) -> ServiceResult<CompanyListResponse> {
		let limit = req
			.limit
			.unwrap_or(self.cfg.search.default_limit)
			.clamp(1, self.cfg.search.max_limit);
		let sort = SortSpec {
			field: req.sort_field.unwrap_or(SortField::Name),
			direction: req.sort_direction.unwrap_or(SortDirection::Asc),
		};
		let page_req =
			PageRequest { limit, cursor: req.cursor, include_total: req.include_total };
		let page = self.db_search(&req.query, &sort, &page_req).await?;

		Ok(CompanyListResponse {
			companies: page.rows.into_iter().map(CompanyItem::from).collect(),
			pagination: Pagination {
				next_cursor: page.next_cursor,
				prev_cursor: page.prev_cursor,
				has_more: page.has_more,
				total: page.total,
			},
		})
	}
}
