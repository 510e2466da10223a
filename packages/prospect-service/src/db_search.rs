use std::time::Duration;

use prospect_domain::StructuredQuery;
use prospect_storage::{
	filter::{CompanyFilter, SortSpec},
	page::{CompanyPage, PageRequest, page},
};

use crate::{ProspectService, ServiceError, ServiceResult};

impl ProspectService {
	/// Filtered, cursor-paginated lookup against the primary store, bounded
	/// by `search.db_timeout_ms`. A timeout is a stage failure, not a process
	/// fatal error.
	pub async fn db_search(
		&self,
		query: &StructuredQuery,
		sort: &SortSpec,
		page_req: &PageRequest,
	) -> ServiceResult<CompanyPage> {
		let filter = CompanyFilter::from_query(query);
		let budget = Duration::from_millis(self.cfg.search.db_timeout_ms);

		match tokio::time::timeout(budget, page(&self.db.pool, &filter, sort, page_req)).await {
			Ok(result) => Ok(result?),
			Err(_) => Err(ServiceError::Timeout {
				message: format!(
					"Database query exceeded {} ms.",
					self.cfg.search.db_timeout_ms
				),
			}),
		}
	}
}
