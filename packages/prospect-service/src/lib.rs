pub mod cache;
pub mod company;
pub mod db_search;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod parse;
pub mod rate_limit;
pub mod time_serde;
pub mod unified;
pub mod web_search;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use prospect_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use prospect_providers::{RetryPolicy, chat, embedding};
use prospect_storage::db::Db;

pub use cache::StageCaches;
pub use company::{
	CompanyGetRequest, CompanyItem, CompanyListRequest, CompanyListResponse, Pagination,
};
pub use error::{ServiceError, ServiceResult};
pub use extract::{ExtractionMeta, ExtractionResponse};
pub use matcher::{
	CompanyMatch, MatchField, MatchOptions, MatchResponse, MatchResult, MatchType, MatcherMeta,
};
pub use rate_limit::RateLimiter;
pub use unified::{
	MatchSummary, RankedCompany, SearchMeta, SearchOptions, Sources, Stage, UnifiedSearchRequest,
	UnifiedSearchResponse,
};
pub use web_search::WebSearchResponse;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A chat-completion endpoint that answers with a JSON object. The query
/// parser, web search, and entity extractor all speak this shape, each with
/// its own provider config.
pub trait ChatCompletionProvider
where
	Self: Send + Sync,
{
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, prospect_providers::Result<Value>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, prospect_providers::Result<Vec<Vec<f32>>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub parser: Arc<dyn ChatCompletionProvider>,
	pub web_search: Arc<dyn ChatCompletionProvider>,
	pub extractor: Arc<dyn ChatCompletionProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(
		parser: Arc<dyn ChatCompletionProvider>,
		web_search: Arc<dyn ChatCompletionProvider>,
		extractor: Arc<dyn ChatCompletionProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { parser, web_search, extractor, embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			parser: provider.clone(),
			web_search: provider.clone(),
			extractor: provider.clone(),
			embedding: provider,
		}
	}
}

pub struct ProspectService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
	pub caches: StageCaches,
	pub limiter: RateLimiter,
	pub(crate) retry: RetryPolicy,
}
impl ProspectService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, db, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		let caches = StageCaches::new(&cfg.cache);
		let limiter = RateLimiter::new(&cfg.search.rate_limit);
		let retry = RetryPolicy::from_config(&cfg.retry);

		Self { cfg, db, providers, caches, limiter, retry }
	}
}

struct DefaultProviders;
impl ChatCompletionProvider for DefaultProviders {
	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, prospect_providers::Result<Value>> {
		Box::pin(chat::complete_json(cfg, messages))
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, prospect_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

pub(crate) fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.providers.embedding.dimensions
	)
}
