use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	pub cache: Cache,
	pub matching: Matching,
	pub ranking: Ranking,
	pub retry: Retry,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm_parser: LlmProviderConfig,
	pub llm_search: LlmProviderConfig,
	pub llm_extractor: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_search_limit")]
	pub default_limit: u32,
	#[serde(default = "default_max_limit")]
	pub max_limit: u32,
	pub db_timeout_ms: u64,
	pub rate_limit: RateLimit,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
	pub max_calls: u32,
	pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	#[serde(default = "default_cache_entries")]
	pub max_entries: u64,
	pub web_search_ttl_secs: u64,
	pub extraction_ttl_secs: u64,
	pub unified_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Matching {
	#[serde(default = "default_similarity_threshold")]
	pub similarity_threshold: f32,
	#[serde(default = "default_max_matches")]
	pub max_matches: u32,
	pub embedding_batch_size: u32,
	pub candidate_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub web_discovered_bonus: f32,
	pub enriched_bonus: f32,
	pub industry_weight: f32,
	pub term_overlap_weight: f32,
	pub locality_weight: f32,
	pub region_weight: f32,
	pub country_weight: f32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			web_discovered_bonus: 20.0,
			enriched_bonus: 10.0,
			industry_weight: 15.0,
			term_overlap_weight: 5.0,
			locality_weight: 8.0,
			region_weight: 5.0,
			country_weight: 3.0,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}

fn default_search_limit() -> u32 {
	10
}

fn default_max_limit() -> u32 {
	50
}

fn default_cache_entries() -> u64 {
	1_024
}

fn default_similarity_threshold() -> f32 {
	0.70
}

fn default_max_matches() -> u32 {
	3
}
