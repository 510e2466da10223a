mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, EmbeddingProviderConfig, LlmProviderConfig, Matching, Postgres, Providers,
	Ranking, RateLimit, Retry, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	for (label, timeout_ms) in [
		("embedding", cfg.providers.embedding.timeout_ms),
		("llm_parser", cfg.providers.llm_parser.timeout_ms),
		("llm_search", cfg.providers.llm_search.timeout_ms),
		("llm_extractor", cfg.providers.llm_extractor.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
	}

	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_limit < cfg.search.default_limit {
		return Err(Error::Validation {
			message: "search.max_limit must be at least search.default_limit.".to_string(),
		});
	}
	if cfg.search.db_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.db_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.rate_limit.max_calls == 0 {
		return Err(Error::Validation {
			message: "search.rate_limit.max_calls must be greater than zero.".to_string(),
		});
	}
	if cfg.search.rate_limit.window_secs == 0 {
		return Err(Error::Validation {
			message: "search.rate_limit.window_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.max_entries == 0 {
		return Err(Error::Validation {
			message: "cache.max_entries must be greater than zero.".to_string(),
		});
	}

	for (label, ttl_secs) in [
		("cache.web_search_ttl_secs", cfg.cache.web_search_ttl_secs),
		("cache.extraction_ttl_secs", cfg.cache.extraction_ttl_secs),
		("cache.unified_ttl_secs", cfg.cache.unified_ttl_secs),
	] {
		if ttl_secs == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	// Raw web content churns faster than the entities derived from it.
	if cfg.cache.web_search_ttl_secs >= cfg.cache.extraction_ttl_secs {
		return Err(Error::Validation {
			message: "cache.web_search_ttl_secs must be less than cache.extraction_ttl_secs."
				.to_string(),
		});
	}

	if !cfg.matching.similarity_threshold.is_finite() {
		return Err(Error::Validation {
			message: "matching.similarity_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.matching.similarity_threshold) {
		return Err(Error::Validation {
			message: "matching.similarity_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.matching.max_matches == 0 {
		return Err(Error::Validation {
			message: "matching.max_matches must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.embedding_batch_size == 0 {
		return Err(Error::Validation {
			message: "matching.embedding_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "matching.candidate_limit must be greater than zero.".to_string(),
		});
	}

	for (label, weight) in [
		("ranking.web_discovered_bonus", cfg.ranking.web_discovered_bonus),
		("ranking.enriched_bonus", cfg.ranking.enriched_bonus),
		("ranking.industry_weight", cfg.ranking.industry_weight),
		("ranking.term_overlap_weight", cfg.ranking.term_overlap_weight),
		("ranking.locality_weight", cfg.ranking.locality_weight),
		("ranking.region_weight", cfg.ranking.region_weight),
		("ranking.country_weight", cfg.ranking.country_weight),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be zero or greater."),
			});
		}
	}

	if cfg.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.base_delay_ms == 0 {
		return Err(Error::Validation {
			message: "retry.base_delay_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.max_delay_ms < cfg.retry.base_delay_ms {
		return Err(Error::Validation {
			message: "retry.max_delay_ms must be at least retry.base_delay_ms.".to_string(),
		});
	}

	Ok(())
}

// Provider api_key is allowed to stay empty: a missing credential surfaces at the
// stage level as NotConfigured instead of failing config load.
fn normalize(cfg: &mut Config) {
	for provider in [
		&mut cfg.providers.llm_parser,
		&mut cfg.providers.llm_search,
		&mut cfg.providers.llm_extractor,
	] {
		provider.api_base = provider.api_base.trim_end_matches('/').to_string();
	}

	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
}
