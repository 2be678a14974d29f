mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, EmbeddingProviderKind, PLACEHOLDER_KEY_PREFIX, Postgres,
	Providers, Qdrant, Service, Storage,
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
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
		("providers.embedding.api_base", &cfg.providers.embedding.api_base),
		("providers.embedding.model", &cfg.providers.embedding.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::validation(format!("{label} must be non-empty.")));
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::validation(
			"storage.postgres.pool_max_conns must be greater than zero.",
		));
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::validation("providers.embedding.timeout_ms must be greater than zero."));
	}

	if let Some(dimensions) = cfg.providers.embedding.dimensions
		&& dimensions == 0
	{
		return Err(Error::validation("providers.embedding.dimensions must be greater than zero."));
	}

	for (name, value) in &cfg.providers.embedding.default_headers {
		if !value.is_string() {
			return Err(Error::validation(format!(
				"providers.embedding.default_headers.{name} must be a string."
			)));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg
		.providers
		.embedding
		.api_key
		.as_deref()
		.map(|key| key.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.embedding.api_key = None;
	}
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = types::default_log_level();
	}
}
