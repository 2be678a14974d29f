use serde::Deserialize;
use serde_json::{Map, Value};

/// API keys starting with this prefix are template placeholders, not credentials.
pub const PLACEHOLDER_KEY_PREFIX: &str = "your-";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	#[serde(default)]
	pub api_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EmbeddingProviderKind {
	#[serde(rename = "openai")]
	OpenAi,
	#[serde(rename = "cohere")]
	Cohere,
}
impl EmbeddingProviderKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::OpenAi => "openai",
			Self::Cohere => "cohere",
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: EmbeddingProviderKind,
	pub api_base: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	/// Optional. Inferred from `provider_id` and `model` when absent.
	#[serde(default)]
	pub dimensions: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl EmbeddingProviderConfig {
	/// Returns the key only when it looks like a real credential.
	pub fn usable_api_key(&self) -> Option<&str> {
		self.api_key
			.as_deref()
			.map(str::trim)
			.filter(|key| !key.is_empty() && !key.starts_with(PLACEHOLDER_KEY_PREFIX))
	}

	pub fn has_usable_credentials(&self) -> bool {
		self.usable_api_key().is_some()
	}
}

pub(crate) fn default_log_level() -> String {
	"info".to_string()
}
