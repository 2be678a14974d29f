use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, IndexFilter, IndexHit, RecallService, Result};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub user_id: Option<i64>,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchItem {
	/// Index entry id, not the memory id.
	pub id: Uuid,
	pub score: f32,
	pub content: String,
	pub source: String,
	pub category: String,
	pub original_url: Option<String>,
}
impl From<IndexHit> for SearchItem {
	fn from(hit: IndexHit) -> Self {
		let attributes = hit.attributes;

		Self {
			id: hit.id,
			score: hit.score,
			content: text_attribute(&attributes, "content").unwrap_or_default(),
			source: text_attribute(&attributes, "source").unwrap_or_default(),
			category: text_attribute(&attributes, "category").unwrap_or_default(),
			original_url: text_attribute(&attributes, "original_url"),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
	pub success: bool,
	pub query: String,
	pub count: usize,
	pub results: Vec<SearchItem>,
}

impl RecallService {
	/// Nearest index entries for `query`, in the order the index ranks them.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid("query must be non-empty."));
		}

		let limit = req.limit.unwrap_or(DEFAULT_LIMIT);

		if !(1..=MAX_LIMIT).contains(&limit) {
			return Err(Error::invalid(format!("limit must be between 1 and {MAX_LIMIT}.")));
		}

		self.require_credentials()?;
		self.ensure_collection().await.map_err(|err| match err {
			unavailable @ Error::IndexUnavailable { .. } => unavailable,
			other => Error::IndexUnavailable { message: other.to_string() },
		})?;

		let vector = self.embed_text(query).await?;
		let filter = IndexFilter {
			user_id: req.user_id,
			source: req.source.map(|source| source.trim().to_string()).filter(|s| !s.is_empty()),
		};
		let hits = self.index.search(self.collection(), vector, &filter, u64::from(limit)).await?;
		let results = hits.into_iter().map(SearchItem::from).collect::<Vec<_>>();

		tracing::debug!(count = results.len(), user_id = ?filter.user_id, "Search completed.");

		Ok(SearchResponse { success: true, query: req.query, count: results.len(), results })
	}
}

fn text_attribute(attributes: &Map<String, Value>, key: &str) -> Option<String> {
	attributes.get(key).and_then(Value::as_str).map(str::to_string)
}
