use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, RecallService, Result};
use recall_storage::{models::Memory, queries};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;
const PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListRequest {
	pub user_id: i64,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub limit: Option<i64>,
	#[serde(default)]
	pub offset: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListItem {
	pub id: i64,
	pub content: String,
	pub source: String,
	pub category: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl From<Memory> for ListItem {
	fn from(memory: Memory) -> Self {
		Self {
			id: memory.id,
			content: crate::preview(&memory.content, PREVIEW_CHARS),
			source: memory.source,
			category: memory.category,
			created_at: memory.created_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListResponse {
	pub success: bool,
	/// Matching rows before pagination.
	pub total: i64,
	pub count: usize,
	pub memories: Vec<ListItem>,
}

impl RecallService {
	pub async fn list(&self, req: ListRequest) -> Result<ListResponse> {
		let (limit, offset) = page(req.limit, req.offset)?;
		let source = req.source.as_deref().map(str::trim).filter(|source| !source.is_empty());
		let total = queries::count_memories(&self.db.pool, req.user_id, source).await?;
		let rows =
			queries::list_memories(&self.db.pool, req.user_id, source, limit, offset).await?;
		let memories = rows.into_iter().map(ListItem::from).collect::<Vec<_>>();

		Ok(ListResponse { success: true, total, count: memories.len(), memories })
	}
}

fn page(limit: Option<i64>, offset: Option<i64>) -> Result<(i64, i64)> {
	let limit = limit.unwrap_or(DEFAULT_LIMIT);
	let offset = offset.unwrap_or(0);

	if !(1..=MAX_LIMIT).contains(&limit) {
		return Err(Error::invalid(format!("limit must be between 1 and {MAX_LIMIT}.")));
	}
	if offset < 0 {
		return Err(Error::invalid("offset must be zero or greater."));
	}

	Ok((limit, offset))
}
