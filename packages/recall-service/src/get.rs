use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, RecallService, Result};
use recall_storage::{models::Memory, queries};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetRequest {
	pub memory_id: i64,
	#[serde(default)]
	pub user_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetResponse {
	pub success: bool,
	pub memory: MemoryView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryView {
	pub id: i64,
	pub user_id: i64,
	pub content: String,
	pub source: String,
	pub category: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub source_timestamp: Option<OffsetDateTime>,
	pub original_post_id: Option<String>,
	pub original_url: Option<String>,
	pub attributes: Value,
	pub vector_id: Option<Uuid>,
}
impl From<Memory> for MemoryView {
	fn from(memory: Memory) -> Self {
		Self {
			id: memory.id,
			user_id: memory.user_id,
			content: memory.content,
			source: memory.source,
			category: memory.category,
			created_at: memory.created_at,
			source_timestamp: memory.source_timestamp,
			original_post_id: memory.original_post_id,
			original_url: memory.original_url,
			attributes: memory.attributes,
			vector_id: memory.vector_id,
		}
	}
}

impl RecallService {
	pub async fn get(&self, req: GetRequest) -> Result<GetResponse> {
		let memory = queries::get_memory(&self.db.pool, req.memory_id, req.user_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Memory not found.".to_string() })?;

		Ok(GetResponse { success: true, memory: memory.into() })
	}
}
