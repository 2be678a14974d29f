use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored memory row. `vector_id` is `None` when no index entry exists.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Memory {
	pub id: i64,
	pub user_id: i64,
	pub content: String,
	pub source: String,
	pub category: String,
	pub attributes: Value,
	pub original_post_id: Option<String>,
	pub original_url: Option<String>,
	pub vector_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub source_timestamp: Option<OffsetDateTime>,
}

/// Insert payload; `id` and `created_at` are assigned by Postgres.
#[derive(Debug, Clone)]
pub struct NewMemory {
	pub user_id: i64,
	pub content: String,
	pub source: String,
	pub category: String,
	pub attributes: Value,
	pub original_post_id: Option<String>,
	pub original_url: Option<String>,
	pub vector_id: Option<Uuid>,
	/// Falls back to the insertion time when `None`.
	pub source_timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct VectorRef {
	pub id: i64,
	pub vector_id: Uuid,
}
