use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, IndexEntry, RecallService, Result};
use recall_storage::{models::NewMemory, queries};

pub const DEFAULT_CATEGORY: &str = "general";

const PREVIEW_CHARS: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateRequest {
	pub user_id: i64,
	pub content: String,
	pub source: String,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub attributes: Option<Value>,
	#[serde(default)]
	pub original_post_id: Option<String>,
	#[serde(default)]
	pub original_url: Option<String>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub source_timestamp: Option<OffsetDateTime>,
	#[serde(default = "default_generate_embedding")]
	pub generate_embedding: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateResponse {
	pub success: bool,
	pub memory_id: i64,
	pub vector_id: Option<Uuid>,
	pub embedding_generated: bool,
	pub content_preview: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub embedding_error: Option<String>,
}

impl RecallService {
	/// Stores a memory, mirroring it into the vector index when asked.
	///
	/// The index write happens first and may fail without affecting the result; the row insert
	/// is the only step whose failure is returned.
	pub async fn create(&self, req: CreateRequest) -> Result<CreateResponse> {
		let generate_embedding = req.generate_embedding;
		let mut memory = new_memory(req)?;
		let indexed = if generate_embedding {
			Some(self.index_memory(&memory).await)
		} else {
			None
		};
		let embedding_error = match indexed {
			Some(Ok(vector_id)) => {
				memory.vector_id = Some(vector_id);

				None
			},
			Some(Err(err)) => {
				tracing::warn!(
					error = %err,
					user_id = memory.user_id,
					"Storing memory without an index entry."
				);

				Some(err.to_string())
			},
			None => None,
		};
		let stored = match queries::insert_memory(&self.db.pool, &memory).await {
			Ok(stored) => stored,
			Err(err) => {
				if let Some(vector_id) = memory.vector_id {
					self.discard_vector(vector_id).await;
				}

				return Err(err.into());
			},
		};

		tracing::info!(
			memory_id = stored.id,
			user_id = stored.user_id,
			embedded = stored.vector_id.is_some(),
			"Memory created."
		);

		Ok(CreateResponse {
			success: true,
			memory_id: stored.id,
			vector_id: stored.vector_id,
			embedding_generated: stored.vector_id.is_some(),
			content_preview: crate::preview(&stored.content, PREVIEW_CHARS),
			embedding_error,
		})
	}

	async fn index_memory(&self, memory: &NewMemory) -> Result<Uuid> {
		self.require_credentials()?;
		self.ensure_collection().await?;

		let vector = self.embed_text(&memory.content).await?;
		let vector_id = Uuid::new_v4();
		let attributes = index_attributes(
			memory.user_id,
			&memory.content,
			&memory.source,
			&memory.category,
			memory.original_post_id.as_deref(),
			memory.original_url.as_deref(),
		);

		let entry = IndexEntry { id: vector_id, vector, attributes };

		self.index.upsert(self.collection(), entry).await?;

		Ok(vector_id)
	}
}

/// Attributes denormalized onto an index entry so search never reads the record store.
pub(crate) fn index_attributes(
	user_id: i64,
	content: &str,
	source: &str,
	category: &str,
	original_post_id: Option<&str>,
	original_url: Option<&str>,
) -> Map<String, Value> {
	let mut attributes = Map::new();

	attributes.insert("user_id".to_string(), Value::from(user_id));
	attributes.insert("content".to_string(), Value::from(content));
	attributes.insert("source".to_string(), Value::from(source));
	attributes.insert("category".to_string(), Value::from(category));
	attributes.insert("original_post_id".to_string(), Value::from(original_post_id));
	attributes.insert("original_url".to_string(), Value::from(original_url));

	attributes
}

fn default_generate_embedding() -> bool {
	true
}

fn new_memory(req: CreateRequest) -> Result<NewMemory> {
	if req.content.trim().is_empty() {
		return Err(Error::invalid("content must be non-empty."));
	}

	let source = req.source.trim();

	if source.is_empty() {
		return Err(Error::invalid("source must be non-empty."));
	}

	let attributes = match req.attributes {
		None | Some(Value::Null) => Value::Object(Map::new()),
		Some(Value::Object(map)) => Value::Object(map),
		Some(_) => return Err(Error::invalid("attributes must be a JSON object.")),
	};
	let category = req
		.category
		.map(|category| category.trim().to_string())
		.filter(|category| !category.is_empty())
		.unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

	Ok(NewMemory {
		user_id: req.user_id,
		content: req.content,
		source: source.to_string(),
		category,
		attributes,
		original_post_id: non_blank(req.original_post_id),
		original_url: non_blank(req.original_url),
		vector_id: None,
		source_timestamp: req.source_timestamp,
	})
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.trim().is_empty())
}
