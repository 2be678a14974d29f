use serde::{Deserialize, Serialize};

use crate::{Error, RecallService, Result};
use recall_storage::queries;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
	pub memory_id: i64,
	pub user_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
	pub success: bool,
	pub message: String,
	pub memory_id: i64,
	pub vector_deleted: bool,
}

impl RecallService {
	/// Removes the index entry (best effort), then the row.
	///
	/// The row stays locked while the index is contacted, so a concurrent delete of the same
	/// memory waits and then reports it as missing.
	pub async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse> {
		let mut tx = self.db.pool.begin().await?;
		let memory = queries::lock_owned_memory(&mut *tx, req.memory_id, req.user_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: "Memory not found.".to_string() })?;
		let mut vector_deleted = false;

		if let Some(vector_id) = memory.vector_id {
			match self.index.delete(self.collection(), vector_id).await {
				Ok(()) => vector_deleted = true,
				Err(err) => tracing::warn!(
					error = %err,
					memory_id = memory.id,
					vector_id = %vector_id,
					"Index entry was not removed; deleting the memory anyway."
				),
			}
		}

		queries::delete_memory(&mut *tx, memory.id).await?;

		tx.commit().await?;

		tracing::info!(memory_id = memory.id, vector_deleted, "Memory deleted.");

		Ok(DeleteResponse {
			success: true,
			message: "Memory deleted.".to_string(),
			memory_id: memory.id,
			vector_deleted,
		})
	}
}
