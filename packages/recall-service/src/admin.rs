use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, IndexEntry, RecallService, Result, create};
use recall_storage::{models::Memory, queries};

const DEFAULT_RECONCILE_BATCH: i64 = 256;
const MAX_RECONCILE_BATCH: i64 = 1_000;
const DEFAULT_BACKFILL_LIMIT: i64 = 100;
const MAX_BACKFILL_LIMIT: i64 = 10_000;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReconcileRequest {
	#[serde(default)]
	pub batch_size: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
	pub checked_count: u64,
	pub cleared_count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackfillRequest {
	#[serde(default)]
	pub user_id: Option<i64>,
	#[serde(default)]
	pub limit: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
	pub embedded_count: u64,
	pub skipped_count: u64,
	pub error_count: u64,
}

enum BackfillOutcome {
	Embedded,
	Skipped,
}

impl RecallService {
	/// Clears `vector_id` on rows whose index entry no longer exists.
	pub async fn reconcile_vectors(&self, req: ReconcileRequest) -> Result<ReconcileReport> {
		let batch_size =
			bounded("batch_size", req.batch_size, DEFAULT_RECONCILE_BATCH, MAX_RECONCILE_BATCH)?;
		let mut report = ReconcileReport::default();
		let mut after_id = 0_i64;

		loop {
			let refs = queries::list_vector_refs_after(&self.db.pool, after_id, batch_size).await?;
			let Some(last) = refs.last() else {
				break;
			};

			after_id = last.id;

			let ids = refs.iter().map(|vector_ref| vector_ref.vector_id).collect::<Vec<_>>();
			let present = self
				.index
				.existing(self.collection(), &ids)
				.await?
				.into_iter()
				.collect::<HashSet<_>>();

			report.checked_count += refs.len() as u64;

			let dangling = refs.iter().filter(|candidate| !present.contains(&candidate.vector_id));

			for vector_ref in dangling {
				let cleared =
					queries::clear_vector_id(&self.db.pool, vector_ref.id, vector_ref.vector_id)
						.await?;

				if cleared {
					tracing::info!(
						memory_id = vector_ref.id,
						vector_id = %vector_ref.vector_id,
						"Cleared dangling vector reference."
					);

					report.cleared_count += 1;
				}
			}

			if (refs.len() as i64) < batch_size {
				break;
			}
		}

		Ok(report)
	}

	/// Embeds memories stored while the provider or index was unavailable, oldest first.
	pub async fn backfill_embeddings(&self, req: BackfillRequest) -> Result<BackfillReport> {
		let limit = bounded("limit", req.limit, DEFAULT_BACKFILL_LIMIT, MAX_BACKFILL_LIMIT)?;

		self.require_credentials()?;
		self.ensure_collection().await?;

		let rows = queries::list_unembedded(&self.db.pool, req.user_id, limit).await?;
		let mut report = BackfillReport::default();

		for memory in rows {
			match self.backfill_one(&memory).await {
				Ok(BackfillOutcome::Embedded) => report.embedded_count += 1,
				Ok(BackfillOutcome::Skipped) => report.skipped_count += 1,
				Err(err) => {
					tracing::warn!(
						error = %err,
						memory_id = memory.id,
						"Backfill failed for memory."
					);

					report.error_count += 1;
				},
			}
		}

		Ok(report)
	}

	async fn backfill_one(&self, memory: &Memory) -> Result<BackfillOutcome> {
		let vector = self.embed_text(&memory.content).await?;
		let vector_id = Uuid::new_v4();
		let attributes = create::index_attributes(
			memory.user_id,
			&memory.content,
			&memory.source,
			&memory.category,
			memory.original_post_id.as_deref(),
			memory.original_url.as_deref(),
		);

		let entry = IndexEntry { id: vector_id, vector, attributes };

		self.index.upsert(self.collection(), entry).await?;

		match queries::attach_vector_id(&self.db.pool, memory.id, vector_id).await {
			Ok(true) => Ok(BackfillOutcome::Embedded),
			// The row was deleted or embedded by someone else in the meantime.
			Ok(false) => {
				self.discard_vector(vector_id).await;

				Ok(BackfillOutcome::Skipped)
			},
			Err(err) => {
				self.discard_vector(vector_id).await;

				Err(err.into())
			},
		}
	}
}

fn bounded(field: &str, value: Option<i64>, default: i64, max: i64) -> Result<i64> {
	let value = value.unwrap_or(default);

	if !(1..=max).contains(&value) {
		return Err(Error::invalid(format!("{field} must be between 1 and {max}.")));
	}

	Ok(value)
}
