use std::sync::Arc;

use super::{create_request, harness};
use crate::common::{MemoryIndex, StubEmbedding};
use recall_service::{BackfillRequest, Error, GetRequest, ReconcileRequest};

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn reconcile_clears_dangling_vector_ids() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping reconcile_clears_dangling_vector_ids; set RECALL_PG_DSN.");

		return;
	};
	let kept = h
		.service
		.create(create_request(h.user_id, "Kept", true))
		.await
		.expect("Create failed.");
	let lost = h
		.service
		.create(create_request(h.user_id, "Lost", true))
		.await
		.expect("Create failed.");

	index.remove(lost.vector_id.expect("Expected an index entry."));

	// Batch size 1 forces the sweep across several pages.
	let report = h
		.service
		.reconcile_vectors(ReconcileRequest { batch_size: Some(1) })
		.await
		.expect("Reconcile failed.");

	assert_eq!(report.checked_count, 2);
	assert_eq!(report.cleared_count, 1);

	let lost_row = h
		.service
		.get(GetRequest { memory_id: lost.memory_id, user_id: None })
		.await
		.expect("Get failed.");
	let kept_row = h
		.service
		.get(GetRequest { memory_id: kept.memory_id, user_id: None })
		.await
		.expect("Get failed.");

	assert!(lost_row.memory.vector_id.is_none());
	assert_eq!(kept_row.memory.vector_id, kept.vector_id);

	let again = h
		.service
		.reconcile_vectors(ReconcileRequest::default())
		.await
		.expect("Reconcile failed.");

	assert_eq!(again.checked_count, 1);
	assert_eq!(again.cleared_count, 0);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn reconcile_aborts_when_the_index_is_down() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping reconcile_aborts_when_the_index_is_down; set RECALL_PG_DSN.");

		return;
	};

	h.service.create(create_request(h.user_id, "Kept", true)).await.expect("Create failed.");
	index.set_available(false);

	let result = h.service.reconcile_vectors(ReconcileRequest::default()).await;

	assert!(matches!(result, Err(Error::IndexUnavailable { .. })));

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn backfill_embeds_degraded_memories() {
	let index = Arc::new(MemoryIndex::new());
	let embedding = Arc::new(StubEmbedding::failing());
	let Some(h) = harness(index.clone(), embedding.clone()).await else {
		eprintln!("Skipping backfill_embeds_degraded_memories; set RECALL_PG_DSN.");

		return;
	};
	let degraded = h
		.service
		.create(create_request(h.user_id, "Stored during an outage", true))
		.await
		.expect("Create failed.");

	assert!(degraded.vector_id.is_none());

	embedding.fail.store(false, std::sync::atomic::Ordering::SeqCst);

	let report = h
		.service
		.backfill_embeddings(BackfillRequest { user_id: Some(h.user_id), limit: None })
		.await
		.expect("Backfill failed.");

	assert_eq!(report.embedded_count, 1);
	assert_eq!(report.error_count, 0);

	let memory = h
		.service
		.get(GetRequest { memory_id: degraded.memory_id, user_id: Some(h.user_id) })
		.await
		.expect("Get failed.")
		.memory;
	let vector_id = memory.vector_id.expect("Backfill did not attach a vector id.");

	assert!(index.contains(vector_id));
	assert_eq!(index.len(), 1);

	let idle = h
		.service
		.backfill_embeddings(BackfillRequest::default())
		.await
		.expect("Backfill failed.");

	assert_eq!(idle.embedded_count, 0);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn backfill_counts_per_row_failures() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping backfill_counts_per_row_failures; set RECALL_PG_DSN.");

		return;
	};

	for content in ["one", "two"] {
		h.service.create(create_request(h.user_id, content, false)).await.expect("Create failed.");
	}

	h.service.ensure_collection().await.expect("Bootstrap failed.");
	index.set_available(false);

	let report = h
		.service
		.backfill_embeddings(BackfillRequest::default())
		.await
		.expect("Backfill failed.");

	assert_eq!(report.embedded_count, 0);
	assert_eq!(report.error_count, 2);

	h.cleanup().await;
}
