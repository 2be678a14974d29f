use std::sync::Arc;

use uuid::Uuid;

use super::{create_request, harness_with};
use crate::common::{StubEmbedding, VECTOR_DIM};
use recall_service::{DeleteRequest, IndexFilter, SearchRequest, VectorIndex};
use recall_storage::qdrant::QdrantStore;

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RECALL_PG_DSN and RECALL_QDRANT_URL to run."]
async fn qdrant_index_round_trips_through_the_engine() {
	let Some(qdrant_url) = recall_testkit::env_qdrant_url() else {
		eprintln!("Skipping qdrant_index_round_trips_through_the_engine; set RECALL_QDRANT_URL.");

		return;
	};
	let store = QdrantStore::new(&recall_config::Qdrant {
		url: qdrant_url.clone(),
		collection: String::new(),
		api_key: None,
	})
	.expect("Failed to build Qdrant client.");
	let Some(h) = harness_with(Arc::new(store), Arc::new(StubEmbedding::new()), qdrant_url).await
	else {
		eprintln!("Skipping qdrant_index_round_trips_through_the_engine; set RECALL_PG_DSN.");

		return;
	};
	let collection = h.service.cfg.storage.qdrant.collection.clone();
	let index = h.service.index.clone();

	index.ensure_collection(&collection, VECTOR_DIM).await.expect("First bootstrap failed.");
	index.ensure_collection(&collection, VECTOR_DIM).await.expect("Second bootstrap failed.");

	let stray = Uuid::new_v4();

	assert!(index.existing(&collection, &[stray]).await.expect("Lookup failed.").is_empty());

	index.delete(&collection, stray).await.expect("Deleting a missing entry failed.");

	let created = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");
	let vector_id = created.vector_id.expect("Expected an index entry.");
	let found = h
		.service
		.search(SearchRequest {
			query: "beverages".to_string(),
			user_id: Some(h.user_id),
			source: Some("manual".to_string()),
			limit: Some(5),
		})
		.await
		.expect("Search failed.");

	assert_eq!(found.count, 1);
	assert_eq!(found.results[0].id, vector_id);
	assert_eq!(found.results[0].content, "I like tea");

	let other_user = IndexFilter { user_id: Some(h.user_id + 1), source: None };
	let foreign = index
		.search(&collection, vec![1.0; VECTOR_DIM as usize], &other_user, 5)
		.await
		.expect("Filtered search failed.");

	assert!(foreign.is_empty());

	let deleted = h
		.service
		.delete(DeleteRequest { memory_id: created.memory_id, user_id: h.user_id })
		.await
		.expect("Delete failed.");

	assert!(deleted.vector_deleted);
	assert!(index.existing(&collection, &[vector_id]).await.expect("Lookup failed.").is_empty());

	h.cleanup().await;
}
