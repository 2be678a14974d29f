use std::sync::Arc;

use serde_json::json;

use super::{create_request, harness};
use crate::common::{MemoryIndex, StubEmbedding};
use recall_service::{
	CreateRequest, DeleteRequest, Error, GetRequest, ListRequest, SearchRequest,
};
use recall_storage::queries;

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn create_is_durable_when_the_provider_fails() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::failing())).await else {
		eprintln!("Skipping create_is_durable_when_the_provider_fails; set RECALL_PG_DSN.");

		return;
	};
	let response = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");

	assert!(response.success);
	assert!(!response.embedding_generated);
	assert!(response.vector_id.is_none());
	assert!(response.embedding_error.is_some());
	assert_eq!(index.len(), 0);

	let row = queries::get_memory(&h.service.db.pool, response.memory_id, Some(h.user_id))
		.await
		.expect("Failed to load memory.")
		.expect("Memory row is missing.");

	assert!(row.vector_id.is_none());
	assert_eq!(row.content, "I like tea");

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn create_is_durable_when_the_index_is_down() {
	let index = Arc::new(MemoryIndex::new());

	index.set_available(false);

	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping create_is_durable_when_the_index_is_down; set RECALL_PG_DSN.");

		return;
	};
	let response = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");

	assert!(response.vector_id.is_none());

	let error = response.embedding_error.expect("Expected a captured index failure.");

	assert!(error.contains("Index unavailable"), "Unexpected error: {error}");

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn create_without_credentials_skips_the_provider() {
	let index = Arc::new(MemoryIndex::new());
	let embedding = Arc::new(StubEmbedding::without_credentials());
	let Some(h) = harness(index.clone(), embedding.clone()).await else {
		eprintln!("Skipping create_without_credentials_skips_the_provider; set RECALL_PG_DSN.");

		return;
	};
	let response = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");

	assert!(response.vector_id.is_none());
	assert!(response.embedding_error.is_some());
	assert_eq!(embedding.calls(), 0);
	assert_eq!(index.ensure_calls(), 0);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn create_indexes_denormalized_attributes() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping create_indexes_denormalized_attributes; set RECALL_PG_DSN.");

		return;
	};
	let mut req = create_request(h.user_id, "Reading about green tea", true);

	req.source = "twitter".to_string();
	req.category = Some("reading".to_string());
	req.original_url = Some("https://example.com/post/1".to_string());
	req.attributes = Some(json!({ "lang": "en" }));

	let response = h.service.create(req).await.expect("Create failed.");
	let vector_id = response.vector_id.expect("Expected an index entry.");
	let attributes = index.attributes(vector_id).expect("Index entry is missing.");

	assert!(response.embedding_generated);
	assert!(response.embedding_error.is_none());
	assert_eq!(attributes["user_id"], json!(h.user_id));
	assert_eq!(attributes["source"], json!("twitter"));
	assert_eq!(attributes["category"], json!("reading"));
	assert_eq!(attributes["original_url"], json!("https://example.com/post/1"));

	let memory = h
		.service
		.get(GetRequest { memory_id: response.memory_id, user_id: Some(h.user_id) })
		.await
		.expect("Get failed.")
		.memory;

	assert_eq!(memory.vector_id, Some(vector_id));
	assert_eq!(memory.attributes, json!({ "lang": "en" }));
	assert_eq!(memory.source_timestamp, Some(memory.created_at));

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn failed_insert_removes_the_new_index_entry() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping failed_insert_removes_the_new_index_entry; set RECALL_PG_DSN.");

		return;
	};
	// No such user, so the insert violates the foreign key after the index write.
	let result = h.service.create(create_request(h.user_id + 1_000, "I like tea", true)).await;

	assert!(matches!(result, Err(Error::Storage { .. })));
	assert_eq!(index.len(), 0);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn tea_scenario_round_trips() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping tea_scenario_round_trips; set RECALL_PG_DSN.");

		return;
	};
	let created = h
		.service
		.create(create_request(h.user_id, "I like tea", false))
		.await
		.expect("Create failed.");

	assert!(created.success);
	assert!(created.vector_id.is_none());
	assert!(!created.embedding_generated);
	assert_eq!(created.content_preview, "I like tea");

	let found = h
		.service
		.search(SearchRequest {
			query: "beverages".to_string(),
			user_id: Some(h.user_id),
			source: None,
			limit: None,
		})
		.await
		.expect("Search failed.");

	assert_eq!(found.count, 0);

	let listed = h
		.service
		.list(ListRequest { user_id: h.user_id, source: None, limit: None, offset: None })
		.await
		.expect("List failed.");

	assert_eq!(listed.total, 1);
	assert_eq!(listed.count, 1);
	assert_eq!(listed.memories[0].id, created.memory_id);
	assert_eq!(listed.memories[0].category, "general");

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn memories_are_isolated_by_owner() {
	let Some(h) = harness(Arc::new(MemoryIndex::new()), Arc::new(StubEmbedding::new())).await
	else {
		eprintln!("Skipping memories_are_isolated_by_owner; set RECALL_PG_DSN.");

		return;
	};
	let other_user = h.test_db.seed_user().await.expect("Failed to seed.");
	let created = h
		.service
		.create(create_request(h.user_id, "Private note", false))
		.await
		.expect("Create failed.");
	let foreign = h
		.service
		.get(GetRequest { memory_id: created.memory_id, user_id: Some(other_user) })
		.await;

	assert!(matches!(foreign, Err(Error::NotFound { .. })));

	let unscoped = h
		.service
		.get(GetRequest { memory_id: created.memory_id, user_id: None })
		.await
		.expect("Unscoped get failed.");

	assert_eq!(unscoped.memory.user_id, h.user_id);

	let foreign_delete = h
		.service
		.delete(DeleteRequest { memory_id: created.memory_id, user_id: other_user })
		.await;

	assert!(matches!(foreign_delete, Err(Error::NotFound { .. })));

	let listed = h
		.service
		.list(ListRequest { user_id: other_user, source: None, limit: None, offset: None })
		.await
		.expect("List failed.");

	assert_eq!(listed.total, 0);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn list_pages_newest_first_with_previews() {
	let Some(h) = harness(Arc::new(MemoryIndex::new()), Arc::new(StubEmbedding::new())).await
	else {
		eprintln!("Skipping list_pages_newest_first_with_previews; set RECALL_PG_DSN.");

		return;
	};
	let long = "x".repeat(250);
	let mut ids = Vec::new();

	for content in ["first", "second", long.as_str()] {
		let mut req: CreateRequest = create_request(h.user_id, content, false);

		if content == "second" {
			req.source = "twitter".to_string();
		}

		ids.push(h.service.create(req).await.expect("Create failed.").memory_id);
	}

	let page = h
		.service
		.list(ListRequest { user_id: h.user_id, source: None, limit: Some(2), offset: Some(0) })
		.await
		.expect("List failed.");

	assert_eq!(page.total, 3);
	assert_eq!(page.count, 2);
	assert_eq!(page.memories[0].id, ids[2]);
	assert_eq!(page.memories[0].content, format!("{}...", "x".repeat(200)));
	assert_eq!(page.memories[1].id, ids[1]);

	let rest = h
		.service
		.list(ListRequest { user_id: h.user_id, source: None, limit: Some(2), offset: Some(2) })
		.await
		.expect("List failed.");

	assert_eq!(rest.count, 1);
	assert_eq!(rest.memories[0].id, ids[0]);

	let twitter = h
		.service
		.list(ListRequest {
			user_id: h.user_id,
			source: Some("twitter".to_string()),
			limit: None,
			offset: None,
		})
		.await
		.expect("List failed.");

	assert_eq!(twitter.total, 1);
	assert_eq!(twitter.memories[0].id, ids[1]);

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn delete_succeeds_after_out_of_band_vector_loss() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping delete_succeeds_after_out_of_band_vector_loss; set RECALL_PG_DSN.");

		return;
	};
	let created = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");
	let vector_id = created.vector_id.expect("Expected an index entry.");

	index.remove(vector_id);

	let deleted = h
		.service
		.delete(DeleteRequest { memory_id: created.memory_id, user_id: h.user_id })
		.await
		.expect("Delete failed.");

	assert!(deleted.success);
	assert_eq!(deleted.message, "Memory deleted.");
	assert_eq!(deleted.memory_id, created.memory_id);

	let again = h
		.service
		.delete(DeleteRequest { memory_id: created.memory_id, user_id: h.user_id })
		.await;

	assert!(matches!(again, Err(Error::NotFound { .. })));

	h.cleanup().await;
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RECALL_PG_DSN to run."]
async fn delete_tolerates_an_index_outage() {
	let index = Arc::new(MemoryIndex::new());
	let Some(h) = harness(index.clone(), Arc::new(StubEmbedding::new())).await else {
		eprintln!("Skipping delete_tolerates_an_index_outage; set RECALL_PG_DSN.");

		return;
	};
	let created = h
		.service
		.create(create_request(h.user_id, "I like tea", true))
		.await
		.expect("Create failed.");
	let vector_id = created.vector_id.expect("Expected an index entry.");

	index.set_available(false);

	let deleted = h
		.service
		.delete(DeleteRequest { memory_id: created.memory_id, user_id: h.user_id })
		.await
		.expect("Delete failed.");

	assert!(!deleted.vector_deleted);
	assert!(index.contains(vector_id));

	let gone = h.service.get(GetRequest { memory_id: created.memory_id, user_id: None }).await;

	assert!(matches!(gone, Err(Error::NotFound { .. })));

	h.cleanup().await;
}
