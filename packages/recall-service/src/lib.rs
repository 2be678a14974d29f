pub mod admin;
pub mod create;
pub mod delete;
pub mod get;
pub mod index;
pub mod list;
pub mod search;

mod error;

pub use admin::{BackfillReport, BackfillRequest, ReconcileReport, ReconcileRequest};
pub use create::{CreateRequest, CreateResponse};
pub use delete::{DeleteRequest, DeleteResponse};
pub use error::{Error, Result};
pub use get::{GetRequest, GetResponse, MemoryView};
pub use index::{IndexEntry, IndexFilter, IndexHit};
pub use list::{ListItem, ListRequest, ListResponse};
pub use search::{SearchItem, SearchRequest, SearchResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::sync::OnceCell;
use uuid::Uuid;

use recall_config::{Config, EmbeddingProviderConfig};
use recall_providers::embedding;
use recall_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// Length of every vector this provider returns.
	fn dimension(&self) -> u32;

	fn has_credentials(&self) -> bool;

	/// One vector per input, in input order.
	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;

	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move {
			let texts = [text.to_string()];
			let vectors = self.embed_batch(&texts).await?;

			vectors.into_iter().next().ok_or_else(|| Error::EmbeddingUnavailable {
				message: "Embedding provider returned no vectors.".to_string(),
			})
		})
	}
}

/// Similarity index keyed by engine-generated UUIDs.
///
/// Every method takes the collection name explicitly. Deleting an id that is not present
/// succeeds.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn ensure_collection<'a>(&'a self, name: &'a str, dimension: u32) -> BoxFuture<'a, Result<()>>;

	fn upsert<'a>(&'a self, name: &'a str, entry: IndexEntry) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, name: &'a str, id: Uuid) -> BoxFuture<'a, Result<()>>;

	fn search<'a>(
		&'a self,
		name: &'a str,
		vector: Vec<f32>,
		filter: &'a IndexFilter,
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>>;

	/// The subset of `ids` that currently has an entry.
	fn existing<'a>(&'a self, name: &'a str, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Uuid>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}

pub struct RecallService {
	pub cfg: Config,
	pub db: Db,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	collection_ready: OnceCell<()>,
}

/// Embedding backend driven by `[providers.embedding]`.
pub struct HttpEmbedding {
	cfg: EmbeddingProviderConfig,
	dimension: u32,
}
impl HttpEmbedding {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		let dimension = embedding::dimension(&cfg);

		Self { cfg, dimension }
	}
}

impl EmbeddingProvider for HttpEmbedding {
	fn dimension(&self) -> u32 {
		self.dimension
	}

	fn has_credentials(&self) -> bool {
		self.cfg.has_usable_credentials()
	}

	fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(&self.cfg, texts).await?) })
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}

	pub fn from_config(cfg: &EmbeddingProviderConfig) -> Self {
		Self { embedding: Arc::new(HttpEmbedding::new(cfg.clone())) }
	}
}

impl RecallService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let providers = Providers::from_config(&cfg.providers.embedding);

		Self::with_parts(cfg, db, Arc::new(qdrant), providers)
	}

	pub fn with_parts(
		cfg: Config,
		db: Db,
		index: Arc<dyn VectorIndex>,
		providers: Providers,
	) -> Self {
		Self { cfg, db, index, providers, collection_ready: OnceCell::new() }
	}

	/// Creates the collection on first use. Only success is remembered, so a failed attempt is
	/// retried by the next caller.
	pub async fn ensure_collection(&self) -> Result<()> {
		self.collection_ready
			.get_or_try_init(|| async {
				let dimension = self.providers.embedding.dimension();

				self.index.ensure_collection(self.collection(), dimension).await?;

				tracing::info!(
					collection = self.collection(),
					dimension,
					"Vector collection is ready."
				);

				Ok::<_, Error>(())
			})
			.await?;

		Ok(())
	}

	pub(crate) fn collection(&self) -> &str {
		&self.cfg.storage.qdrant.collection
	}

	pub(crate) fn require_credentials(&self) -> Result<()> {
		if self.providers.embedding.has_credentials() {
			return Ok(());
		}

		Err(Error::EmbeddingUnavailable {
			message: "Embedding provider has no usable API key.".to_string(),
		})
	}

	pub(crate) async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let vector = self.providers.embedding.embed(text).await?;
		let expected = self.providers.embedding.dimension() as usize;

		if vector.len() != expected {
			return Err(Error::EmbeddingUnavailable {
				message: format!(
					"Embedding vector has {} dimensions; expected {expected}.",
					vector.len()
				),
			});
		}

		Ok(vector)
	}

	/// Best-effort removal of an entry that no row will reference.
	pub(crate) async fn discard_vector(&self, vector_id: Uuid) {
		if let Err(err) = self.index.delete(self.collection(), vector_id).await {
			tracing::warn!(
				error = %err,
				vector_id = %vector_id,
				"Failed to remove an unreferenced index entry."
			);
		}
	}
}

/// First `max_chars` characters, with `...` appended when anything was cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((cut, _)) => format!("{}...", &text[..cut]),
		None => text.to_string(),
	}
}
