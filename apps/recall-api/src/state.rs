use std::sync::Arc;

use recall_service::RecallService;
use recall_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RecallService>,
}
impl AppState {
	/// Connects both stores and bootstraps them. Only the relational schema is required up
	/// front; the vector collection is retried lazily if the index is not reachable yet.
	pub async fn new(config: recall_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = RecallService::new(config, db, qdrant);

		if let Err(err) = service.ensure_collection().await {
			tracing::warn!(
				error = %err,
				"Vector collection bootstrap failed; retrying on first use."
			);
		}

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: RecallService) -> Self {
		Self { service: Arc::new(service) }
	}
}
