use qdrant_client::{Qdrant, QdrantError};
use tonic::Code;

use crate::Result;

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
}
impl QdrantStore {
	pub fn new(cfg: &recall_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).api_key(cfg.api_key.clone()).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}
}

/// The server answered that the addressed collection or point does not exist.
pub fn is_not_found_error(err: &QdrantError) -> bool {
	status_code(err) == Some(Code::NotFound)
}

/// Collection creation lost a race with another creator.
pub fn is_already_exists_error(err: &QdrantError) -> bool {
	status_code(err) == Some(Code::AlreadyExists)
}

/// Only server responses carry a status; transport and conversion failures never match.
fn status_code(err: &QdrantError) -> Option<Code> {
	match err {
		QdrantError::ResponseError { status } => Some(status.code()),
		_ => None,
	}
}
