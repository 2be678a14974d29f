use std::collections::HashMap;

use qdrant_client::{
	QdrantError,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
		GetPointsBuilder, PointId, PointStruct, PointsIdsList, Query, QueryPointsBuilder,
		ScoredPoint, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
		point_id::PointIdOptions, value::Kind,
	},
};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::{BoxFuture, Error, Result, VectorIndex};
use recall_storage::qdrant::{self, QdrantStore};

#[derive(Clone, Debug)]
pub struct IndexEntry {
	pub id: Uuid,
	pub vector: Vec<f32>,
	pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct IndexHit {
	pub id: Uuid,
	pub score: f32,
	pub attributes: Map<String, Value>,
}

/// Conjunction of equality constraints; unset fields do not constrain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexFilter {
	pub user_id: Option<i64>,
	pub source: Option<String>,
}
impl IndexFilter {
	pub fn matches(&self, attributes: &Map<String, Value>) -> bool {
		let user_ok = self.user_id.is_none_or(|user_id| {
			attributes.get("user_id").and_then(Value::as_i64) == Some(user_id)
		});
		let source_ok = self.source.as_deref().is_none_or(|source| {
			attributes.get("source").and_then(Value::as_str) == Some(source)
		});

		user_ok && source_ok
	}

	fn to_qdrant(&self) -> Option<Filter> {
		let mut conditions = Vec::new();

		if let Some(user_id) = self.user_id {
			conditions.push(Condition::matches("user_id", user_id));
		}
		if let Some(source) = self.source.as_ref() {
			conditions.push(Condition::matches("source", source.clone()));
		}

		if conditions.is_empty() { None } else { Some(Filter::must(conditions)) }
	}
}

impl VectorIndex for QdrantStore {
	fn ensure_collection<'a>(&'a self, name: &'a str, dimension: u32) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.client.collection_exists(name).await.map_err(index_error)? {
				return Ok(());
			}

			let create = CreateCollectionBuilder::new(name)
				.vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));

			match self.client.create_collection(create).await {
				Ok(_) => {
					tracing::info!(collection = name, dimension, "Created vector collection.");

					Ok(())
				},
				// Another process may have created it between the check and the create.
				Err(err) =>
					if qdrant::is_already_exists_error(&err)
						|| self.client.collection_exists(name).await.unwrap_or(false)
					{
						Ok(())
					} else {
						Err(index_error(err))
					},
			}
		})
	}

	fn upsert<'a>(&'a self, name: &'a str, entry: IndexEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut payload = Payload::new();

			for (key, value) in entry.attributes {
				payload.insert(key, value);
			}

			let point = PointStruct::new(entry.id.to_string(), entry.vector, payload);

			self.client
				.upsert_points(UpsertPointsBuilder::new(name, vec![point]).wait(true))
				.await
				.map_err(index_error)?;

			Ok(())
		})
	}

	fn delete<'a>(&'a self, name: &'a str, id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let request = DeletePointsBuilder::new(name)
				.points(PointsIdsList { ids: vec![PointId::from(id.to_string())] })
				.wait(true);

			match self.client.delete_points(request).await {
				Ok(_) => Ok(()),
				// A missing collection holds no entry to delete.
				Err(err) if qdrant::is_not_found_error(&err) => Ok(()),
				Err(err) => Err(index_error(err)),
			}
		})
	}

	fn search<'a>(
		&'a self,
		name: &'a str,
		vector: Vec<f32>,
		filter: &'a IndexFilter,
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			let mut query = QueryPointsBuilder::new(name)
				.query(Query::new_nearest(vector))
				.limit(limit)
				.with_payload(true);

			if let Some(filter) = filter.to_qdrant() {
				query = query.filter(filter);
			}

			let response = self.client.query(query).await.map_err(index_error)?;

			Ok(response.result.into_iter().filter_map(hit_from_point).collect())
		})
	}

	fn existing<'a>(&'a self, name: &'a str, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			if ids.is_empty() {
				return Ok(Vec::new());
			}

			// A missing collection holds none of the ids. Any other failure must surface, since
			// callers clear references to ids reported absent.
			if !self.client.collection_exists(name).await.map_err(index_error)? {
				return Ok(Vec::new());
			}

			let point_ids = ids.iter().map(|id| PointId::from(id.to_string())).collect::<Vec<_>>();
			let request =
				GetPointsBuilder::new(name, point_ids).with_payload(false).with_vectors(false);
			let response = self.client.get_points(request).await.map_err(index_error)?;

			Ok(response
				.result
				.into_iter()
				.filter_map(|point| point.id.and_then(point_uuid))
				.collect())
		})
	}
}

fn index_error(err: QdrantError) -> Error {
	Error::IndexUnavailable { message: err.to_string() }
}

fn point_uuid(id: PointId) -> Option<Uuid> {
	match id.point_id_options? {
		PointIdOptions::Uuid(raw) => Uuid::parse_str(&raw).ok(),
		PointIdOptions::Num(_) => None,
	}
}

/// Points without a UUID id were not written by this engine and are skipped.
fn hit_from_point(point: ScoredPoint) -> Option<IndexHit> {
	let id = point.id.and_then(point_uuid)?;

	Some(IndexHit { id, score: point.score, attributes: attributes_from_payload(point.payload) })
}

fn attributes_from_payload(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
	payload.into_iter().map(|(key, value)| (key, json_from_qdrant(value))).collect()
}

fn json_from_qdrant(value: QdrantValue) -> Value {
	match value.kind {
		None | Some(Kind::NullValue(_)) => Value::Null,
		Some(Kind::BoolValue(flag)) => Value::Bool(flag),
		Some(Kind::IntegerValue(number)) => Value::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null),
		Some(Kind::StringValue(text)) => Value::String(text),
		Some(Kind::ListValue(list)) =>
			Value::Array(list.values.into_iter().map(json_from_qdrant).collect()),
		Some(Kind::StructValue(object)) => Value::Object(attributes_from_payload(object.fields)),
	}
}
