use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use recall_config::{EmbeddingProviderConfig, EmbeddingProviderKind};

const COHERE_INPUT_TYPE: &str = "search_document";

/// Output dimension for the configured provider and model.
pub fn dimension(cfg: &EmbeddingProviderConfig) -> u32 {
	cfg.dimensions.unwrap_or_else(|| infer_dimension(cfg.provider_id, &cfg.model))
}

pub fn infer_dimension(kind: EmbeddingProviderKind, model: &str) -> u32 {
	match kind {
		EmbeddingProviderKind::OpenAi =>
			if model.contains("text-embedding-3-large") {
				3_072
			} else {
				1_536
			},
		EmbeddingProviderKind::Cohere =>
			if model.contains("-light-") {
				384
			} else {
				1_024
			},
	}
}

pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let Some(api_key) = cfg.usable_api_key() else {
		return Err(Error::MissingCredentials { provider: cfg.provider_id.as_str() });
	};
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(api_key, &cfg.default_headers)?)
		.json(&request_body(cfg, texts))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = match cfg.provider_id {
		EmbeddingProviderKind::OpenAi => parse_openai_response(json)?,
		EmbeddingProviderKind::Cohere => parse_cohere_response(json)?,
	};

	if vectors.len() != texts.len() {
		return Err(Error::invalid_response(format!(
			"Embedding provider returned {} vectors for {} inputs.",
			vectors.len(),
			texts.len()
		)));
	}

	tracing::debug!(
		provider = cfg.provider_id.as_str(),
		model = cfg.model.as_str(),
		count = vectors.len(),
		"Embeddings generated."
	);

	Ok(vectors)
}

fn request_body(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Value {
	match cfg.provider_id {
		EmbeddingProviderKind::OpenAi => {
			let mut body = serde_json::json!({ "model": cfg.model, "input": texts });

			// Only text-embedding-3 models accept an explicit output size.
			if let Some(dimensions) = cfg.dimensions {
				body["dimensions"] = Value::from(dimensions);
			}

			body
		},
		EmbeddingProviderKind::Cohere => serde_json::json!({
			"model": cfg.model,
			"texts": texts,
			"input_type": COHERE_INPUT_TYPE,
			"embedding_types": ["float"],
		}),
	}
}

fn parse_openai_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::invalid_response("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.ok_or_else(|| Error::invalid_response("Embedding item missing embedding array."))?;

		indexed.push((index, parse_vector(embedding)?));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn parse_cohere_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let embeddings = json
		.get("embeddings")
		.ok_or_else(|| Error::invalid_response("Embedding response is missing embeddings."))?;
	// v1 returns a bare array of vectors; v2 nests them by embedding type.
	let vectors = match embeddings {
		Value::Array(items) => items,
		Value::Object(by_type) => by_type.get("float").and_then(|v| v.as_array()).ok_or_else(
			|| Error::invalid_response("Embedding response is missing float embeddings."),
		)?,
		_ => return Err(Error::invalid_response("Embedding response has malformed embeddings.")),
	};

	vectors.iter().map(parse_vector).collect()
}

fn parse_vector(value: &Value) -> Result<Vec<f32>> {
	let items = value
		.as_array()
		.ok_or_else(|| Error::invalid_response("Embedding must be an array of numbers."))?;
	let mut vec = Vec::with_capacity(items.len());

	for item in items {
		let number = item
			.as_f64()
			.ok_or_else(|| Error::invalid_response("Embedding value must be numeric."))?;

		vec.push(number as f32);
	}

	Ok(vec)
}
