use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
	Result,
	models::{Memory, NewMemory, VectorRef},
};

const MEMORY_COLUMNS: &str = "\
id,
\tuser_id,
\tcontent,
\tsource,
\tcategory,
\tattributes,
\toriginal_post_id,
\toriginal_url,
\tvector_id,
\tcreated_at,
\tsource_timestamp";

pub async fn insert_memory<'e, E>(executor: E, memory: &NewMemory) -> Result<Memory>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
INSERT INTO memories (
\tuser_id,
\tcontent,
\tsource,
\tcategory,
\tattributes,
\toriginal_post_id,
\toriginal_url,
\tvector_id,
\tsource_timestamp
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,COALESCE($9, now()))
RETURNING {MEMORY_COLUMNS}"
	);
	let row = sqlx::query_as::<_, Memory>(&sql)
		.bind(memory.user_id)
		.bind(memory.content.as_str())
		.bind(memory.source.as_str())
		.bind(memory.category.as_str())
		.bind(&memory.attributes)
		.bind(memory.original_post_id.as_deref())
		.bind(memory.original_url.as_deref())
		.bind(memory.vector_id)
		.bind(memory.source_timestamp)
		.fetch_one(executor)
		.await?;

	Ok(row)
}

/// Fetches one memory. With `user_id` set, rows owned by anyone else are treated as absent.
pub async fn get_memory<'e, E>(
	executor: E,
	memory_id: i64,
	user_id: Option<i64>,
) -> Result<Option<Memory>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT
\t{MEMORY_COLUMNS}
FROM memories
WHERE id = $1 AND ($2::bigint IS NULL OR user_id = $2)
LIMIT 1"
	);
	let row = sqlx::query_as::<_, Memory>(&sql)
		.bind(memory_id)
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Row-locks an owned memory for the rest of the caller's transaction.
pub async fn lock_owned_memory<'e, E>(
	executor: E,
	memory_id: i64,
	user_id: i64,
) -> Result<Option<Memory>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT
\t{MEMORY_COLUMNS}
FROM memories
WHERE id = $1 AND user_id = $2
FOR UPDATE"
	);
	let row = sqlx::query_as::<_, Memory>(&sql)
		.bind(memory_id)
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn delete_memory<'e, E>(executor: E, memory_id: i64) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM memories WHERE id = $1")
		.bind(memory_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn count_memories<'e, E>(executor: E, user_id: i64, source: Option<&str>) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let mut builder =
		QueryBuilder::<Postgres>::new("SELECT count(*) FROM memories WHERE user_id = ");

	builder.push_bind(user_id);
	push_source_filter(&mut builder, source);

	let total = builder.build_query_scalar::<i64>().fetch_one(executor).await?;

	Ok(total)
}

/// Newest first; ties on `created_at` fall back to the id so pages stay stable.
pub async fn list_memories<'e, E>(
	executor: E,
	user_id: i64,
	source: Option<&str>,
	limit: i64,
	offset: i64,
) -> Result<Vec<Memory>>
where
	E: PgExecutor<'e>,
{
	let mut builder = QueryBuilder::<Postgres>::new(format!(
		"SELECT {MEMORY_COLUMNS} FROM memories WHERE user_id = "
	));

	builder.push_bind(user_id);
	push_source_filter(&mut builder, source);
	builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
	builder.push_bind(limit);
	builder.push(" OFFSET ");
	builder.push_bind(offset);

	let rows = builder.build_query_as::<Memory>().fetch_all(executor).await?;

	Ok(rows)
}

/// One page of rows that claim an index entry, ordered by id for keyset pagination.
pub async fn list_vector_refs_after<'e, E>(
	executor: E,
	after_id: i64,
	limit: i64,
) -> Result<Vec<VectorRef>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, VectorRef>(
		"\
SELECT id, vector_id
FROM memories
WHERE vector_id IS NOT NULL AND id > $1
ORDER BY id ASC
LIMIT $2",
	)
	.bind(after_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Clears `vector_id` only if it still holds the expected value.
pub async fn clear_vector_id<'e, E>(executor: E, memory_id: i64, vector_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result =
		sqlx::query("UPDATE memories SET vector_id = NULL WHERE id = $1 AND vector_id = $2")
			.bind(memory_id)
			.bind(vector_id)
			.execute(executor)
			.await?;

	Ok(result.rows_affected() == 1)
}

/// Sets `vector_id` only on a row that still has none.
pub async fn attach_vector_id<'e, E>(executor: E, memory_id: i64, vector_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result =
		sqlx::query("UPDATE memories SET vector_id = $2 WHERE id = $1 AND vector_id IS NULL")
			.bind(memory_id)
			.bind(vector_id)
			.execute(executor)
			.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn list_unembedded<'e, E>(
	executor: E,
	user_id: Option<i64>,
	limit: i64,
) -> Result<Vec<Memory>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT
\t{MEMORY_COLUMNS}
FROM memories
WHERE vector_id IS NULL AND ($1::bigint IS NULL OR user_id = $1)
ORDER BY id ASC
LIMIT $2"
	);
	let rows = sqlx::query_as::<_, Memory>(&sql)
		.bind(user_id)
		.bind(limit)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

fn push_source_filter(builder: &mut QueryBuilder<'_, Postgres>, source: Option<&str>) {
	if let Some(source) = source {
		builder.push(" AND source = ");
		builder.push_bind(source.to_string());
	}
}
