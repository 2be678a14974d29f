//! Throwaway Postgres databases and Qdrant collections for integration tests.
//!
//! Tests opt in through `RECALL_PG_DSN` (any database on the target server; an admin database is
//! used to create and drop the per-test copy) and `RECALL_QDRANT_URL`.

mod error;

pub use error::{Error, Result};

use std::{collections::BTreeSet, env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor, PgPool,
	postgres::{PgConnectOptions, PgConnection, PgPoolOptions},
};
use tokio::{runtime::Builder, sync::OnceCell, time};
use uuid::Uuid;

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];
const QDRANT_TIMEOUT: Duration = Duration::from_secs(10);
const SEED_POOL_CONNS: u32 = 2;

/// A database created for one test, dropped together with its registered collections.
pub struct TestDatabase {
	name: String,
	dsn: String,
	seed_pool: OnceCell<PgPool>,
	collections: Mutex<BTreeSet<String>>,
	teardown: Option<Teardown>,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse RECALL_PG_DSN: {err}.")))?;
		let (admin, mut conn) = find_admin_database(&base_options).await?;
		let name = format!("recall_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create {name}: {err}.")))?;

		Ok(Self {
			dsn: base_options.database(&name).to_url_lossy().to_string(),
			seed_pool: OnceCell::new(),
			collections: Mutex::new(BTreeSet::new()),
			teardown: Some(Teardown { database: name.clone(), admin, collections: Vec::new() }),
			name,
		})
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// A collection name scoped to this database. It is deleted on teardown.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);

		self.collections.lock().unwrap_or_else(|err| err.into_inner()).insert(collection.clone());

		collection
	}

	/// Inserts an owner row with a unique email. The schema must already exist.
	pub async fn seed_user(&self) -> Result<i64> {
		let pool = self
			.seed_pool
			.get_or_try_init(|| {
				PgPoolOptions::new().max_connections(SEED_POOL_CONNS).connect(&self.dsn)
			})
			.await?;
		let id = sqlx::query_scalar("INSERT INTO users (email) VALUES ($1) RETURNING id")
			.bind(format!("owner-{}@recall.test", Uuid::new_v4().simple()))
			.fetch_one(pool)
			.await?;

		Ok(id)
	}

	/// Drops the database and collections, reporting failures instead of printing them.
	pub async fn cleanup(mut self) -> Result<()> {
		if let Some(pool) = self.seed_pool.get() {
			pool.close().await;
		}

		match self.take_teardown() {
			Some(teardown) => teardown.run().await,
			None => Ok(()),
		}
	}

	fn take_teardown(&mut self) -> Option<Teardown> {
		let mut teardown = self.teardown.take()?;
		let collections = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		teardown.collections = collections.iter().cloned().collect();

		Some(teardown)
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let Some(teardown) = self.take_teardown() else {
			return;
		};
		// The caller may be inside a runtime, which cannot be blocked on from here.
		let worker = thread::spawn(move || {
			match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) =>
					if let Err(err) = runtime.block_on(teardown.run()) {
						eprintln!("Test teardown failed: {err}.");
					},
				Err(err) => eprintln!("Test teardown could not start a runtime: {err}."),
			}
		});

		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("RECALL_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("RECALL_QDRANT_URL").ok()
}

struct Teardown {
	database: String,
	admin: PgConnectOptions,
	collections: Vec<String>,
}
impl Teardown {
	/// Collections go first so a Postgres failure does not leak them.
	async fn run(self) -> Result<()> {
		let collections = delete_collections(&self.collections).await;
		let database = drop_database(&self.database, &self.admin).await;

		collections.and(database)
	}
}

async fn find_admin_database(
	base_options: &PgConnectOptions,
) -> Result<(PgConnectOptions, PgConnection)> {
	let mut failures = Vec::new();

	for database in ADMIN_DATABASES {
		let options = base_options.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => failures.push(format!("{database}: {err}")),
		}
	}

	Err(Error::Message(format!("No admin database is reachable ({}).", failures.join("; "))))
}

async fn drop_database(name: &str, admin: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await?;

	// Service pools under test may still hold connections.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await?;
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop {name}: {err}.")))?;

	Ok(())
}

async fn delete_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(qdrant_url) = env_qdrant_url() else {
		eprintln!("Leaving {} test collections; RECALL_QDRANT_URL is unset.", collections.len());

		return Ok(());
	};
	let client = Qdrant::from_url(&qdrant_url)
		.build()
		.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;

	for collection in collections {
		let exists = time::timeout(QDRANT_TIMEOUT, client.collection_exists(collection.as_str()))
			.await
			.map_err(|_| Error::Message(format!("Timed out inspecting {collection}.")))?
			.map_err(|err| Error::Message(format!("Failed to inspect {collection}: {err}.")))?;

		if !exists {
			continue;
		}

		time::timeout(QDRANT_TIMEOUT, client.delete_collection(collection.as_str()))
			.await
			.map_err(|_| Error::Message(format!("Timed out deleting {collection}.")))?
			.map_err(|err| Error::Message(format!("Failed to delete {collection}: {err}.")))?;
	}

	Ok(())
}
