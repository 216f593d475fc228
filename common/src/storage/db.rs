use std::ops::Deref;

use serde::Deserialize;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

use super::{tiers::Tier, types::StoredObject};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Define the per-tier HNSW indexes sized to the embedding dimension.
    ///
    /// `OVERWRITE` keeps the definitions in sync when the configured
    /// embedding backend changes the dimension between runs. The distance
    /// metric must stay cosine; the similarity conversion downstream
    /// assumes it.
    pub async fn ensure_tier_indexes(&self, dimension: usize) -> Result<(), Error> {
        for tier in Tier::ALL {
            self.client
                .query(format!(
                    "DEFINE INDEX OVERWRITE {index} ON TABLE {table} \
                     FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE TYPE F32 EFC 100 M 8",
                    index = tier.index_name(),
                    table = tier.table_name(),
                ))
                .await?;
        }

        Ok(())
    }

    pub async fn rebuild_indexes(&self) -> Result<(), Error> {
        for tier in Tier::ALL {
            self.client
                .query(format!(
                    "REBUILD INDEX IF EXISTS {index} ON {table}",
                    index = tier.index_name(),
                    table = tier.table_name(),
                ))
                .await?;
        }

        Ok(())
    }

    /// Operation to store a object in SurrealDB, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `item` - The item to be stored
    ///
    /// # Returns
    /// * `Result` - Item or Error
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Operation to retrieve all objects from a certain table, requires the struct to implement StoredObject
    ///
    /// # Returns
    /// * `Result` - Vec<T> or Error
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Operation to retrieve a single object by its ID, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `id` - The ID of the item to retrieve
    ///
    /// # Returns
    /// * `Result<Option<T>, Error>` - The found item or Error
    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    pub async fn count_table(&self, table: &str) -> Result<u64, Error> {
        let mut response = self
            .client
            .query(format!("SELECT count() AS count FROM {table} GROUP ALL"))
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map_or(0, |row| row.count))
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
