//! MongoDB database wrapper.
//!
//! The client is resolved on first use, so the process starts even when the
//! database is briefly unreachable.

use anyhow::Result;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Lazily connected MongoDB database handle.
#[derive(Debug)]
pub struct Database {
    uri: String,
    name: String,
    inner: OnceCell<mongodb::Database>,
}

impl Database {
    /// Create a handle. No connection is made until the first operation.
    pub fn new(uri: &str, name: &str) -> Self {
        Self {
            uri: uri.to_string(),
            name: name.to_string(),
            inner: OnceCell::new(),
        }
    }

    /// Get the database, connecting on first call.
    pub async fn db(&self) -> Result<&mongodb::Database> {
        self.inner
            .get_or_try_init(|| async {
                let client = Client::with_uri_str(&self.uri).await?;
                let db = client.database(&self.name);
                info!("MongoDB client ready (database: {})", self.name);

                if let Err(e) = ensure_indexes(&db).await {
                    warn!("Failed to ensure indexes: {}", e);
                }

                Ok::<_, anyhow::Error>(db)
            })
            .await
    }

    /// Get a typed collection from the database.
    pub async fn collection<T: Send + Sync>(&self, name: &str) -> Result<Collection<T>> {
        Ok(self.db().await?.collection(name))
    }

    /// Round-trip a `ping` command.
    pub async fn ping(&self) -> Result<()> {
        self.db().await?.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// Unique keys backing the logical document paths.
async fn ensure_indexes(db: &mongodb::Database) -> Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<mongodb::bson::Document>("groups")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "group_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<mongodb::bson::Document>("members")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "group_id": 1, "user_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<mongodb::bson::Document>("stickers")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "group_id": 1, "file_unique_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<mongodb::bson::Document>("images")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "group_id": 1, "generated_at": -1 })
                .build(),
        )
        .await?;

    Ok(())
}
