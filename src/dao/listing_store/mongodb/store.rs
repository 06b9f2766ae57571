use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::{Document, doc}, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::{ConnectRetry, MongoConfig},
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoListingDocument, doc_id, group_filter, set_document, update_filter},
};
use crate::{
    dao::{
        listing_store::ListingStore,
        models::{ListingEntity, ListingId, ListingPatch, ListingStatus},
        storage::StorageResult,
    },
    state::group_id::GroupId,
};

const LISTING_COLLECTION_NAME: &str = "listings";

/// Listing store backed by the `listings` collection.
#[derive(Clone)]
pub struct MongoListingStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config, ConnectRetry::single()).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoListingStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config, config.connect_retry).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        for (field, name) in [("status", "listing_status_idx"), ("group_id", "listing_group_idx")] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();

            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: LISTING_COLLECTION_NAME,
                    index: field,
                    source,
                })?;
        }

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoListingDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoListingDocument>(LISTING_COLLECTION_NAME)
    }

    async fn find_listing(&self, id: ListingId) -> MongoResult<Option<ListingEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(&id))
            .await
            .map_err(|source| MongoDaoError::LoadListing { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_open(&self) -> MongoResult<Vec<ListingEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoListingDocument> = collection
            .find(doc! {"status": ListingStatus::Open.as_str()})
            .await
            .map_err(|source| MongoDaoError::ListOpen { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListOpen { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// The open listing linked to `group`, or any linked listing when none is open.
    async fn find_listing_by_group(&self, group: GroupId) -> MongoResult<Option<ListingEntity>> {
        let collection = self.collection().await;
        for open_only in [true, false] {
            let document = collection
                .find_one(group_filter(group, open_only))
                .await
                .map_err(|source| MongoDaoError::LoadByGroup {
                    group: group.to_storage(),
                    source,
                })?;
            if let Some(document) = document {
                return Ok(Some(document.into()));
            }
        }
        Ok(None)
    }

    async fn update_listing(&self, id: ListingId, patch: ListingPatch) -> MongoResult<()> {
        let Some(update) = set_document(&patch) else {
            return Ok(());
        };

        let collection = self.collection().await;
        let result = collection
            .update_one(update_filter(&id, &patch), update)
            .await
            .map_err(|source| MongoDaoError::UpdateListing {
                id: id.clone(),
                source,
            })?;

        if result.matched_count > 0 {
            return Ok(());
        }

        // A status guard may have filtered out a listing that already reached
        // a terminal state; only a truly absent document is an error.
        match self.find_listing(id.clone()).await? {
            Some(_) => Ok(()),
            None => Err(MongoDaoError::MissingListing { id }),
        }
    }
}

impl ListingStore for MongoListingStore {
    fn get(&self, id: ListingId) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_listing(id).await.map_err(Into::into) })
    }

    fn query_open(&self) -> BoxFuture<'static, StorageResult<Vec<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_open().await.map_err(Into::into) })
    }

    fn find_by_group(
        &self,
        group: GroupId,
    ) -> BoxFuture<'static, StorageResult<Option<ListingEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_listing_by_group(group).await.map_err(Into::into) })
    }

    fn update(&self, id: ListingId, patch: ListingPatch) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_listing(id, patch).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
