use mongodb::bson::{self, doc, Document};
use futures::TryStreamExt;
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, IndexModel};

use crate::conversation::ListThreads;
use crate::dbs::mongo::models::MongoThread;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoThread>,
}

impl MongoThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("threads");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "owner_id": 1, "updated_at": -1 })
            .options(IndexOptions::builder().name("owner_recent".to_string()).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert(&self, thread: &MongoThread) -> Result<()> {
        self.collection.insert_one(thread).await?;
        Ok(())
    }

    pub async fn get(&self, thread_id: &str) -> Result<Option<MongoThread>> {
        Ok(self.collection.find_one(doc! { "_id": thread_id }).await?)
    }

    /// Reserve `count` sequence numbers inside the caller's transaction.
    /// Returns the updated thread, or `None` when it does not exist.
    pub async fn reserve_sequences(
        &self,
        session: &mut ClientSession,
        thread_id: &str,
        count: i64,
        tokens: i64,
    ) -> mongodb::error::Result<Option<MongoThread>> {
        self.collection
            .find_one_and_update(
                doc! { "_id": thread_id },
                doc! {
                    "$inc": { "message_count": count, "total_tokens": tokens },
                    "$set": { "updated_at": bson::DateTime::now() }
                },
            )
            .return_document(ReturnDocument::After)
            .session(session)
            .await
    }

    pub async fn list(&self, owner_id: &str, options: ListThreads) -> Result<Vec<MongoThread>> {
        let mut filter = doc! { "owner_id": owner_id };
        if !options.include_archived {
            filter.insert("archived", false);
        }

        let threads = self
            .collection
            .find(filter)
            .sort(doc! { "updated_at": -1 })
            .limit(options.limit)
            .skip(options.skip)
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    /// Apply `$set` fields to a thread owned by `owner_id`; false when no match
    pub async fn update_owned(&self, thread_id: &str, owner_id: &str, mut set: Document) -> Result<bool> {
        set.insert("updated_at", bson::DateTime::now());
        let result = self
            .collection
            .update_one(
                doc! { "_id": thread_id, "owner_id": owner_id },
                doc! { "$set": set },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete_owned(&self, thread_id: &str, owner_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": thread_id, "owner_id": owner_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn search(&self, owner_id: &str, pattern: &str, limit: i64) -> Result<Vec<MongoThread>> {
        let threads = self
            .collection
            .find(doc! {
                "owner_id": owner_id,
                "title": { "$regex": pattern, "$options": "i" }
            })
            .sort(doc! { "updated_at": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    pub async fn set_counters(&self, thread_id: &str, count: i64, tokens: i64) -> Result<Option<MongoThread>> {
        Ok(self
            .collection
            .find_one_and_update(
                doc! { "_id": thread_id },
                doc! { "$set": { "message_count": count, "total_tokens": tokens } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }
}
