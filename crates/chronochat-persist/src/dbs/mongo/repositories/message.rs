use mongodb::bson::doc;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, ClientSession, Collection, IndexModel};

use crate::dbs::mongo::models::MongoMessage;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoMessageRepository {
    collection: Collection<MongoMessage>,
}

impl MongoMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("messages");
        Self { collection }
    }

    /// The unique index turns any duplicate sequence into a write error
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "thread_id": 1, "sequence": 1 })
            .options(
                IndexOptions::builder()
                    .name("thread_sequence".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn insert_batch(
        &self,
        session: &mut ClientSession,
        messages: &[MongoMessage],
    ) -> mongodb::error::Result<()> {
        self.collection.insert_many(messages).session(session).await?;
        Ok(())
    }

    /// Newest `limit` messages, returned oldest first
    pub async fn recent(&self, thread_id: &str, limit: i64) -> Result<Vec<MongoMessage>> {
        let mut messages: Vec<MongoMessage> = self
            .collection
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "sequence": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        messages.reverse();
        Ok(messages)
    }

    pub async fn delete_for_thread(&self, thread_id: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "thread_id": thread_id })
            .await?;
        Ok(result.deleted_count)
    }

    /// `(message count, token sum)` recomputed from the stored messages
    pub async fn totals(&self, thread_id: &str) -> Result<(i64, i64)> {
        let pipeline = vec![
            doc! { "$match": { "thread_id": thread_id } },
            doc! { "$group": {
                "_id": null,
                "count": { "$sum": 1 },
                "tokens": { "$sum": "$token_count" }
            } },
        ];
        let mut cursor = self.collection.aggregate(pipeline).await?;
        let Some(row) = cursor.try_next().await? else {
            return Ok((0, 0));
        };
        let count = row.get_i32("count").map(i64::from).or_else(|_| row.get_i64("count")).unwrap_or(0);
        let tokens = row
            .get_i64("tokens")
            .or_else(|_| row.get_i32("tokens").map(i64::from))
            .unwrap_or(0);
        Ok((count, tokens))
    }
}
