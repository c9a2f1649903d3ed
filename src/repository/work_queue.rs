//! Named FIFO work queue backed by a Mongo collection per queue (component C).

use bson::doc;
use chrono::Utc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};
use serde_json::Value;

use crate::error::Result;
use crate::models::{new_id, Id, QueueMessage, QueueStatus};

#[derive(Clone)]
pub struct WorkQueue {
    collection: Collection<QueueMessage>,
}

impl WorkQueue {
    pub fn new(db: &Database, queue_name: &str) -> Self {
        Self {
            collection: db.collection(queue_name),
        }
    }

    /// Inserts a new pending message (§4.C).
    pub async fn send(&self, msg_type: &str, payload: Value) -> Result<Id> {
        let message = QueueMessage {
            id: new_id(),
            status: QueueStatus::Pending,
            created_at: Utc::now(),
            msg_type: msg_type.to_string(),
            msg: payload,
        };
        self.collection.insert_one(&message).await?;
        Ok(message.id)
    }

    /// Atomically claims the oldest pending message, setting
    /// `status = processing`. At most one worker ever observes a given
    /// message as `processing` (§5 single-claim discipline).
    pub async fn recv(&self) -> Result<Option<QueueMessage>> {
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "created_at": 1 })
            .return_document(ReturnDocument::After)
            .build();

        let claimed = self
            .collection
            .find_one_and_update(
                doc! { "status": bson::to_bson(&QueueStatus::Pending)? },
                doc! { "$set": { "status": bson::to_bson(&QueueStatus::Processing)? } },
            )
            .with_options(options)
            .await?;
        Ok(claimed)
    }

    /// Sets a claimed message's terminal status (§4.C).
    pub async fn complete(&self, id: &str, status: QueueStatus) -> Result<()> {
        self.collection
            .update_one(
                doc! { "id": id },
                doc! { "$set": { "status": bson::to_bson(&status)? } },
            )
            .await?;
        Ok(())
    }

    /// Forwards a raw payload to a companion queue (used to route failed
    /// OCR messages to `ocr_err` for diagnostic retention, §4.D/§7).
    pub async fn forward(&self, msg_type: &str, payload: Value) -> Result<Id> {
        self.send(msg_type, payload).await
    }
}
