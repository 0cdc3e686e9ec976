//! Redis 列表持久化队列
//!
//! LPUSH 入队，RPOPLPUSH 原子转移到处理中列表后消费，
//! 消息以 JSON 快照存储。入队失败通过错误上抛（调用时感知），
//! 不提供完成回调

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, warn};

use crate::config::ChatDeliveryConfig;
use crate::domain::model::ChatMessage;
use crate::domain::repository::MessageQueue;
use crate::error::ChatDeliveryError;

/// Redis 持久化队列
pub struct RedisMessageQueue {
    client: Arc<redis::Client>,
    queue_key: String,
    processing_key: String,
}

impl RedisMessageQueue {
    pub fn new(client: Arc<redis::Client>, config: &ChatDeliveryConfig) -> Self {
        Self {
            client,
            queue_key: config.queue_key.clone(),
            processing_key: config.processing_key.clone(),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, ChatDeliveryError> {
        Ok(ConnectionManager::new(self.client.as_ref().clone()).await?)
    }

    fn encode(message: &ChatMessage) -> Result<String, ChatDeliveryError> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode(raw: &str) -> Result<ChatMessage, ChatDeliveryError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn enqueue(&self, message: &ChatMessage) -> Result<()> {
        let mut conn = self.connection().await?;
        let encoded = Self::encode(message)?;
        let _: () = conn.lpush(&self.queue_key, encoded).await?;
        debug!(message_id = %message.message_id, "Enqueued message");
        Ok(())
    }

    async fn dequeue_batch(&self, batch_size: usize) -> Result<Vec<ChatMessage>> {
        let mut conn = self.connection().await?;
        let mut messages = Vec::new();

        for _ in 0..batch_size {
            let raw: Option<String> = conn
                .rpoplpush(&self.queue_key, &self.processing_key)
                .await?;
            let Some(raw) = raw else { break };

            match Self::decode(&raw) {
                Ok(message) => messages.push(message),
                // 无法解码的条目已转移到处理中列表，跳过即可
                Err(e) => warn!(error = %e, "Dropping undecodable queue entry"),
            }
        }

        if !messages.is_empty() {
            debug!(count = messages.len(), "Dequeued message batch");
        }
        Ok(messages)
    }

    async fn pending_count(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        let count: usize = conn.llen(&self.queue_key).await?;
        Ok(count)
    }
}
