//! 进程内持久化队列
//!
//! Redis 不可用时的回退实现，保持与 Redis 队列一致的 FIFO 语义

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use tracing::trace;

use crate::domain::model::ChatMessage;
use crate::domain::repository::MessageQueue;

/// 进程内 FIFO 队列
#[derive(Default)]
pub struct InMemoryMessageQueue {
    queue: Mutex<VecDeque<ChatMessage>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<ChatMessage>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn enqueue(&self, message: &ChatMessage) -> Result<()> {
        self.lock_queue().push_back(message.clone());
        trace!(message_id = %message.message_id, "Enqueued message (in-memory)");
        Ok(())
    }

    async fn dequeue_batch(&self, batch_size: usize) -> Result<Vec<ChatMessage>> {
        let mut queue = self.lock_queue();
        let take = batch_size.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self.lock_queue().len())
    }
}
