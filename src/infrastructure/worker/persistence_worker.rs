//! 持久化 worker
//!
//! 周期性批量出队，逐条落库并回填会话的最后消息指针，
//! 成功后向双方推送 delivered/confirmed 事件。
//! worker 的失败对投递管道不可见：管道只感知入队失败，
//! 推送成功但落库失败的消息对双方表现为已送达（既定取舍）

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::config::ChatDeliveryConfig;
use crate::domain::model::{
    ChatMessage, DeliveryStatus, EVENT_MESSAGE_CONFIRMED, EVENT_MESSAGE_DELIVERED,
    MessagePushPayload,
};
use crate::domain::repository::{ChatRepository, MessageQueue, RealtimeChannel};

/// 持久化 worker 配置
#[derive(Debug, Clone)]
pub struct PersistenceWorkerConfig {
    /// 单批出队条数
    pub batch_size: usize,
    /// 队列轮询间隔
    pub poll_interval: Duration,
    /// 单条消息最大尝试次数
    pub max_attempts: u32,
    /// 尝试之间的等待
    pub retry_delay: Duration,
}

impl Default for PersistenceWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_millis(100),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&ChatDeliveryConfig> for PersistenceWorkerConfig {
    fn from(config: &ChatDeliveryConfig) -> Self {
        Self {
            batch_size: config.worker_batch_size,
            // tokio 的 interval 在零时长上 panic
            poll_interval: Duration::from_millis(config.worker_poll_interval_ms.max(1)),
            max_attempts: config.worker_max_attempts,
            retry_delay: Duration::from_secs(config.worker_retry_delay_secs),
        }
    }
}

/// 持久化 worker
pub struct PersistenceWorker {
    queue: Arc<dyn MessageQueue>,
    repository: Arc<dyn ChatRepository>,
    channel: Arc<dyn RealtimeChannel>,
    config: PersistenceWorkerConfig,
}

impl PersistenceWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        repository: Arc<dyn ChatRepository>,
        channel: Arc<dyn RealtimeChannel>,
        config: PersistenceWorkerConfig,
    ) -> Self {
        Self {
            queue,
            repository,
            channel,
            config,
        }
    }

    /// 启动 worker 循环
    ///
    /// 返回关闭句柄：向其发送 true 后循环在下一次调度点退出
    pub fn start(self: Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let worker = self;

        tokio::spawn(async move {
            info!("Message persistence worker started");
            let mut ticker = interval(worker.config.poll_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = worker.process_batch().await {
                            error!(error = %e, "Error processing message batch");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Message persistence worker stopping");
                            break;
                        }
                    }
                }
            }

            info!("Message persistence worker stopped");
        });

        shutdown_tx
    }

    /// 出队一批消息并逐条持久化，返回成功条数
    pub async fn process_batch(&self) -> Result<usize> {
        let messages = self
            .queue
            .dequeue_batch(self.config.batch_size)
            .await
            .context("dequeue message batch")?;

        if messages.is_empty() {
            return Ok(0);
        }

        info!(batch_size = messages.len(), "Processing message batch");

        let mut persisted = 0;
        for message in messages {
            if self.persist_with_retry(message).await {
                persisted += 1;
            }
        }
        Ok(persisted)
    }

    /// 单条消息的有限重试持久化；超过最大尝试次数记录后丢弃
    async fn persist_with_retry(&self, mut message: ChatMessage) -> bool {
        for attempt in 1..=self.config.max_attempts {
            match self.persist_message(&mut message).await {
                Ok(()) => {
                    self.push_confirmation(&message).await;
                    debug!(message_id = %message.message_id, "Successfully processed message");
                    return true;
                }
                Err(e) => {
                    error!(
                        message_id = %message.message_id,
                        attempt,
                        error = %e,
                        "Error processing message"
                    );
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        // TODO: 超限消息写入死信表
        error!(
            message_id = %message.message_id,
            sender_id = %message.sender_id,
            receiver_id = %message.receiver_id,
            max_attempts = self.config.max_attempts,
            "Message exceeded max retry attempts, dropping"
        );
        false
    }

    /// 落库：获取/创建会话、回填 conversation_id、写入消息并更新会话
    async fn persist_message(&self, message: &mut ChatMessage) -> Result<()> {
        let mut conversation = self
            .repository
            .get_or_create_conversation(&message.sender_id, &message.receiver_id)
            .await
            .context("get or create conversation")?;

        message.conversation_id = Some(conversation.conversation_id.clone());

        self.repository
            .insert_message(message)
            .await
            .context("insert message")?;

        conversation.last_message_id = Some(message.message_id.clone());
        conversation.last_message_at = Some(message.created_at);
        conversation.updated_at = Utc::now();

        self.repository
            .update_conversation(&conversation)
            .await
            .context("update conversation")?;

        Ok(())
    }

    /// 推送 delivered/confirmed 事件（尽力而为）
    async fn push_confirmation(&self, message: &ChatMessage) {
        let payload = MessagePushPayload::from_message(message, DeliveryStatus::Delivered);

        if let Err(e) = self
            .channel
            .send_to_user(&message.receiver_id, EVENT_MESSAGE_DELIVERED, &payload)
            .await
        {
            error!(
                message_id = %message.message_id,
                error = %e,
                "Error sending delivered event to receiver"
            );
        }

        if let Err(e) = self
            .channel
            .send_to_user(&message.sender_id, EVENT_MESSAGE_CONFIRMED, &payload)
            .await
        {
            error!(
                message_id = %message.message_id,
                error = %e,
                "Error sending confirmation to sender"
            );
        }
    }
}
