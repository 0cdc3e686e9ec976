//! 聊天投递服务（公共入口）
//!
//! 发送链路为乐观投递：消息入队异步持久化后立即向双方推送
//! pending 事件，调用方感知延迟为入队 + 两次推送，不等待落库。
//! 代价是推送成功但后续落库失败时双方已看到消息，这是既定的
//! 最终一致性取舍。
//!
//! 所有公共操作在边界捕获依赖失败，记录日志并返回中性默认值
//! （None / false / 空集合），不向调用方抛出异常；发送链路的失败
//! 额外计入熔断器

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::ChatDeliveryConfig;
use crate::domain::model::{
    ChatMessage, ChatUser, Conversation, DeliveryStatus, EVENT_MESSAGE_SENT,
    EVENT_RECEIVE_MESSAGE, MessagePushPayload,
};
use crate::domain::repository::{CacheStore, ChatRepository, MessageQueue, RealtimeChannel};
use crate::domain::service::cache_reader::CachedChatReader;
use crate::domain::service::circuit_breaker::CircuitBreaker;

/// 聊天投递服务
pub struct ChatDeliveryService {
    repository: Arc<dyn ChatRepository>,
    queue: Arc<dyn MessageQueue>,
    channel: Arc<dyn RealtimeChannel>,
    reader: CachedChatReader,
    breaker: Arc<CircuitBreaker>,
    default_page_size: u32,
}

impl ChatDeliveryService {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        queue: Arc<dyn MessageQueue>,
        channel: Arc<dyn RealtimeChannel>,
        cache: Arc<dyn CacheStore>,
        config: &ChatDeliveryConfig,
    ) -> Self {
        let reader = CachedChatReader::new(repository.clone(), cache, config);
        let breaker = Arc::new(CircuitBreaker::new(
            config.failure_threshold,
            config.circuit_cooldown(),
        ));
        Self {
            repository,
            queue,
            channel,
            reader,
            breaker,
            default_page_size: config.default_page_size,
        }
    }

    /// 发送链路共享的熔断器（诊断与测试用）
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }

    /// 发送消息
    ///
    /// 熔断器打开时直接丢弃：返回 None，不触达队列与推送通道
    /// （fail-fast，不排队等待恢复）。全局熔断，不区分发送方
    pub async fn send_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        reply_to_message_id: Option<&str>,
    ) -> Option<ChatMessage> {
        if self.breaker.is_open() {
            warn!(
                sender_id = %sender_id,
                receiver_id = %receiver_id,
                "Circuit breaker is open, rejecting message"
            );
            return None;
        }

        match self
            .deliver(sender_id, receiver_id, content, reply_to_message_id)
            .await
        {
            Ok(message) => {
                self.breaker.record_success();
                Some(message)
            }
            Err(e) => {
                self.breaker.record_failure();
                error!(
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    error = %e,
                    "Error sending message"
                );
                None
            }
        }
    }

    /// 受熔断保护的发送主体：构造消息、入队、乐观推送
    async fn deliver(
        &self,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        reply_to_message_id: Option<&str>,
    ) -> Result<ChatMessage> {
        let message = ChatMessage::new(
            sender_id,
            receiver_id,
            content,
            reply_to_message_id.map(str::to_string),
        );

        // 入队即视为已发送，落库由 worker 异步完成
        self.queue
            .enqueue(&message)
            .await
            .context("enqueue message for async persistence")?;

        self.push_optimistic(&message).await;

        info!(message_id = %message.message_id, "Message queued for processing");
        Ok(message)
    }

    /// 向双方推送 pending 事件；推送失败记录但不中断发送流程
    async fn push_optimistic(&self, message: &ChatMessage) {
        let payload = MessagePushPayload::from_message(message, DeliveryStatus::Pending);

        if let Err(e) = self
            .channel
            .send_to_user(&message.receiver_id, EVENT_RECEIVE_MESSAGE, &payload)
            .await
        {
            error!(
                message_id = %message.message_id,
                error = %e,
                "Error pushing message to receiver"
            );
        }

        if let Err(e) = self
            .channel
            .send_to_user(&message.sender_id, EVENT_MESSAGE_SENT, &payload)
            .await
        {
            error!(
                message_id = %message.message_id,
                error = %e,
                "Error pushing confirmation to sender"
            );
        }
    }

    /// 分页获取会话消息（旁路缓存，TTL 5 分钟）
    ///
    /// `page_size` 为 0 时使用配置的缺省分页条数
    pub async fn get_conversation_messages(
        &self,
        sender_id: &str,
        receiver_id: &str,
        page: u32,
        page_size: u32,
    ) -> Vec<ChatMessage> {
        let page_size = if page_size == 0 {
            self.default_page_size
        } else {
            page_size
        };
        match self
            .reader
            .conversation_messages(sender_id, receiver_id, page, page_size)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!(
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    error = %e,
                    "Error getting conversation messages"
                );
                Vec::new()
            }
        }
    }

    /// 获取用户会话列表（旁路缓存，TTL 10 分钟）
    pub async fn get_user_conversations(&self, user_id: &str) -> Vec<Conversation> {
        match self.reader.user_conversations(user_id).await {
            Ok(conversations) => conversations,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Error getting conversations for user");
                Vec::new()
            }
        }
    }

    /// 获取或创建会话（旁路缓存，TTL 1 小时）
    pub async fn get_or_create_conversation(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Option<Conversation> {
        match self
            .reader
            .get_or_create_conversation(user_one_id, user_two_id)
            .await
        {
            Ok(conversation) => Some(conversation),
            Err(e) => {
                error!(
                    user_one_id = %user_one_id,
                    user_two_id = %user_two_id,
                    error = %e,
                    "Error getting or creating conversation"
                );
                None
            }
        }
    }

    /// 标记消息已读（直通持久化存储）
    pub async fn mark_message_as_read(&self, message_id: &str, user_id: &str) -> bool {
        match self.repository.mark_message_read(message_id, user_id).await {
            Ok(marked) => marked,
            Err(e) => {
                error!(
                    message_id = %message_id,
                    user_id = %user_id,
                    error = %e,
                    "Error marking message as read"
                );
                false
            }
        }
    }

    /// 按标识获取消息（直通持久化存储）
    pub async fn get_message_by_id(&self, message_id: &str) -> Option<ChatMessage> {
        match self.repository.message_by_id(message_id).await {
            Ok(message) => message,
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Error getting message");
                None
            }
        }
    }

    /// 某发送方发给该用户的未读消息数（直通持久化存储）
    pub async fn get_unread_message_count(&self, user_id: &str, from_user_id: &str) -> i64 {
        match self.repository.unread_count(user_id, from_user_id).await {
            Ok(count) => count,
            Err(e) => {
                error!(
                    user_id = %user_id,
                    from_user_id = %from_user_id,
                    error = %e,
                    "Error getting unread message count"
                );
                0
            }
        }
    }

    /// 用户的全部未读消息（直通持久化存储）
    pub async fn get_unread_messages(&self, user_id: &str) -> Vec<ChatMessage> {
        match self.repository.unread_messages(user_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Error getting unread messages");
                Vec::new()
            }
        }
    }

    /// 校验用户是否可访问会话（直通持久化存储）
    pub async fn can_user_access_conversation(&self, user_id: &str, conversation_id: &str) -> bool {
        match self
            .repository
            .can_access_conversation(user_id, conversation_id)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                error!(
                    user_id = %user_id,
                    conversation_id = %conversation_id,
                    error = %e,
                    "Error checking conversation access"
                );
                false
            }
        }
    }

    /// 获取聊天伙伴列表（直通持久化存储）
    pub async fn get_chat_users(&self, user_id: &str) -> Vec<ChatUser> {
        match self.repository.chat_users(user_id).await {
            Ok(users) => users,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Error getting chat users");
                Vec::new()
            }
        }
    }

    /// 两名用户之间的最后一条消息（直通持久化存储）
    pub async fn get_last_message_between_users(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Option<ChatMessage> {
        match self
            .repository
            .last_message_between(user_one_id, user_two_id)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                error!(
                    user_one_id = %user_one_id,
                    user_two_id = %user_two_id,
                    error = %e,
                    "Error getting last message between users"
                );
                None
            }
        }
    }

    /// 删除消息（软删除）
    ///
    /// 仅参与方可删；只置删除方自己的软删除标记，
    /// 不移除记录，不影响另一方的可见性。
    /// 非参与方与消息不存在一律返回 false
    pub async fn delete_message(&self, message_id: &str, user_id: &str) -> bool {
        match self.delete_message_inner(message_id, user_id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                error!(
                    message_id = %message_id,
                    user_id = %user_id,
                    error = %e,
                    "Error deleting message"
                );
                false
            }
        }
    }

    async fn delete_message_inner(&self, message_id: &str, user_id: &str) -> Result<bool> {
        let Some(mut message) = self.repository.message_by_id(message_id).await? else {
            return Ok(false);
        };
        if !message.involves(user_id) {
            return Ok(false);
        }

        if message.sender_id == user_id {
            message.is_deleted_by_sender = true;
        } else {
            message.is_deleted_by_receiver = true;
        }

        self.repository.update_message(&message).await
    }

    /// 编辑消息
    ///
    /// 仅原始发送方可编辑；替换内容、置编辑标记并更新时间戳
    pub async fn edit_message(&self, message_id: &str, new_content: &str, user_id: &str) -> bool {
        match self
            .edit_message_inner(message_id, new_content, user_id)
            .await
        {
            Ok(edited) => edited,
            Err(e) => {
                error!(
                    message_id = %message_id,
                    user_id = %user_id,
                    error = %e,
                    "Error editing message"
                );
                false
            }
        }
    }

    async fn edit_message_inner(
        &self,
        message_id: &str,
        new_content: &str,
        user_id: &str,
    ) -> Result<bool> {
        let Some(mut message) = self.repository.message_by_id(message_id).await? else {
            return Ok(false);
        };
        if message.sender_id != user_id {
            return Ok(false);
        }

        message.content = new_content.to_string();
        message.is_edited = true;
        message.updated_at = Utc::now();

        self.repository.update_message(&message).await
    }
}
