//! 协作方契约
//!
//! 核心自身不持有外部资源：持久化存储、持久化队列、实时推送通道
//! 与外部缓存均通过 trait 注入（需要作为 trait 对象使用，保留 async-trait）。
//! 每个调用都是独立可失败、独立延迟的 I/O 操作，取消依赖 future 丢弃语义

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::model::{ChatMessage, ChatUser, Conversation, MessagePushPayload};

/// 持久化存储仓储接口（权威数据源，无缓存依赖）
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 分页查询两名用户之间的会话消息
    async fn conversation_messages(
        &self,
        sender_id: &str,
        receiver_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChatMessage>>;

    /// 查询用户参与的全部会话
    async fn user_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// 获取两名用户的会话，不存在则创建
    async fn get_or_create_conversation(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Result<Conversation>;

    async fn message_by_id(&self, message_id: &str) -> Result<Option<ChatMessage>>;

    /// 写入新消息（由持久化 worker 调用，投递管道不直接落库）
    async fn insert_message(&self, message: &ChatMessage) -> Result<()>;

    /// 整体更新已有消息，消息不存在时返回 false
    async fn update_message(&self, message: &ChatMessage) -> Result<bool>;

    /// 更新会话的最后消息指针与时间戳
    async fn update_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn mark_message_read(&self, message_id: &str, user_id: &str) -> Result<bool>;

    /// 某发送方发给该用户的未读消息数
    async fn unread_count(&self, user_id: &str, from_user_id: &str) -> Result<i64>;

    async fn unread_messages(&self, user_id: &str) -> Result<Vec<ChatMessage>>;

    async fn can_access_conversation(&self, user_id: &str, conversation_id: &str) -> Result<bool>;

    /// 该用户的聊天伙伴列表
    async fn chat_users(&self, user_id: &str) -> Result<Vec<ChatUser>>;

    async fn last_message_between(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Result<Option<ChatMessage>>;
}

/// 持久化队列接口
///
/// 投递管道只感知入队失败；worker 的消费失败由队列侧自行处理
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn enqueue(&self, message: &ChatMessage) -> Result<()>;

    /// 批量出队（持久化 worker 消费）
    async fn dequeue_batch(&self, batch_size: usize) -> Result<Vec<ChatMessage>>;

    /// 当前积压条数
    async fn pending_count(&self) -> Result<usize>;
}

/// 实时推送通道接口（尽力而为，失败不得中断调用方流程）
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn send_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: &MessagePushPayload,
    ) -> Result<()>;
}

/// 外部缓存接口（字符串键值，按键独立 TTL）
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}
