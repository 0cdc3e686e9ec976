//! 聊天领域模型
//!
//! 所有缓存实体与推送载荷均使用固定 schema（serde 显式序列化），
//! 不做动态结构推断。消息只做软删除，记录永不物理移除

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 乐观推送事件：新消息送达接收方
pub const EVENT_RECEIVE_MESSAGE: &str = "ReceiveMessage";
/// 乐观推送事件：发送方回执
pub const EVENT_MESSAGE_SENT: &str = "MessageSent";
/// 持久化完成事件：送达确认（接收方）
pub const EVENT_MESSAGE_DELIVERED: &str = "MessageDelivered";
/// 持久化完成事件：落库确认（发送方）
pub const EVENT_MESSAGE_CONFIRMED: &str = "MessageConfirmed";

/// 消息类型（当前仅支持文本）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 文本消息
    #[default]
    Text,
}

/// 推送事件中的投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// 已入队，等待持久化
    Pending,
    /// 已持久化
    Delivered,
}

/// 聊天消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub kind: MessageKind,
    /// 所属会话，由持久化 worker 在落库时回填
    pub conversation_id: Option<String>,
    pub reply_to_message_id: Option<String>,
    pub is_read: bool,
    /// 发送方软删除标记（不影响接收方可见性）
    pub is_deleted_by_sender: bool,
    /// 接收方软删除标记（不影响发送方可见性）
    pub is_deleted_by_receiver: bool,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    /// 构造一条新消息：全新标识、双方未读、未删除、未编辑
    pub fn new(
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        reply_to_message_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            message_id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            kind: MessageKind::Text,
            conversation_id: None,
            reply_to_message_id,
            is_read: false,
            is_deleted_by_sender: false,
            is_deleted_by_receiver: false,
            is_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判断用户是否为本消息的参与方
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// 会话实体
///
/// 两名用户首次联系时惰性创建（get-or-create），参与者对创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub user_one_id: String,
    pub user_two_id: String,
    pub last_message_id: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// 为一对参与者创建新会话
    pub fn new(user_one_id: &str, user_two_id: &str) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            user_one_id: user_one_id.to_string(),
            user_two_id: user_two_id.to_string(),
            last_message_id: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判断用户是否为本会话的参与方
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_one_id == user_id || self.user_two_id == user_id
    }
}

/// 聊天用户（读侧伙伴列表使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// 推送事件载荷（固定 schema）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePushPayload {
    pub message_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub reply_to_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl MessagePushPayload {
    /// 由消息实体构建推送载荷
    pub fn from_message(message: &ChatMessage, status: DeliveryStatus) -> Self {
        Self {
            message_id: message.message_id.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            kind: message.kind,
            reply_to_message_id: message.reply_to_message_id.clone(),
            created_at: message.created_at,
            status,
        }
    }
}
