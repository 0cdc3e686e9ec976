//! 实时聊天投递核心库
//!
//! 提供聊天系统的核心投递能力：
//! - 发送管道：熔断保护 + 异步持久化（fire-and-forget）+ 乐观推送
//! - 旁路缓存读取：会话消息分页、用户会话列表、会话获取/创建
//! - 在线状态跟踪：单一缓存条目维护全局在线用户集合
//!
//! 持久化存储、持久化队列、实时推送通道与外部缓存均为协作方，
//! 通过 `domain::repository` 中的 trait 注入

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ChatDeliveryConfig;
pub use domain::model::{
    ChatMessage, ChatUser, Conversation, DeliveryStatus, MessageKind, MessagePushPayload,
};
pub use domain::repository::{CacheStore, ChatRepository, MessageQueue, RealtimeChannel};
pub use domain::service::{
    CachedChatReader, ChatDeliveryService, CircuitBreaker, PresenceService,
};
pub use error::ChatDeliveryError;
pub use infrastructure::worker::{PersistenceWorker, PersistenceWorkerConfig};
