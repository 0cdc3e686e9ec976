//! 旁路缓存读取层
//!
//! 三个读操作（会话消息分页、用户会话列表、按参与者对获取会话）
//! 先查缓存；未命中（键不存在、空值、反序列化失败一律等同处理）
//! 时回源持久化存储，并按数据种类的固定 TTL 回填。缓存读写失败
//! 只记录日志并退化为回源，不影响已取得的结果，也不上抛给调用方。
//!
//! 已知缺口：编辑/删除直接修改持久化存储，不清除对应的消息分页
//! 缓存条目，编辑后的读取在分页 TTL（5 分钟）内可能返回旧内容

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::config::ChatDeliveryConfig;
use crate::domain::model::{ChatMessage, Conversation};
use crate::domain::repository::{CacheStore, ChatRepository};

/// 旁路缓存读取器
pub struct CachedChatReader {
    repository: Arc<dyn ChatRepository>,
    cache: Arc<dyn CacheStore>,
    messages_ttl: Duration,
    conversations_ttl: Duration,
    conversation_ttl: Duration,
}

impl CachedChatReader {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        cache: Arc<dyn CacheStore>,
        config: &ChatDeliveryConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            messages_ttl: config.messages_cache_ttl(),
            conversations_ttl: config.conversations_cache_ttl(),
            conversation_ttl: config.conversation_cache_ttl(),
        }
    }

    /// 分页读取两人会话消息（TTL 5 分钟）
    pub async fn conversation_messages(
        &self,
        sender_id: &str,
        receiver_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChatMessage>> {
        let key = Self::messages_key(sender_id, receiver_id, page);

        if let Some(messages) = self.read_cached::<Vec<ChatMessage>>(&key).await {
            debug!(count = messages.len(), "Retrieved conversation messages from cache");
            return Ok(messages);
        }

        let messages = self
            .repository
            .conversation_messages(sender_id, receiver_id, page, page_size)
            .await?;
        self.write_cached(&key, &messages, self.messages_ttl).await;
        debug!(
            count = messages.len(),
            "Retrieved conversation messages from store and cached"
        );
        Ok(messages)
    }

    /// 读取用户会话列表（TTL 10 分钟）
    pub async fn user_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let key = Self::conversations_key(user_id);

        if let Some(conversations) = self.read_cached::<Vec<Conversation>>(&key).await {
            debug!(count = conversations.len(), "Retrieved conversations from cache");
            return Ok(conversations);
        }

        let conversations = self.repository.user_conversations(user_id).await?;
        self.write_cached(&key, &conversations, self.conversations_ttl)
            .await;
        debug!(
            count = conversations.len(),
            "Retrieved conversations from store and cached"
        );
        Ok(conversations)
    }

    /// 获取或创建会话（TTL 1 小时；会话创建后参与者不可变，可长缓存）
    pub async fn get_or_create_conversation(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Result<Conversation> {
        let key = Self::conversation_key(user_one_id, user_two_id);

        if let Some(conversation) = self.read_cached::<Conversation>(&key).await {
            return Ok(conversation);
        }

        let conversation = self
            .repository
            .get_or_create_conversation(user_one_id, user_two_id)
            .await?;
        self.write_cached(&key, &conversation, self.conversation_ttl)
            .await;
        Ok(conversation)
    }

    /// 缓存读取；任何失败一律视为未命中
    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.get_string(key).await {
            Ok(value) => value?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to store");
                return None;
            }
        };
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "Cache entry failed to deserialize, treating as miss");
                None
            }
        }
    }

    /// 缓存回填；失败仅记录，已取得的回源结果照常返回
    async fn write_cached<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.cache.set_string(key, &encoded, ttl).await {
            warn!(key = %key, error = %e, "Cache write failed, entry not populated");
        }
    }

    fn messages_key(sender_id: &str, receiver_id: &str, page: u32) -> String {
        format!("messages:{}:{}:{}", sender_id, receiver_id, page)
    }

    fn conversations_key(user_id: &str) -> String {
        format!("user_conversations:{}", user_id)
    }

    fn conversation_key(user_one_id: &str, user_two_id: &str) -> String {
        format!("conversation:{}:{}", user_one_id, user_two_id)
    }
}
