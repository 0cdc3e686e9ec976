//! 测试用的进程内协作方实现
//!
//! 覆盖持久化存储、推送通道与带过期语义的缓存，
//! 支持按需注入失败以验证边界处理

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::domain::model::{ChatMessage, ChatUser, Conversation, MessagePushPayload};
use crate::domain::repository::{CacheStore, ChatRepository, RealtimeChannel};

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn pair_key(user_one_id: &str, user_two_id: &str) -> String {
    let mut pair = [user_one_id, user_two_id];
    pair.sort();
    format!("{}:{}", pair[0], pair[1])
}

/// HashMap 支撑的持久化存储
#[derive(Default)]
pub struct InMemoryChatRepository {
    messages: Mutex<HashMap<String, ChatMessage>>,
    conversations: Mutex<HashMap<String, Conversation>>,
    users: Mutex<Vec<ChatUser>>,
    calls: Mutex<Vec<&'static str>>,
    failing: AtomicBool,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn seed_message(&self, message: ChatMessage) {
        lock(&self.messages).insert(message.message_id.clone(), message);
    }

    pub fn seed_user(&self, user: ChatUser) {
        lock(&self.users).push(user);
    }

    pub fn seed_conversation(&self, conversation: Conversation) {
        let key = pair_key(&conversation.user_one_id, &conversation.user_two_id);
        lock(&self.conversations).insert(key, conversation);
    }

    /// 某方法被调用的次数
    pub fn call_count(&self, name: &str) -> usize {
        lock(&self.calls).iter().filter(|c| **c == name).count()
    }

    fn record(&self, name: &'static str) -> Result<()> {
        lock(&self.calls).push(name);
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated store failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn conversation_messages(
        &self,
        sender_id: &str,
        receiver_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChatMessage>> {
        self.record("conversation_messages")?;
        let mut messages: Vec<ChatMessage> = lock(&self.messages)
            .values()
            .filter(|m| m.involves(sender_id) && m.involves(receiver_id))
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        Ok(messages
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn user_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.record("user_conversations")?;
        Ok(lock(&self.conversations)
            .values()
            .filter(|c| c.involves(user_id))
            .cloned()
            .collect())
    }

    async fn get_or_create_conversation(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Result<Conversation> {
        self.record("get_or_create_conversation")?;
        let key = pair_key(user_one_id, user_two_id);
        let mut conversations = lock(&self.conversations);
        let conversation = conversations
            .entry(key)
            .or_insert_with(|| Conversation::new(user_one_id, user_two_id));
        Ok(conversation.clone())
    }

    async fn message_by_id(&self, message_id: &str) -> Result<Option<ChatMessage>> {
        self.record("message_by_id")?;
        Ok(lock(&self.messages).get(message_id).cloned())
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        self.record("insert_message")?;
        lock(&self.messages).insert(message.message_id.clone(), message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &ChatMessage) -> Result<bool> {
        self.record("update_message")?;
        let mut messages = lock(&self.messages);
        if !messages.contains_key(&message.message_id) {
            return Ok(false);
        }
        messages.insert(message.message_id.clone(), message.clone());
        Ok(true)
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.record("update_conversation")?;
        let key = pair_key(&conversation.user_one_id, &conversation.user_two_id);
        lock(&self.conversations).insert(key, conversation.clone());
        Ok(())
    }

    async fn mark_message_read(&self, message_id: &str, user_id: &str) -> Result<bool> {
        self.record("mark_message_read")?;
        let mut messages = lock(&self.messages);
        match messages.get_mut(message_id) {
            Some(message) if message.receiver_id == user_id => {
                message.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unread_count(&self, user_id: &str, from_user_id: &str) -> Result<i64> {
        self.record("unread_count")?;
        Ok(lock(&self.messages)
            .values()
            .filter(|m| m.receiver_id == user_id && m.sender_id == from_user_id && !m.is_read)
            .count() as i64)
    }

    async fn unread_messages(&self, user_id: &str) -> Result<Vec<ChatMessage>> {
        self.record("unread_messages")?;
        Ok(lock(&self.messages)
            .values()
            .filter(|m| m.receiver_id == user_id && !m.is_read)
            .cloned()
            .collect())
    }

    async fn can_access_conversation(&self, user_id: &str, conversation_id: &str) -> Result<bool> {
        self.record("can_access_conversation")?;
        Ok(lock(&self.conversations)
            .values()
            .any(|c| c.conversation_id == conversation_id && c.involves(user_id)))
    }

    async fn chat_users(&self, user_id: &str) -> Result<Vec<ChatUser>> {
        self.record("chat_users")?;
        Ok(lock(&self.users)
            .iter()
            .filter(|u| u.user_id != user_id)
            .cloned()
            .collect())
    }

    async fn last_message_between(
        &self,
        user_one_id: &str,
        user_two_id: &str,
    ) -> Result<Option<ChatMessage>> {
        self.record("last_message_between")?;
        Ok(lock(&self.messages)
            .values()
            .filter(|m| m.involves(user_one_id) && m.involves(user_two_id))
            .max_by_key(|m| m.created_at)
            .cloned())
    }
}

/// 记录所有推送事件的通道
#[derive(Default)]
pub struct RecordingChannel {
    events: Mutex<Vec<(String, String, MessagePushPayload)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// (user_id, event, payload) 按推送顺序
    pub fn events(&self) -> Vec<(String, String, MessagePushPayload)> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl RealtimeChannel for RecordingChannel {
    async fn send_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: &MessagePushPayload,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated push failure");
        }
        lock(&self.events).push((user_id.to_string(), event.to_string(), payload.clone()));
        Ok(())
    }
}

/// 带过期语义的进程内缓存
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Instant, Duration)>>,
    failing: AtomicBool,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 写入该键时请求的 TTL
    pub fn recorded_ttl(&self, key: &str) -> Option<Duration> {
        lock(&self.entries).get(key).map(|(_, _, ttl)| *ttl)
    }

    /// 将条目的过期时间拨到过去，模拟 TTL 到期
    pub fn force_expire(&self, key: &str) {
        if let Some(entry) = lock(&self.entries).get_mut(key) {
            entry.1 = Instant::now() - Duration::from_secs(1);
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated cache failure");
        }
        let entries = lock(&self.entries);
        Ok(entries.get(key).and_then(|(value, expires_at, _)| {
            if Instant::now() < *expires_at {
                Some(value.clone())
            } else {
                None
            }
        }))
    }

    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated cache failure");
        }
        lock(&self.entries).insert(key.to_string(), (value.to_string(), Instant::now() + ttl, ttl));
        Ok(())
    }
}

/// 可注入失败并统计入队尝试次数的队列
#[derive(Default)]
pub struct RecordingQueue {
    enqueued: Mutex<Vec<ChatMessage>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn enqueued(&self) -> Vec<ChatMessage> {
        lock(&self.enqueued).clone()
    }

    /// 入队尝试次数（含失败的尝试）
    pub fn enqueue_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::domain::repository::MessageQueue for RecordingQueue {
    async fn enqueue(&self, message: &ChatMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated queue failure");
        }
        lock(&self.enqueued).push(message.clone());
        Ok(())
    }

    async fn dequeue_batch(&self, batch_size: usize) -> Result<Vec<ChatMessage>> {
        let mut enqueued = lock(&self.enqueued);
        let take = batch_size.min(enqueued.len());
        Ok(enqueued.drain(..take).collect())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(lock(&self.enqueued).len())
    }
}
