//! Redis 缓存适配器
//!
//! 以字符串键值 + 每键 TTL 实现 `CacheStore`，
//! 旁路缓存与在线状态集合均落在这里

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::domain::repository::CacheStore;
use crate::error::ChatDeliveryError;

/// Redis 缓存存储
pub struct RedisCacheStore {
    client: Arc<redis::Client>,
}

impl RedisCacheStore {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<ConnectionManager, ChatDeliveryError> {
        Ok(ConnectionManager::new(self.client.as_ref().clone()).await?)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // SET EX 的最小粒度为秒
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }
}
