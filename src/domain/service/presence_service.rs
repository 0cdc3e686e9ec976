//! 在线状态跟踪
//!
//! 单一缓存条目维护全局在线用户集合，每次变更读-改-写并刷新 TTL。
//! 并发写入者按最后写入生效；在线状态为尽力而为的临时数据，
//! 不做持久化，集合反映每个用户最近一次的状态切换

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::repository::CacheStore;

/// 在线用户集合的缓存键
const ONLINE_USERS_KEY: &str = "online_users";

/// 在线状态跟踪器
pub struct PresenceService {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PresenceService {
    pub fn new(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// 设置用户在线状态
    ///
    /// 幂等：重复设置同一状态对结果集合无影响。
    /// 仅在缓存写入异常时返回 false
    pub async fn set_online_status(&self, user_id: &str, is_online: bool) -> bool {
        let mut online_users = self.online_users().await;

        if is_online {
            online_users.insert(user_id.to_string());
        } else {
            online_users.remove(user_id);
        }

        let encoded = match serde_json::to_string(&online_users) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to encode online users set");
                return false;
            }
        };

        if let Err(e) = self
            .cache
            .set_string(ONLINE_USERS_KEY, &encoded, self.ttl)
            .await
        {
            error!(user_id = %user_id, error = %e, "Error updating online users in cache");
            return false;
        }

        info!(user_id = %user_id, online = is_online, "User presence updated");
        true
    }

    /// 读取在线用户集合；缓存未命中或异常均视为空集
    pub async fn online_users(&self) -> BTreeSet<String> {
        match self.cache.get_string(ONLINE_USERS_KEY).await {
            Ok(Some(raw)) if !raw.is_empty() => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Online users cache entry failed to deserialize, treating as empty");
                BTreeSet::new()
            }),
            Ok(_) => BTreeSet::new(),
            Err(e) => {
                error!(error = %e, "Error reading online users from cache");
                BTreeSet::new()
            }
        }
    }
}
