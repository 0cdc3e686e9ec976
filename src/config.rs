//! 配置加载
//!
//! 从环境变量读取，缺省值与线上默认行为一致

use std::env;
use std::time::Duration;

/// 聊天投递核心配置
#[derive(Clone, Debug)]
pub struct ChatDeliveryConfig {
    /// 熔断阈值（连续失败次数）
    pub failure_threshold: u32,
    /// 熔断冷却窗口（秒）
    pub circuit_cooldown_secs: u64,
    /// 会话消息分页缓存 TTL（秒）
    pub messages_cache_ttl_secs: u64,
    /// 用户会话列表缓存 TTL（秒）
    pub conversations_cache_ttl_secs: u64,
    /// 会话（参与者对）缓存 TTL（秒）
    pub conversation_cache_ttl_secs: u64,
    /// 在线用户集合缓存 TTL（秒）
    pub presence_cache_ttl_secs: u64,
    /// 消息分页默认条数
    pub default_page_size: u32,
    /// 持久化队列的 Redis 列表键
    pub queue_key: String,
    /// 出队后处理中列表的 Redis 键
    pub processing_key: String,
    /// 持久化 worker 单批出队条数
    pub worker_batch_size: usize,
    /// 持久化 worker 轮询间隔（毫秒）
    pub worker_poll_interval_ms: u64,
    /// 单条消息落库最大尝试次数
    pub worker_max_attempts: u32,
    /// 落库重试间隔（秒）
    pub worker_retry_delay_secs: u64,
}

impl Default for ChatDeliveryConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            circuit_cooldown_secs: 60,
            messages_cache_ttl_secs: 5 * 60,
            conversations_cache_ttl_secs: 10 * 60,
            conversation_cache_ttl_secs: 60 * 60,
            presence_cache_ttl_secs: 30 * 60,
            default_page_size: 50,
            queue_key: "message_queue".to_string(),
            processing_key: "message_processing".to_string(),
            worker_batch_size: 100,
            worker_poll_interval_ms: 100,
            worker_max_attempts: 3,
            worker_retry_delay_secs: 5,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

impl ChatDeliveryConfig {
    /// 从环境变量加载配置，未设置的项使用缺省值
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            failure_threshold: env_u64("CHAT_CIRCUIT_FAILURE_THRESHOLD")
                .map(|v| v as u32)
                .unwrap_or(defaults.failure_threshold),
            circuit_cooldown_secs: env_u64("CHAT_CIRCUIT_COOLDOWN_SECS")
                .unwrap_or(defaults.circuit_cooldown_secs),
            messages_cache_ttl_secs: env_u64("CHAT_MESSAGES_CACHE_TTL_SECS")
                .unwrap_or(defaults.messages_cache_ttl_secs),
            conversations_cache_ttl_secs: env_u64("CHAT_CONVERSATIONS_CACHE_TTL_SECS")
                .unwrap_or(defaults.conversations_cache_ttl_secs),
            conversation_cache_ttl_secs: env_u64("CHAT_CONVERSATION_CACHE_TTL_SECS")
                .unwrap_or(defaults.conversation_cache_ttl_secs),
            presence_cache_ttl_secs: env_u64("CHAT_PRESENCE_CACHE_TTL_SECS")
                .unwrap_or(defaults.presence_cache_ttl_secs),
            default_page_size: env_u64("CHAT_DEFAULT_PAGE_SIZE")
                .map(|v| v as u32)
                .unwrap_or(defaults.default_page_size),
            queue_key: env::var("CHAT_QUEUE_KEY").unwrap_or(defaults.queue_key),
            processing_key: env::var("CHAT_PROCESSING_KEY").unwrap_or(defaults.processing_key),
            worker_batch_size: env_u64("CHAT_WORKER_BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.worker_batch_size),
            worker_poll_interval_ms: env_u64("CHAT_WORKER_POLL_INTERVAL_MS")
                .unwrap_or(defaults.worker_poll_interval_ms),
            worker_max_attempts: env_u64("CHAT_WORKER_MAX_ATTEMPTS")
                .map(|v| v as u32)
                .unwrap_or(defaults.worker_max_attempts),
            worker_retry_delay_secs: env_u64("CHAT_WORKER_RETRY_DELAY_SECS")
                .unwrap_or(defaults.worker_retry_delay_secs),
        }
    }

    /// 熔断冷却窗口
    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_cooldown_secs)
    }

    /// 会话消息分页缓存 TTL
    pub fn messages_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.messages_cache_ttl_secs)
    }

    /// 用户会话列表缓存 TTL
    pub fn conversations_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.conversations_cache_ttl_secs)
    }

    /// 会话缓存 TTL
    pub fn conversation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_cache_ttl_secs)
    }

    /// 在线用户集合缓存 TTL
    pub fn presence_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_cache_ttl_secs)
    }
}
