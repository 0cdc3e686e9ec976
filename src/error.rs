//! 基础设施错误类型
//!
//! 仅供缓存/队列适配器内部使用，在仓储 trait 边界统一转为 `anyhow`。
//! 公共操作面不向调用方抛出任何错误（捕获、记录、返回中性默认值）

use thiserror::Error;

/// 基础设施层错误
#[derive(Debug, Error)]
pub enum ChatDeliveryError {
    /// 缓存条目或队列载荷编解码失败
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Redis 命令执行失败
    #[error("redis command error: {0}")]
    Redis(#[from] redis::RedisError),
}
