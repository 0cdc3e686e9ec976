pub mod memory_queue;
pub mod redis_queue;

pub use memory_queue::InMemoryMessageQueue;
pub use redis_queue::RedisMessageQueue;
