pub mod cache_reader;
pub mod chat_delivery_service;
pub mod circuit_breaker;
pub mod presence_service;


pub use cache_reader::CachedChatReader;
pub use chat_delivery_service::ChatDeliveryService;
pub use circuit_breaker::CircuitBreaker;
pub use presence_service::PresenceService;
