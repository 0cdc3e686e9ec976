pub mod cache;
pub mod messaging;
pub mod worker;
