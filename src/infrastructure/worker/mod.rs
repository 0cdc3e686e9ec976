pub mod persistence_worker;

pub use persistence_worker::{PersistenceWorker, PersistenceWorkerConfig};
