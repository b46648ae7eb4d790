mod error;
mod store;
mod memory;
mod durable;

pub use error::{Result, StoreError};
pub use store::{check_upsert, PublishStateStore};
pub use memory::MemoryStateStore;
pub use durable::SledStateStore;
