//! Adapters behind the domain ports: storage backends, the identity
//! directory and notification delivery.

pub mod directory;
pub mod in_memory;
pub mod notify;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
