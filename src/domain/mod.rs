//! Domain layer: value objects, entities and the ports the application layer
//! talks to storage, identity and notifications through.

pub mod account;
pub mod changes;
pub mod ports;
pub mod request;
pub mod transaction;
