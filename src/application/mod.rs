//! Application layer containing the core business logic orchestration.
//!
//! [`engine::PaymentEngine`] is the primary entry point. It composes the
//! account ledger, the transaction journal, the request workflow and the
//! split coordinator, which serialize their read-modify-write sequences
//! through a shared [`locks::LockTable`] and commit each operation as one
//! change set.

pub mod engine;
pub mod journal;
pub mod ledger;
pub mod locks;
pub mod split;
pub mod workflow;
